// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Managed Connections
//!
//! Each RPC-backed chain owns exactly one live client handle. The handle sits
//! behind a read/write lock: balance calls clone an `Arc` of it under a read
//! lock, and a reconnect builds a fresh handle and swaps it in under a short
//! write lock. No lock is held across network I/O.
//!
//! ## Reconnect
//!
//! `reconnect` dials until it succeeds, pausing `reconnect_delay` between
//! failures. Callers pass the handle generation they observed; if another
//! task has already swapped in a newer handle, the request is dropped, so a
//! burst of failing calls results in a single dial loop.
//!
//! ## Bounded retry
//!
//! `call` makes up to `max_attempts` attempts. A handle that reports itself
//! dead triggers a reconnect and consumes the attempt. A timeout or
//! connection error triggers a reconnect before the next attempt. Input
//! errors are returned immediately.
//!
//! `call_steps` is the same loop for operations made of several requests.
//! The whole operation is one attempt, and each step is bounded by the
//! per-request deadline handed to `op` instead of one overall deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{with_timeout, ChainError, RetryPolicy};

/// Opens and probes client handles for one endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: Send + Sync + 'static;

    /// Chain name used in logs.
    fn chain(&self) -> &'static str;

    /// Open a new handle and verify it with a cheap liveness probe.
    async fn connect(&self) -> Result<Self::Handle, ChainError>;

    /// Whether `handle` is still usable. Stateless transports are always alive.
    fn is_alive(&self, _handle: &Self::Handle) -> bool {
        true
    }
}

/// Lifecycle of a managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct Slot<H> {
    state: ConnectionState,
    handle: Option<Arc<H>>,
    /// Incremented on every successful swap.
    generation: u64,
}

/// A swappable client handle with connect-with-retry and bounded call retry.
pub struct ManagedConnection<C: Connector> {
    connector: C,
    policy: RetryPolicy,
    slot: RwLock<Slot<C::Handle>>,
    reconnect_gate: Mutex<()>,
}

impl<C: Connector> ManagedConnection<C> {
    /// Create a connection without dialing.
    pub fn new(connector: C, policy: RetryPolicy) -> Self {
        Self {
            connector,
            policy,
            slot: RwLock::new(Slot {
                state: ConnectionState::Disconnected,
                handle: None,
                generation: 0,
            }),
            reconnect_gate: Mutex::new(()),
        }
    }

    /// Create a connection and block until the first dial succeeds.
    pub async fn establish(connector: C, policy: RetryPolicy) -> Self {
        let conn = Self::new(connector, policy);
        conn.reconnect(0).await;
        conn
    }

    pub fn chain(&self) -> &'static str {
        self.connector.chain()
    }

    pub async fn state(&self) -> ConnectionState {
        self.slot.read().await.state
    }

    async fn snapshot(&self) -> (Option<Arc<C::Handle>>, u64) {
        let slot = self.slot.read().await;
        (slot.handle.clone(), slot.generation)
    }

    /// Dial until a new handle is in place.
    ///
    /// `seen_generation` is the generation the caller found broken; if the
    /// slot has moved past it, another task already reconnected.
    pub async fn reconnect(&self, seen_generation: u64) {
        let _gate = self.reconnect_gate.lock().await;

        {
            let mut slot = self.slot.write().await;
            if slot.generation != seen_generation {
                debug!(chain = self.chain(), "Reconnect already performed by another task");
                return;
            }
            slot.state = ConnectionState::Connecting;
        }

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match with_timeout(self.policy.probe_timeout, self.connector.connect()).await {
                Ok(handle) => {
                    let mut slot = self.slot.write().await;
                    slot.handle = Some(Arc::new(handle));
                    slot.state = ConnectionState::Connected;
                    slot.generation += 1;
                    info!(chain = self.chain(), attempt, "Connected");
                    return;
                }
                Err(e) => {
                    warn!(
                        chain = self.chain(),
                        attempt,
                        error = %e,
                        retry_in_secs = self.policy.reconnect_delay.as_secs_f64(),
                        "Connection attempt failed"
                    );
                    tokio::time::sleep(self.policy.reconnect_delay).await;
                }
            }
        }
    }

    /// Run `op` against the live handle with bounded retry.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, ChainError>
    where
        F: Fn(Arc<C::Handle>) -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let limit = self.policy.call_timeout;
        self.retry(|handle| with_timeout(limit, op(handle))).await
    }

    /// Run a multi-request `op` with bounded retry.
    ///
    /// `op` receives the per-request deadline and must apply it to each
    /// request. Any failing step fails the attempt; the next attempt starts
    /// over from the first step.
    pub async fn call_steps<T, F, Fut>(&self, op: F) -> Result<T, ChainError>
    where
        F: Fn(Arc<C::Handle>, Duration) -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let limit = self.policy.call_timeout;
        self.retry(|handle| op(handle, limit)).await
    }

    async fn retry<T, F, Fut>(&self, attempt_op: F) -> Result<T, ChainError>
    where
        F: Fn(Arc<C::Handle>) -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let (handle, generation) = self.snapshot().await;
            let handle = match handle {
                Some(handle) if self.connector.is_alive(&handle) => handle,
                _ => {
                    warn!(chain = self.chain(), attempt, "Connection is down, reconnecting");
                    self.reconnect(generation).await;
                    continue;
                }
            };

            match attempt_op(handle).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        chain = self.chain(),
                        attempt,
                        max_attempts,
                        error = %e,
                        "Balance call failed"
                    );
                    if e.is_connection_fault() {
                        self.reconnect(generation).await;
                    }
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ChainError::RetriesExhausted {
            attempts: max_attempts,
        }))
    }
}
