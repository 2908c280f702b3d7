// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-chain balance providers.
//!
//! Every chain is exposed through the same capability, [`CryptoProvider`]:
//! given an address (or extended public key, for the UTXO chains and Kaspa)
//! return the balance in whole-coin units. The registry maps upper-case
//! symbols to boxed providers at startup.

pub mod connection;
pub mod electrum;
pub mod ethereum;
pub mod kaspa;
pub mod registry;
pub mod solana;
pub mod utxo;

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::derivation::DerivationError;

pub use connection::{ConnectionState, Connector, ManagedConnection};
pub use registry::{build_registry, ProviderMap};

/// Attempts per balance call, including the first.
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Pause between failed balance attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Pause between failed connection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Deadline for a single balance lookup.
pub const BALANCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for dialing and probing a new connection.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Balance lookup capability implemented once per chain.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Balance of `address` in whole-coin units.
    async fn get_balance(&self, address: &str) -> Result<f64, ChainError>;
}

/// Errors returned by chain providers.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl ChainError {
    /// Whether the failure suggests the underlying connection is unusable.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, ChainError::Timeout(_) | ChainError::Connection(_))
    }

    /// Whether another attempt could succeed. Input errors never can.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ChainError::InvalidAddress(_)
                | ChainError::InvalidEndpoint(_)
                | ChainError::Derivation(_)
        )
    }

    /// Whether the caller supplied bad input, as opposed to an upstream fault.
    pub fn is_client_error(&self) -> bool {
        !self.is_retryable()
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChainError::Timeout(BALANCE_TIMEOUT)
        } else if e.is_connect() {
            ChainError::Connection(e.to_string())
        } else if e.is_decode() {
            ChainError::InvalidResponse(e.to_string())
        } else {
            ChainError::Rpc(e.to_string())
        }
    }
}

/// Timing knobs for connect-with-retry and bounded balance retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub reconnect_delay: Duration,
    pub call_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRY_ATTEMPTS,
            retry_delay: RETRY_DELAY,
            reconnect_delay: RECONNECT_DELAY,
            call_timeout: BALANCE_TIMEOUT,
            probe_timeout: CONNECTION_TIMEOUT,
        }
    }
}

/// Run `fut` under `limit`, mapping expiry to [`ChainError::Timeout`].
pub async fn with_timeout<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, ChainError>>,
) -> Result<T, ChainError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ChainError::Timeout(limit))?
}

/// Convert an integer amount in a chain's smallest unit to whole coins.
///
/// The division happens in decimal arithmetic; only the final result is
/// narrowed to `f64`.
pub fn from_smallest_unit(amount: i128, decimals: u32) -> Result<f64, ChainError> {
    let value = Decimal::try_from_i128_with_scale(amount, decimals).map_err(|e| {
        ChainError::InvalidResponse(format!("amount {amount} out of range: {e}"))
    })?;
    value
        .to_f64()
        .ok_or_else(|| ChainError::InvalidResponse(format!("amount {value} is not representable")))
}
