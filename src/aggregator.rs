// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Balance Aggregator
//!
//! Combines per-chain balances with exchange rates into [`BalanceResult`]s.
//!
//! ## Resolution
//!
//! 1. An empty fiat symbol defaults to `USD`; symbols are upper-cased.
//! 2. The chain provider is looked up by exact symbol, `_TESTNET` suffix
//!    included.
//! 3. The balance is read through a cache keyed `balance:{SYMBOL}:{address}`.
//! 4. The rate is read through a cache keyed `rate:{RATE_SYMBOL}:{FIAT}`,
//!    where the rate symbol has any `_TESTNET` suffix removed.
//! 5. `fiat_value = balance * rate` and `change24h = balance * change`.
//!
//! ## Batches
//!
//! Each request in a batch runs as its own task. Results come back in input
//! order, and a failing request only fills its own slot with an error.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::chains::{ChainError, ProviderMap};
use crate::config::CacheSettings;
use crate::models::{normalize_symbol, rate_symbol, BalanceRequest, BalanceResult, DEFAULT_FIAT};
use crate::providers::{Rate, RateError, RateSource};

/// Errors returned for a single balance resolution.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unsupported crypto symbol: {0}")]
    UnknownSymbol(String),

    #[error("failed to get {symbol} balance for {address}: {source}")]
    Balance {
        symbol: String,
        address: String,
        #[source]
        source: ChainError,
    },

    #[error("failed to get {symbol}/{fiat} exchange rate: {source}")]
    Rate {
        symbol: String,
        fiat: String,
        #[source]
        source: RateError,
    },
}

impl ProviderError {
    /// Whether the request itself was at fault (unknown symbol, bad address
    /// or extended key) rather than an upstream service.
    pub fn is_client_error(&self) -> bool {
        match self {
            ProviderError::UnknownSymbol(_) => true,
            ProviderError::Balance { source, .. } => source.is_client_error(),
            ProviderError::Rate { .. } => false,
        }
    }
}

/// Balance-with-fiat lookup contract consumed by the REST layer.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Resolve one balance.
    async fn get_balance(
        &self,
        symbol: &str,
        address: &str,
        fiat_symbol: &str,
    ) -> Result<BalanceResult, ProviderError>;

    /// Resolve every request concurrently. Never fails as a whole: errors
    /// are reported in the affected result's `error` field.
    async fn get_batch_balances(&self, requests: Vec<BalanceRequest>) -> Vec<BalanceResult>;

    /// Alias of [`get_batch_balances`](Self::get_batch_balances).
    async fn get_balances(&self, requests: Vec<BalanceRequest>) -> Vec<BalanceResult> {
        self.get_batch_balances(requests).await
    }
}

struct Inner {
    providers: ProviderMap,
    rates: Arc<dyn RateSource>,
    balance_cache: TtlCache<f64>,
    rate_cache: TtlCache<Rate>,
    settings: CacheSettings,
}

/// [`BalanceProvider`] backed by the chain registry and a rate source.
///
/// Cloning is cheap and shares caches and providers.
#[derive(Clone)]
pub struct BalanceAggregator {
    inner: Arc<Inner>,
}

impl BalanceAggregator {
    /// Build an aggregator and start its cache sweepers.
    ///
    /// The sweepers stop when `shutdown` is cancelled.
    pub fn new(
        providers: ProviderMap,
        rates: Arc<dyn RateSource>,
        settings: CacheSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let balance_cache =
            TtlCache::with_sweeper("balance", settings.sweep_interval, shutdown.clone());
        let rate_cache = TtlCache::with_sweeper("rate", settings.sweep_interval, shutdown);

        Self {
            inner: Arc::new(Inner {
                providers,
                rates,
                balance_cache,
                rate_cache,
                settings,
            }),
        }
    }

    /// Upper-case symbols this aggregator can resolve, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.inner.providers.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    async fn cached_balance(&self, symbol: &str, address: &str) -> Result<f64, ProviderError> {
        let key = format!("balance:{symbol}:{address}");
        if let Some(balance) = self.inner.balance_cache.get(&key) {
            debug!(symbol, "Balance cache hit");
            return Ok(balance);
        }

        let provider = self
            .inner
            .providers
            .get(symbol)
            .ok_or_else(|| ProviderError::UnknownSymbol(symbol.to_string()))?;

        let balance = provider
            .get_balance(address)
            .await
            .map_err(|source| ProviderError::Balance {
                symbol: symbol.to_string(),
                address: address.to_string(),
                source,
            })?;

        self.inner
            .balance_cache
            .set(key, balance, self.inner.settings.balance_ttl);
        Ok(balance)
    }

    async fn cached_rate(&self, symbol: &str, fiat: &str) -> Result<Rate, ProviderError> {
        let rate_symbol = rate_symbol(symbol);
        let key = format!("rate:{rate_symbol}:{fiat}");
        if let Some(rate) = self.inner.rate_cache.get(&key) {
            debug!(symbol = rate_symbol, fiat, "Rate cache hit");
            return Ok(rate);
        }

        let rate = self
            .inner
            .rates
            .get_rate(rate_symbol, fiat)
            .await
            .map_err(|source| ProviderError::Rate {
                symbol: rate_symbol.to_string(),
                fiat: fiat.to_string(),
                source,
            })?;

        self.inner
            .rate_cache
            .set(key, rate, self.inner.settings.rate_ttl);
        Ok(rate)
    }
}

#[async_trait]
impl BalanceProvider for BalanceAggregator {
    async fn get_balance(
        &self,
        symbol: &str,
        address: &str,
        fiat_symbol: &str,
    ) -> Result<BalanceResult, ProviderError> {
        let symbol = normalize_symbol(symbol);
        let fiat = match normalize_symbol(fiat_symbol) {
            fiat if fiat.is_empty() => DEFAULT_FIAT.to_string(),
            fiat => fiat,
        };

        if !self.inner.providers.contains_key(&symbol) {
            return Err(ProviderError::UnknownSymbol(symbol));
        }

        let balance = self.cached_balance(&symbol, address).await?;
        let rate = self.cached_rate(&symbol, &fiat).await?;

        Ok(BalanceResult {
            crypto_symbol: symbol,
            address: address.to_string(),
            crypto_balance: balance,
            fiat_symbol: fiat,
            fiat_value: balance * rate.rate,
            exchange_rate: rate.rate,
            timestamp: Utc::now(),
            change_24h: balance * rate.change_24h.unwrap_or(0.0),
            error: None,
        })
    }

    async fn get_batch_balances(&self, requests: Vec<BalanceRequest>) -> Vec<BalanceResult> {
        let tasks: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let aggregator = self.clone();
                let task_request = request.clone();
                let handle = tokio::spawn(async move {
                    aggregator
                        .get_balance(
                            &task_request.crypto_symbol,
                            &task_request.address,
                            &task_request.fiat_symbol,
                        )
                        .await
                });
                (request, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for (index, (request, task)) in tasks.into_iter().enumerate() {
            let result = match task.await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!(
                        index,
                        symbol = %request.crypto_symbol,
                        address = %request.address,
                        error = %e,
                        "Batch balance request failed"
                    );
                    BalanceResult::failed(&request, e.to_string())
                }
                Err(e) => {
                    warn!(index, error = %e, "Batch balance task aborted");
                    BalanceResult::failed(&request, format!("balance task aborted: {e}"))
                }
            };
            results.push(result);
        }
        results
    }
}
