// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Kaspa balance provider over the explorer REST API.
//!
//! Kaspa has no per-address RPC round-trip here: every derived address is
//! posted to the explorer's bulk endpoint in one request and the returned
//! balances are summed. There is no persistent connection, so this provider
//! does not go through [`ManagedConnection`](super::ManagedConnection).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChainError, CryptoProvider, BALANCE_TIMEOUT};
use crate::derivation::{
    derive_kaspa_addresses, AddressCounts, ChainNetwork, DerivationCache, DerivationError,
    DEFAULT_DERIVATION_CACHE_CAPACITY, DEFAULT_KASPA_ADDRESS_COUNT,
};

/// Sompi per KAS.
const SOMPI_PER_KAS: u64 = 100_000_000;

#[derive(Serialize)]
struct BalancesRequest<'a> {
    addresses: &'a [String],
}

/// One entry of the bulk response; the echoed `address` is not needed.
#[derive(Debug, Deserialize)]
struct AddressBalance {
    /// Sompi, encoded by the explorer as a JSON integer.
    balance: u64,
}

/// Kaspa balance provider backed by an explorer instance.
pub struct KaspaProvider {
    http: reqwest::Client,
    balances_url: String,
    network: ChainNetwork,
    counts: AddressCounts,
    addresses: DerivationCache<Vec<String>>,
}

impl KaspaProvider {
    /// Create a provider for `explorer_url` (e.g. `https://api.kaspa.org`).
    pub fn new(explorer_url: &str, network: ChainNetwork) -> Result<Self, ChainError> {
        Self::with_timeout(explorer_url, network, BALANCE_TIMEOUT)
    }

    pub fn with_timeout(
        explorer_url: &str,
        network: ChainNetwork,
        timeout: Duration,
    ) -> Result<Self, ChainError> {
        let base = url::Url::parse(explorer_url)
            .map_err(|e| ChainError::InvalidEndpoint(format!("{explorer_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            balances_url: format!("{}/addresses/balances", base.as_str().trim_end_matches('/')),
            network,
            counts: AddressCounts::uniform(DEFAULT_KASPA_ADDRESS_COUNT),
            addresses: DerivationCache::new(DEFAULT_DERIVATION_CACHE_CAPACITY),
        })
    }

    pub fn with_counts(mut self, counts: AddressCounts) -> Self {
        self.counts = counts;
        self
    }

    fn addresses_for(&self, kpub: &str) -> Result<Arc<Vec<String>>, DerivationError> {
        self.addresses.get_or_try_insert(kpub, || {
            let set = derive_kaspa_addresses(kpub, self.network, self.counts)?;
            debug!(
                receive = set.receive.len(),
                change = set.change.len(),
                "Derived Kaspa addresses"
            );
            Ok(set.iter().cloned().collect())
        })
    }

    /// POST `addresses` to the bulk endpoint and sum the balances in sompi.
    async fn fetch_total_sompi(&self, addresses: &[String]) -> Result<Decimal, ChainError> {
        let response = self
            .http
            .post(&self.balances_url)
            .json(&BalancesRequest { addresses })
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let balances: Vec<AddressBalance> = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("address balances: {e}")))?;

        balances.iter().try_fold(Decimal::ZERO, |total, entry| {
            total
                .checked_add(Decimal::from(entry.balance))
                .ok_or_else(|| ChainError::InvalidResponse("balance sum overflows".to_string()))
        })
    }
}

#[async_trait]
impl CryptoProvider for KaspaProvider {
    async fn get_balance(&self, address: &str) -> Result<f64, ChainError> {
        let addresses = self.addresses_for(address)?;
        let sompi = self.fetch_total_sompi(&addresses).await?;

        (sompi / Decimal::from(SOMPI_PER_KAS))
            .to_f64()
            .ok_or_else(|| ChainError::InvalidResponse(format!("balance {sompi} out of range")))
    }
}
