// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bitcoin and Litecoin balance provider.
//!
//! The address argument is an extended public key. Its receive and change
//! addresses are derived once per key and cached; each address's Electrum
//! scripthash is then queried and the confirmed plus unconfirmed amounts are
//! summed. A failed lookup for any single address fails the whole attempt;
//! the retry budget covers the whole sum.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::connection::ManagedConnection;
use super::electrum::{ElectrumConnector, ScripthashBalance};
use super::{from_smallest_unit, with_timeout, ChainError, CryptoProvider, RetryPolicy};
use crate::derivation::{
    derive_utxo_addresses, AddressCounts, ChainNetwork, DerivationCache, DerivationError,
    DerivedAddress, UtxoCoin, DEFAULT_DERIVATION_CACHE_CAPACITY, DEFAULT_UTXO_ADDRESS_COUNT,
};

/// Satoshis per coin, as a power of ten.
const COIN_DECIMALS: u32 = 8;

/// Source of summed scripthash balances.
#[async_trait]
pub trait ScripthashSource: Send + Sync {
    /// Confirmed plus unconfirmed total over `scripthashes`, in satoshis.
    /// Fails if any single lookup fails.
    async fn total_balance(&self, scripthashes: Arc<Vec<String>>) -> Result<i128, ChainError>;
}

#[async_trait]
impl ScripthashSource for ManagedConnection<ElectrumConnector> {
    async fn total_balance(&self, scripthashes: Arc<Vec<String>>) -> Result<i128, ChainError> {
        self.call_steps(|client, limit| {
            let scripthashes = Arc::clone(&scripthashes);
            async move {
                let mut total: i128 = 0;
                for scripthash in scripthashes.iter() {
                    let balance: ScripthashBalance =
                        with_timeout(limit, client.get_balance(scripthash)).await?;
                    total += balance.total();
                }
                Ok(total)
            }
        })
        .await
    }
}

/// Balance provider for one Bitcoin-family chain and network.
pub struct UtxoProvider<S = ManagedConnection<ElectrumConnector>> {
    coin: UtxoCoin,
    network: ChainNetwork,
    counts: AddressCounts,
    source: S,
    scripthashes: DerivationCache<Vec<String>>,
}

impl UtxoProvider {
    /// Connect to an Electrum server, blocking until the first session is up.
    pub async fn connect(
        coin: UtxoCoin,
        network: ChainNetwork,
        server: &str,
        policy: RetryPolicy,
    ) -> Self {
        let connector = ElectrumConnector::new(coin.name(), server);
        let connection = ManagedConnection::establish(connector, policy).await;
        Self::with_source(coin, network, connection)
    }
}

impl<S: ScripthashSource> UtxoProvider<S> {
    pub fn with_source(coin: UtxoCoin, network: ChainNetwork, source: S) -> Self {
        Self {
            coin,
            network,
            counts: AddressCounts::uniform(DEFAULT_UTXO_ADDRESS_COUNT),
            source,
            scripthashes: DerivationCache::new(DEFAULT_DERIVATION_CACHE_CAPACITY),
        }
    }

    pub fn with_counts(mut self, counts: AddressCounts) -> Self {
        self.counts = counts;
        self
    }

    fn scripthashes_for(&self, xpub: &str) -> Result<Arc<Vec<String>>, DerivationError> {
        self.scripthashes.get_or_try_insert(xpub, || {
            let set = derive_utxo_addresses(xpub, self.coin, self.network, self.counts)?;
            debug!(
                chain = self.coin.name(),
                receive = set.receive.len(),
                change = set.change.len(),
                "Derived addresses"
            );
            Ok(set.iter().map(DerivedAddress::scripthash).collect())
        })
    }

    /// Sum the balances of every address derived from `xpub`, in satoshis.
    pub async fn sum_xpub_balance(&self, xpub: &str) -> Result<i128, ChainError> {
        let scripthashes = self.scripthashes_for(xpub)?;
        self.source.total_balance(scripthashes).await
    }
}

#[async_trait]
impl<S: ScripthashSource> CryptoProvider for UtxoProvider<S> {
    async fn get_balance(&self, address: &str) -> Result<f64, ChainError> {
        let satoshis = self.sum_xpub_balance(address).await?;
        from_smallest_unit(satoshis, COIN_DECIMALS)
    }
}
