// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Symbol → provider registry built from configured endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::ethereum::EthereumProvider;
use super::kaspa::KaspaProvider;
use super::solana::SolanaProvider;
use super::utxo::UtxoProvider;
use super::{ChainError, CryptoProvider, RetryPolicy};
use crate::config::ChainEndpoints;
use crate::derivation::{ChainNetwork, UtxoCoin};

/// Providers keyed by upper-case crypto symbol (`BTC`, `ETH_TESTNET`, ...).
pub type ProviderMap = HashMap<String, Arc<dyn CryptoProvider>>;

/// Connect a provider for every configured chain.
///
/// Connection-oriented providers block until their first connection is up,
/// so startup waits for every enabled chain. Only malformed endpoints fail.
pub async fn build_registry(
    chains: &ChainEndpoints,
    policy: RetryPolicy,
) -> Result<ProviderMap, ChainError> {
    let mut providers = ProviderMap::new();

    let utxo = [
        ("BTC", UtxoCoin::Bitcoin, ChainNetwork::Mainnet, &chains.bitcoin_electrum),
        (
            "BTC_TESTNET",
            UtxoCoin::Bitcoin,
            ChainNetwork::Testnet,
            &chains.bitcoin_testnet_electrum,
        ),
        ("LTC", UtxoCoin::Litecoin, ChainNetwork::Mainnet, &chains.litecoin_electrum),
        (
            "LTC_TESTNET",
            UtxoCoin::Litecoin,
            ChainNetwork::Testnet,
            &chains.litecoin_testnet_electrum,
        ),
    ];
    for (symbol, coin, network, server) in utxo {
        if let Some(server) = server {
            let provider = UtxoProvider::connect(coin, network, server, policy).await;
            register(&mut providers, symbol, server, Arc::new(provider));
        }
    }

    let ethereum = [
        ("ETH", "ethereum", &chains.ethereum_rpc),
        ("ETH_TESTNET", "ethereum-testnet", &chains.ethereum_testnet_rpc),
    ];
    for (symbol, chain, rpc_url) in ethereum {
        if let Some(rpc_url) = rpc_url {
            let provider = EthereumProvider::connect(chain, rpc_url, policy).await?;
            register(&mut providers, symbol, rpc_url, Arc::new(provider));
        }
    }

    let solana = [
        ("SOL", "solana", &chains.solana_rpc),
        ("SOL_TESTNET", "solana-testnet", &chains.solana_testnet_rpc),
    ];
    for (symbol, chain, rpc_url) in solana {
        if let Some(rpc_url) = rpc_url {
            let provider = SolanaProvider::connect(chain, rpc_url, policy).await?;
            register(&mut providers, symbol, rpc_url, Arc::new(provider));
        }
    }

    if let Some(explorer_url) = &chains.kaspa_explorer {
        let provider = KaspaProvider::new(explorer_url, ChainNetwork::Mainnet)?;
        register(&mut providers, "KAS", explorer_url, Arc::new(provider));
    }

    info!(count = providers.len(), "Chain providers ready");
    Ok(providers)
}

fn register(
    providers: &mut ProviderMap,
    symbol: &str,
    endpoint: &str,
    provider: Arc<dyn CryptoProvider>,
) {
    info!(symbol, endpoint, "Registered chain provider");
    providers.insert(symbol.to_string(), provider);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::connection::tests::fast_policy;

    #[tokio::test]
    async fn registers_only_configured_chains() {
        let chains = ChainEndpoints {
            kaspa_explorer: Some("https://api.kaspa.org".into()),
            ..ChainEndpoints::none()
        };

        let providers = build_registry(&chains, fast_policy()).await.unwrap();

        assert_eq!(providers.len(), 1);
        assert!(providers.contains_key("KAS"));
    }

    #[tokio::test]
    async fn nothing_configured_is_empty() {
        let providers = build_registry(&ChainEndpoints::none(), fast_policy())
            .await
            .unwrap();
        assert!(providers.is_empty());
    }

    #[tokio::test]
    async fn malformed_endpoint_fails() {
        let chains = ChainEndpoints {
            ethereum_rpc: Some("not a url".into()),
            ..ChainEndpoints::none()
        };

        let err = build_registry(&chains, fast_policy()).await.err().unwrap();
        assert!(matches!(err, ChainError::InvalidEndpoint(_)));
    }
}
