// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ethereum balance provider over JSON-RPC.

use std::str::FromStr;

use alloy::{
    network::Ethereum,
    primitives::{Address, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    transports::{RpcError, TransportErrorKind},
};
use async_trait::async_trait;
use tracing::debug;

use super::connection::{Connector, ManagedConnection};
use super::{from_smallest_unit, ChainError, CryptoProvider, RetryPolicy};

/// Wei per ether, as a power of ten.
const ETHER_DECIMALS: u32 = 18;

/// HTTP provider type (with the default fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Builds and probes alloy HTTP providers for one RPC endpoint.
pub struct EthereumConnector {
    chain: &'static str,
    rpc_url: url::Url,
}

impl EthereumConnector {
    pub fn new(chain: &'static str, rpc_url: &str) -> Result<Self, ChainError> {
        let rpc_url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidEndpoint(format!("{rpc_url}: {e}")))?;
        Ok(Self { chain, rpc_url })
    }
}

#[async_trait]
impl Connector for EthereumConnector {
    type Handle = HttpProvider;

    fn chain(&self) -> &'static str {
        self.chain
    }

    async fn connect(&self) -> Result<HttpProvider, ChainError> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());

        let network_id = provider.get_net_version().await.map_err(rpc_error)?;
        debug!(chain = self.chain, network_id, "Ethereum RPC reachable");

        Ok(provider)
    }
}

/// Ethereum (or Sepolia) native balance provider.
pub struct EthereumProvider {
    connection: ManagedConnection<EthereumConnector>,
}

impl EthereumProvider {
    /// Connect to `rpc_url`, blocking until the endpoint answers the probe.
    pub async fn connect(
        chain: &'static str,
        rpc_url: &str,
        policy: RetryPolicy,
    ) -> Result<Self, ChainError> {
        let connector = EthereumConnector::new(chain, rpc_url)?;
        Ok(Self {
            connection: ManagedConnection::establish(connector, policy).await,
        })
    }

    /// Raw balance in wei.
    pub async fn get_wei_balance(&self, address: &str) -> Result<U256, ChainError> {
        let addr = parse_address(address)?;
        self.connection
            .call(|provider| async move { provider.get_balance(addr).await.map_err(rpc_error) })
            .await
    }
}

#[async_trait]
impl CryptoProvider for EthereumProvider {
    async fn get_balance(&self, address: &str) -> Result<f64, ChainError> {
        let wei = self.get_wei_balance(address).await?;
        wei_to_ether(wei)
    }
}

/// Parse a 0x-prefixed hex address.
fn parse_address(address: &str) -> Result<Address, ChainError> {
    Address::from_str(address).map_err(|e| ChainError::InvalidAddress(format!("{address}: {e}")))
}

fn rpc_error(e: RpcError<TransportErrorKind>) -> ChainError {
    if e.is_transport_error() {
        ChainError::Connection(e.to_string())
    } else {
        ChainError::Rpc(e.to_string())
    }
}

/// Convert a wei amount to ether without passing through `f64` early.
fn wei_to_ether(wei: U256) -> Result<f64, ChainError> {
    let raw = u128::try_from(wei)
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .ok_or_else(|| ChainError::InvalidResponse(format!("balance {wei} wei out of range")))?;
    from_smallest_unit(raw, ETHER_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wei_to_ether() {
        // 1 ETH = 1e18 wei
        let one_eth = U256::from(1_000_000_000_000_000_000u64);
        assert_eq!(wei_to_ether(one_eth).unwrap(), 1.0);

        // 0.5 ETH
        let half_eth = U256::from(500_000_000_000_000_000u64);
        assert_eq!(wei_to_ether(half_eth).unwrap(), 0.5);

        // Zero
        assert_eq!(wei_to_ether(U256::ZERO).unwrap(), 0.0);

        // 120 million ETH, beyond u64 wei
        let supply = U256::from(120_000_000u64) * U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(wei_to_ether(supply).unwrap(), 120_000_000.0);
    }

    #[test]
    fn test_wei_overflow_is_rejected() {
        assert!(matches!(
            wei_to_ether(U256::MAX),
            Err(ChainError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e").is_ok());
        assert!(parse_address("0x742d35cc6634c0532925a3b844bc454e4438f44e").is_ok());

        for bad in [
            "",
            "0x1234",
            "742d35Cc6634C0532925a3b844Bc454e4438f44",
            "0xZZ2d35Cc6634C0532925a3b844Bc454e4438f44e",
        ] {
            assert!(
                matches!(parse_address(bad), Err(ChainError::InvalidAddress(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_rpc_url() {
        assert!(matches!(
            EthereumConnector::new("ethereum", "not a url"),
            Err(ChainError::InvalidEndpoint(_))
        ));
    }
}
