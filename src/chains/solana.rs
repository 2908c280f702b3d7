// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana balance provider over JSON-RPC.
//!
//! Only `getVersion` (liveness probe) and `getBalance` are needed, so the
//! RPC is spoken directly with `reqwest` rather than through an SDK.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::connection::{Connector, ManagedConnection};
use super::{from_smallest_unit, ChainError, CryptoProvider, RetryPolicy};

/// Lamports per SOL, as a power of ten.
const SOL_DECIMALS: u32 = 9;

/// Length of an ed25519 public key.
const PUBKEY_LEN: usize = 32;

/// Commitment level used for balance reads.
const COMMITMENT: &str = "finalized";

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct BalanceResult {
    value: u64,
}

#[derive(Debug, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "solana-core")]
    pub solana_core: String,
}

/// JSON-RPC client for one Solana endpoint.
pub struct SolanaRpcClient {
    http: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl SolanaRpcClient {
    pub fn new(http: reqwest::Client, rpc_url: impl Into<String>) -> Self {
        Self {
            http,
            rpc_url: rpc_url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn get_version(&self) -> Result<VersionInfo, ChainError> {
        self.rpc("getVersion", json!([])).await
    }

    /// Balance in lamports at `finalized` commitment.
    pub async fn get_balance(&self, pubkey: &str) -> Result<u64, ChainError> {
        let result: BalanceResult = self
            .rpc("getBalance", json!([pubkey, { "commitment": COMMITMENT }]))
            .await?;
        Ok(result.value)
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .http
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::UnexpectedStatus { status, body });
        }

        let body: RpcResponse<T> = response.json().await?;
        if let Some(error) = body.error {
            return Err(ChainError::Rpc(format!(
                "{method}: {} (code {})",
                error.message, error.code
            )));
        }
        body.result
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method}: missing result")))
    }
}

/// Builds and probes Solana RPC clients.
pub struct SolanaConnector {
    chain: &'static str,
    http: reqwest::Client,
    rpc_url: String,
}

impl SolanaConnector {
    pub fn new(
        chain: &'static str,
        rpc_url: &str,
        policy: &RetryPolicy,
    ) -> Result<Self, ChainError> {
        url::Url::parse(rpc_url)
            .map_err(|e| ChainError::InvalidEndpoint(format!("{rpc_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .connect_timeout(policy.probe_timeout)
            .build()
            .map_err(|e| ChainError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            chain,
            http,
            rpc_url: rpc_url.to_string(),
        })
    }
}

#[async_trait]
impl Connector for SolanaConnector {
    type Handle = SolanaRpcClient;

    fn chain(&self) -> &'static str {
        self.chain
    }

    async fn connect(&self) -> Result<SolanaRpcClient, ChainError> {
        let client = SolanaRpcClient::new(self.http.clone(), self.rpc_url.clone());
        let version = client.get_version().await?;
        debug!(chain = self.chain, version = %version.solana_core, "Solana RPC reachable");
        Ok(client)
    }
}

/// Solana native balance provider.
pub struct SolanaProvider {
    connection: ManagedConnection<SolanaConnector>,
}

impl SolanaProvider {
    pub async fn connect(
        chain: &'static str,
        rpc_url: &str,
        policy: RetryPolicy,
    ) -> Result<Self, ChainError> {
        let connector = SolanaConnector::new(chain, rpc_url, &policy)?;
        Ok(Self {
            connection: ManagedConnection::establish(connector, policy).await,
        })
    }
}

#[async_trait]
impl CryptoProvider for SolanaProvider {
    async fn get_balance(&self, address: &str) -> Result<f64, ChainError> {
        validate_pubkey(address)?;
        let lamports = self
            .connection
            .call(|client| async move { client.get_balance(address).await })
            .await?;
        from_smallest_unit(i128::from(lamports), SOL_DECIMALS)
    }
}

/// A Solana address is the base58 encoding of a 32-byte public key.
fn validate_pubkey(address: &str) -> Result<(), ChainError> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| ChainError::InvalidAddress(format!("{address}: {e}")))?;
    if bytes.len() != PUBKEY_LEN {
        return Err(ChainError::InvalidAddress(format!(
            "{address}: expected {PUBKEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}
