// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Minimal Electrum protocol client.
//!
//! Electrum speaks newline-delimited JSON-RPC over a plain TCP session. Only
//! the calls needed for watch-only balance lookup are implemented:
//! `server.version` (used as the liveness probe) and
//! `blockchain.scripthash.get_balance`.
//!
//! Requests on one session are serialized. Lines that are notifications or
//! answer an abandoned request are skipped until the matching id arrives.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use super::connection::Connector;
use super::ChainError;

/// Client name announced in `server.version`.
const CLIENT_NAME: &str = "airgap-balance";

/// Protocol version requested in `server.version`.
const PROTOCOL_VERSION: &str = "1.4";

/// Confirmed and mempool balance of one scripthash, in satoshis.
///
/// `unconfirmed` is negative when mempool transactions spend confirmed coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScripthashBalance {
    pub confirmed: i64,
    pub unconfirmed: i64,
}

impl ScripthashBalance {
    pub fn total(&self) -> i128 {
        i128::from(self.confirmed) + i128::from(self.unconfirmed)
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// One Electrum TCP session.
pub struct ElectrumClient {
    server: String,
    session: Mutex<Session>,
    next_id: AtomicU64,
    shutdown: AtomicBool,
}

impl ElectrumClient {
    /// Open a TCP session to `server` (`host:port`).
    pub async fn connect(server: &str) -> Result<Self, ChainError> {
        let stream = TcpStream::connect(server)
            .await
            .map_err(|e| ChainError::Connection(format!("{server}: {e}")))?;
        stream.set_nodelay(true).ok();
        let (reader, writer) = stream.into_split();

        Ok(Self {
            server: server.to_string(),
            session: Mutex::new(Session {
                reader: BufReader::new(reader),
                writer,
            }),
            next_id: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Whether the session has hit EOF or an I/O error.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// `server.version`; returns `[server_software, protocol_version]`.
    pub async fn server_version(&self) -> Result<Vec<String>, ChainError> {
        self.request("server.version", json!([CLIENT_NAME, PROTOCOL_VERSION]))
            .await
    }

    /// `blockchain.scripthash.get_balance`.
    pub async fn get_balance(&self, scripthash: &str) -> Result<ScripthashBalance, ChainError> {
        self.request("blockchain.scripthash.get_balance", json!([scripthash]))
            .await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainError> {
        if self.is_shutdown() {
            return Err(ChainError::Connection(format!("{}: session closed", self.server)));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut line = serde_json::to_string(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;
        line.push('\n');

        let mut session = self.session.lock().await;
        if let Err(e) = session.writer.write_all(line.as_bytes()).await {
            return Err(self.fail(e));
        }

        loop {
            let mut buf = String::new();
            match session.reader.read_line(&mut buf).await {
                Ok(0) => {
                    self.shutdown.store(true, Ordering::SeqCst);
                    return Err(ChainError::Connection(format!(
                        "{}: connection closed by server",
                        self.server
                    )));
                }
                Ok(_) => {}
                Err(e) => return Err(self.fail(e)),
            }

            let response: RpcResponse = match serde_json::from_str(buf.trim_end()) {
                Ok(response) => response,
                Err(e) => {
                    debug!(server = %self.server, error = %e, "Skipping unparseable Electrum line");
                    continue;
                }
            };
            if response.id != Some(id) {
                continue;
            }

            if let Some(error) = response.error {
                return Err(ChainError::Rpc(format!("{method}: {error}")));
            }
            let result = response
                .result
                .ok_or_else(|| ChainError::InvalidResponse(format!("{method}: missing result")))?;
            return serde_json::from_value(result)
                .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")));
        }
    }

    fn fail(&self, e: std::io::Error) -> ChainError {
        self.shutdown.store(true, Ordering::SeqCst);
        ChainError::Connection(format!("{}: {e}", self.server))
    }
}

/// Dials Electrum sessions for one server.
pub struct ElectrumConnector {
    chain: &'static str,
    server: String,
}

impl ElectrumConnector {
    pub fn new(chain: &'static str, server: impl Into<String>) -> Self {
        Self {
            chain,
            server: server.into(),
        }
    }
}

#[async_trait]
impl Connector for ElectrumConnector {
    type Handle = ElectrumClient;

    fn chain(&self) -> &'static str {
        self.chain
    }

    async fn connect(&self) -> Result<ElectrumClient, ChainError> {
        let client = ElectrumClient::connect(&self.server).await?;
        let version = client.server_version().await?;
        debug!(chain = self.chain, server = %self.server, ?version, "Electrum server version");
        Ok(client)
    }

    fn is_alive(&self, client: &ElectrumClient) -> bool {
        !client.is_shutdown()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use tokio::net::TcpListener;

    use super::*;

    /// Serve one Electrum session on loopback, answering each request with
    /// `respond(method, params)`. A `None` answer closes the session.
    pub(crate) async fn spawn_server<F>(respond: F) -> String
    where
        F: Fn(&str, &Value) -> Option<Vec<String>> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let respond = std::sync::Arc::new(respond);
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let respond = std::sync::Arc::clone(&respond);
                tokio::spawn(async move {
                    let (reader, mut writer) = stream.into_split();
                    let mut lines = BufReader::new(reader).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let request: Value = serde_json::from_str(&line).unwrap();
                        let method = request["method"].as_str().unwrap_or_default().to_string();
                        let id = request["id"].clone();
                        let Some(replies) = (*respond)(&method, &request["params"]) else {
                            return;
                        };
                        for reply in replies {
                            let reply = reply.replace("$ID", &id.to_string());
                            writer.write_all(reply.as_bytes()).await.unwrap();
                            writer.write_all(b"\n").await.unwrap();
                        }
                    }
                });
            }
        });

        addr
    }

    /// Standard reply for `server.version` and `get_balance`.
    pub(crate) fn balance_server(
        confirmed: i64,
    ) -> impl Fn(&str, &Value) -> Option<Vec<String>> + Send + Sync + 'static {
        move |method: &str, _params: &Value| {
            let result = match method {
                "server.version" => json!(["ElectrumX 1.16.0", "1.4"]),
                "blockchain.scripthash.get_balance" => {
                    json!({"confirmed": confirmed, "unconfirmed": 0})
                }
                _ => {
                    let error = r#"{"code":-32601,"message":"unknown method"}"#;
                    return Some(vec![format!(r#"{{"jsonrpc":"2.0","id":$ID,"error":{error}}}"#)]);
                }
            };
            Some(vec![format!(r#"{{"jsonrpc":"2.0","id":$ID,"result":{result}}}"#)])
        }
    }

    #[tokio::test]
    async fn version_and_balance() {
        let addr = spawn_server(balance_server(150_000)).await;
        let client = ElectrumClient::connect(&addr).await.unwrap();

        let version = client.server_version().await.unwrap();
        assert_eq!(version[1], "1.4");

        let balance = client.get_balance("ab".repeat(32).as_str()).await.unwrap();
        assert_eq!(balance, ScripthashBalance { confirmed: 150_000, unconfirmed: 0 });
        assert!(!client.is_shutdown());
    }

    #[tokio::test]
    async fn skips_notifications_and_stale_ids() {
        let addr = spawn_server(|_method, _params| {
            let notification =
                r#"{"jsonrpc":"2.0","method":"blockchain.headers.subscribe","params":[{}]}"#;
            let stale = r#"{"jsonrpc":"2.0","id":999,"result":"stale"}"#;
            let reply = r#"{"jsonrpc":"2.0","id":$ID,"result":{"confirmed":5,"unconfirmed":-2}}"#;
            Some(vec![notification.to_string(), stale.to_string(), reply.to_string()])
        })
        .await;
        let client = ElectrumClient::connect(&addr).await.unwrap();

        let balance = client.get_balance("00").await.unwrap();
        assert_eq!(balance.total(), 3);
    }

    #[tokio::test]
    async fn rpc_error_is_surfaced() {
        let addr = spawn_server(balance_server(0)).await;
        let client = ElectrumClient::connect(&addr).await.unwrap();

        let err = client
            .request::<Value>("blockchain.unknown", json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rpc(_)));
        assert!(!client.is_shutdown());
    }

    #[tokio::test]
    async fn closed_session_marks_shutdown() {
        let addr = spawn_server(|_method, _params| None).await;
        let client = ElectrumClient::connect(&addr).await.unwrap();

        let err = client.server_version().await.unwrap_err();
        assert!(err.is_connection_fault());
        assert!(client.is_shutdown());

        // Later requests fail fast without touching the socket.
        assert!(matches!(
            client.get_balance("00").await,
            Err(ChainError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn connector_probes_server_version() {
        let addr = spawn_server(balance_server(0)).await;
        let connector = ElectrumConnector::new("bitcoin", addr);

        let client = connector.connect().await.unwrap();
        assert!(connector.is_alive(&client));
    }

    #[tokio::test]
    async fn connect_refused_is_connection_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = ElectrumClient::connect(&addr).await.err().unwrap();
        assert!(matches!(err, ChainError::Connection(_)));
    }
}
