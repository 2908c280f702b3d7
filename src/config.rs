// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8399` |
//! | `CMC_REST_URL` | Exchange-rate service base URL | `http://127.0.0.1:7392` |
//! | `BITCOIN_ELECTRUM` | Bitcoin Electrum server (`host:port`) | `electrum.blockstream.info:50001` |
//! | `BITCOIN_TESTNET_ELECTRUM` | Bitcoin testnet Electrum server | `electrum.blockstream.info:60001` |
//! | `LITECOIN_ELECTRUM` | Litecoin Electrum server | unset |
//! | `LITECOIN_TESTNET_ELECTRUM` | Litecoin testnet Electrum server | unset |
//! | `ETHEREUM_RPC` | Ethereum JSON-RPC URL | `https://eth.llamarpc.com` |
//! | `ETHEREUM_TESTNET_RPC` | Sepolia JSON-RPC URL | `https://eth-sepolia.public.blastapi.io` |
//! | `SOLANA_RPC` | Solana JSON-RPC URL | `https://api.mainnet-beta.solana.com` |
//! | `SOLANA_TESTNET_RPC` | Solana testnet JSON-RPC URL | `https://api.testnet.solana.com` |
//! | `KASPA_EXPLORER` | Kaspa explorer REST base URL | `https://api.kaspa.org` |
//! | `BALANCE_CACHE_TTL_SECS` | Balance cache lifetime | `30` |
//! | `RATE_CACHE_TTL_SECS` | Exchange-rate cache lifetime | `5` |
//! | `CACHE_SWEEP_INTERVAL_SECS` | Interval between cache sweeps | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! A chain endpoint set to the empty string disables that chain; it is then
//! not registered and requests for its symbol fail as unknown.

use std::time::Duration;

use tracing::warn;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const CMC_REST_URL_ENV: &str = "CMC_REST_URL";
pub const BITCOIN_ELECTRUM_ENV: &str = "BITCOIN_ELECTRUM";
pub const BITCOIN_TESTNET_ELECTRUM_ENV: &str = "BITCOIN_TESTNET_ELECTRUM";
pub const LITECOIN_ELECTRUM_ENV: &str = "LITECOIN_ELECTRUM";
pub const LITECOIN_TESTNET_ELECTRUM_ENV: &str = "LITECOIN_TESTNET_ELECTRUM";
pub const ETHEREUM_RPC_ENV: &str = "ETHEREUM_RPC";
pub const ETHEREUM_TESTNET_RPC_ENV: &str = "ETHEREUM_TESTNET_RPC";
pub const SOLANA_RPC_ENV: &str = "SOLANA_RPC";
pub const SOLANA_TESTNET_RPC_ENV: &str = "SOLANA_TESTNET_RPC";
pub const KASPA_EXPLORER_ENV: &str = "KASPA_EXPLORER";
pub const BALANCE_CACHE_TTL_ENV: &str = "BALANCE_CACHE_TTL_SECS";
pub const RATE_CACHE_TTL_ENV: &str = "RATE_CACHE_TTL_SECS";
pub const CACHE_SWEEP_INTERVAL_ENV: &str = "CACHE_SWEEP_INTERVAL_SECS";

/// Environment variable selecting the log output format.
///
/// `json` emits one JSON object per line; anything else uses the
/// human-readable formatter.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8399;
pub const DEFAULT_CMC_REST_URL: &str = "http://127.0.0.1:7392";
pub const DEFAULT_BITCOIN_ELECTRUM: &str = "electrum.blockstream.info:50001";
pub const DEFAULT_BITCOIN_TESTNET_ELECTRUM: &str = "electrum.blockstream.info:60001";
pub const DEFAULT_ETHEREUM_RPC: &str = "https://eth.llamarpc.com";
pub const DEFAULT_ETHEREUM_TESTNET_RPC: &str = "https://eth-sepolia.public.blastapi.io";
pub const DEFAULT_SOLANA_RPC: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_SOLANA_TESTNET_RPC: &str = "https://api.testnet.solana.com";
pub const DEFAULT_KASPA_EXPLORER: &str = "https://api.kaspa.org";

/// Default balance cache lifetime.
pub const DEFAULT_BALANCE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Default exchange-rate cache lifetime. Shorter than the balance TTL:
/// rates move faster and are cheap to refresh.
pub const DEFAULT_RATE_CACHE_TTL: Duration = Duration::from_secs(5);

pub const DEFAULT_CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else, or unset, is pretty.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }

    /// Read [`LOG_FORMAT_ENV`] from the process environment.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

/// Endpoints for every supported chain. `None` means disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoints {
    pub bitcoin_electrum: Option<String>,
    pub bitcoin_testnet_electrum: Option<String>,
    pub litecoin_electrum: Option<String>,
    pub litecoin_testnet_electrum: Option<String>,
    pub ethereum_rpc: Option<String>,
    pub ethereum_testnet_rpc: Option<String>,
    pub solana_rpc: Option<String>,
    pub solana_testnet_rpc: Option<String>,
    pub kaspa_explorer: Option<String>,
}

impl ChainEndpoints {
    /// All chains disabled.
    pub fn none() -> Self {
        Self {
            bitcoin_electrum: None,
            bitcoin_testnet_electrum: None,
            litecoin_electrum: None,
            litecoin_testnet_electrum: None,
            ethereum_rpc: None,
            ethereum_testnet_rpc: None,
            solana_rpc: None,
            solana_testnet_rpc: None,
            kaspa_explorer: None,
        }
    }
}

/// Cache lifetimes used by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub balance_ttl: Duration,
    pub rate_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            balance_ttl: DEFAULT_BALANCE_CACHE_TTL,
            rate_ttl: DEFAULT_RATE_CACHE_TTL,
            sweep_interval: DEFAULT_CACHE_SWEEP_INTERVAL,
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cmc_rest_url: String,
    pub chains: ChainEndpoints,
    pub cache: CacheSettings,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        // Unset -> default; set but empty -> disabled.
        let endpoint = |name: &str, default: Option<&str>| match lookup(name) {
            Some(value) => Some(value.trim().to_string()).filter(|v| !v.is_empty()),
            None => default.map(str::to_string),
        };

        let seconds = |name: &str, default: Duration| match lookup(name) {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(e) => {
                    warn!(
                        variable = name,
                        value = %value,
                        error = %e,
                        "Invalid duration, using default"
                    );
                    default
                }
            },
            None => default,
        };

        let mut sweep_interval = seconds(CACHE_SWEEP_INTERVAL_ENV, DEFAULT_CACHE_SWEEP_INTERVAL);
        if sweep_interval.is_zero() {
            warn!(
                variable = CACHE_SWEEP_INTERVAL_ENV,
                "Sweep interval must be positive, using default"
            );
            sweep_interval = DEFAULT_CACHE_SWEEP_INTERVAL;
        }

        let port = match lookup(PORT_ENV) {
            Some(value) => value.trim().parse::<u16>().unwrap_or_else(|e| {
                warn!(
                    variable = PORT_ENV,
                    value = %value,
                    error = %e,
                    "Invalid port, using default"
                );
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let log_format = LogFormat::parse(lookup(LOG_FORMAT_ENV).as_deref());

        Self {
            host: text(HOST_ENV, DEFAULT_HOST),
            port,
            cmc_rest_url: text(CMC_REST_URL_ENV, DEFAULT_CMC_REST_URL),
            chains: ChainEndpoints {
                bitcoin_electrum: endpoint(BITCOIN_ELECTRUM_ENV, Some(DEFAULT_BITCOIN_ELECTRUM)),
                bitcoin_testnet_electrum: endpoint(
                    BITCOIN_TESTNET_ELECTRUM_ENV,
                    Some(DEFAULT_BITCOIN_TESTNET_ELECTRUM),
                ),
                litecoin_electrum: endpoint(LITECOIN_ELECTRUM_ENV, None),
                litecoin_testnet_electrum: endpoint(LITECOIN_TESTNET_ELECTRUM_ENV, None),
                ethereum_rpc: endpoint(ETHEREUM_RPC_ENV, Some(DEFAULT_ETHEREUM_RPC)),
                ethereum_testnet_rpc: endpoint(
                    ETHEREUM_TESTNET_RPC_ENV,
                    Some(DEFAULT_ETHEREUM_TESTNET_RPC),
                ),
                solana_rpc: endpoint(SOLANA_RPC_ENV, Some(DEFAULT_SOLANA_RPC)),
                solana_testnet_rpc: endpoint(
                    SOLANA_TESTNET_RPC_ENV,
                    Some(DEFAULT_SOLANA_TESTNET_RPC),
                ),
                kaspa_explorer: endpoint(KASPA_EXPLORER_ENV, Some(DEFAULT_KASPA_EXPLORER)),
            },
            cache: CacheSettings {
                balance_ttl: seconds(BALANCE_CACHE_TTL_ENV, DEFAULT_BALANCE_CACHE_TTL),
                rate_ttl: seconds(RATE_CACHE_TTL_ENV, DEFAULT_RATE_CACHE_TTL),
                sweep_interval,
            },
            log_format,
        }
    }

    /// `host:port` string for binding the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]);

        assert_eq!(config.bind_address(), "0.0.0.0:8399");
        assert_eq!(config.cmc_rest_url, DEFAULT_CMC_REST_URL);
        assert_eq!(config.cache, CacheSettings::default());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(
            config.chains.bitcoin_electrum.as_deref(),
            Some(DEFAULT_BITCOIN_ELECTRUM)
        );
        assert_eq!(config.chains.kaspa_explorer.as_deref(), Some(DEFAULT_KASPA_EXPLORER));
        assert!(config.chains.litecoin_electrum.is_none());
    }

    #[test]
    fn empty_endpoint_disables_chain() {
        let config = load(&[(SOLANA_RPC_ENV, ""), (LITECOIN_ELECTRUM_ENV, "ltc.example:50001")]);

        assert!(config.chains.solana_rpc.is_none());
        assert_eq!(
            config.chains.litecoin_electrum.as_deref(),
            Some("ltc.example:50001")
        );
    }

    #[test]
    fn malformed_numbers_fall_back() {
        let config = load(&[
            (PORT_ENV, "eighty"),
            (BALANCE_CACHE_TTL_ENV, "-1"),
            (RATE_CACHE_TTL_ENV, "12"),
        ]);

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.cache.balance_ttl, DEFAULT_BALANCE_CACHE_TTL);
        assert_eq!(config.cache.rate_ttl, Duration::from_secs(12));
    }

    #[test]
    fn zero_sweep_interval_falls_back() {
        let config = load(&[(CACHE_SWEEP_INTERVAL_ENV, "0"), (BALANCE_CACHE_TTL_ENV, "0")]);

        assert_eq!(config.cache.sweep_interval, DEFAULT_CACHE_SWEEP_INTERVAL);
        // A zero TTL stays valid: it disables caching.
        assert_eq!(config.cache.balance_ttl, Duration::ZERO);
    }

    #[test]
    fn huge_ttl_is_accepted() {
        let config = load(&[(RATE_CACHE_TTL_ENV, "18446744073709551615")]);
        assert_eq!(config.cache.rate_ttl, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn json_log_format() {
        assert_eq!(load(&[(LOG_FORMAT_ENV, "JSON")]).log_format, LogFormat::Json);
        assert_eq!(load(&[(LOG_FORMAT_ENV, "text")]).log_format, LogFormat::Pretty);
    }
}
