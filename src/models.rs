// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and result types shared by the aggregator and the REST API. All
//! types derive `Serialize`, `Deserialize`, and `ToSchema` and use camelCase
//! field names on the wire.
//!
//! ## Symbols
//!
//! Crypto symbols are matched case-insensitively and normalised to upper
//! case. Testnet chains carry a `_TESTNET` suffix (`BTC_TESTNET`), which is
//! stripped when pricing: testnet coins are quoted at the mainnet rate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fiat currency used when a request leaves it empty.
pub const DEFAULT_FIAT: &str = "USD";

/// Suffix marking a testnet symbol.
pub const TESTNET_SUFFIX: &str = "_TESTNET";

/// Upper-case a crypto or fiat symbol.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

/// Symbol used for exchange-rate lookup: the mainnet symbol for testnets.
pub fn rate_symbol(symbol: &str) -> &str {
    symbol.strip_suffix(TESTNET_SUFFIX).unwrap_or(symbol)
}

/// One balance lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRequest {
    /// Crypto symbol, e.g. `BTC`, `ETH_TESTNET`, `KAS`.
    pub crypto_symbol: String,
    /// Address, or extended public key for BTC, LTC and KAS.
    pub address: String,
    /// Fiat symbol; defaults to `USD` when empty.
    #[serde(default)]
    pub fiat_symbol: String,
}

impl BalanceRequest {
    pub fn new(
        crypto_symbol: impl Into<String>,
        address: impl Into<String>,
        fiat_symbol: impl Into<String>,
    ) -> Self {
        Self {
            crypto_symbol: crypto_symbol.into(),
            address: address.into(),
            fiat_symbol: fiat_symbol.into(),
        }
    }
}

/// A crypto balance priced in fiat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResult {
    pub crypto_symbol: String,
    pub address: String,
    /// Balance in whole-coin units.
    pub crypto_balance: f64,
    pub fiat_symbol: String,
    /// `crypto_balance * exchange_rate`.
    pub fiat_value: f64,
    pub exchange_rate: f64,
    pub timestamp: DateTime<Utc>,
    /// Fiat-denominated 24h change of the holding.
    #[serde(rename = "change24h")]
    pub change_24h: f64,
    /// Set only on failed batch entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BalanceResult {
    /// Result slot for a failed batch entry: identifiers echoed, numbers zeroed.
    pub fn failed(request: &BalanceRequest, error: impl Into<String>) -> Self {
        Self {
            crypto_symbol: normalize_symbol(&request.crypto_symbol),
            address: request.address.clone(),
            crypto_balance: 0.0,
            fiat_symbol: normalize_symbol(&request.fiat_symbol),
            fiat_value: 0.0,
            exchange_rate: 0.0,
            timestamp: Utc::now(),
            change_24h: 0.0,
            error: Some(error.into()),
        }
    }
}
