// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Exchange-rate client for the CMC REST service.
//!
//! The service answers `GET /v1/rate/{currency}/{fiat}` with the current
//! price and, when known, the 24h fractional change.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Request timeout for rate lookups.
const RATE_TIMEOUT: Duration = Duration::from_secs(10);

/// A spot exchange rate.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rate {
    pub rate: f64,
    #[serde(rename = "change24h", default)]
    pub change_24h: Option<f64>,
}

/// Errors that can occur while fetching a rate.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("Rate request failed: {0}")]
    Request(String),

    #[error("Rate service returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid rate response: {0}")]
    InvalidResponse(String),
}

/// Source of crypto → fiat exchange rates.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Rate for one unit of `crypto` in `fiat`. Both symbols are upper case.
    async fn get_rate(&self, crypto: &str, fiat: &str) -> Result<Rate, RateError>;
}

/// HTTP client for the CMC REST rate service.
#[derive(Clone)]
pub struct CmcRateClient {
    http: Client,
    base_url: String,
}

impl CmcRateClient {
    pub fn new(base_url: &str) -> Result<Self, RateError> {
        url::Url::parse(base_url)
            .map_err(|e| RateError::Request(format!("invalid base URL {base_url}: {e}")))?;
        let http = Client::builder()
            .timeout(RATE_TIMEOUT)
            .build()
            .map_err(|e| RateError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn rate_url(&self, crypto: &str, fiat: &str) -> String {
        format!("{}/v1/rate/{crypto}/{fiat}", self.base_url)
    }
}

#[async_trait]
impl RateSource for CmcRateClient {
    async fn get_rate(&self, crypto: &str, fiat: &str) -> Result<Rate, RateError> {
        let url = self.rate_url(crypto, fiat);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RateError::Request(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RateError::UnexpectedStatus { status, body });
        }

        let rate: Rate = response
            .json()
            .await
            .map_err(|e| RateError::InvalidResponse(format!("GET {url}: {e}")))?;
        debug!(crypto, fiat, rate = rate.rate, "Fetched exchange rate");
        Ok(rate)
    }
}
