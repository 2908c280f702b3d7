// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Balance query endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::{ApiError, ErrorBody},
    models::{BalanceRequest, BalanceResult},
    state::AppState,
};

/// Query parameters for a single balance lookup.
#[derive(Debug, Deserialize, IntoParams)]
pub struct BalanceQuery {
    /// Crypto symbol, e.g. `BTC` or `ETH_TESTNET`.
    pub crypto: Option<String>,
    /// Address, or extended public key for BTC, LTC and KAS.
    pub address: Option<String>,
    /// Fiat symbol.
    #[param(default = "USD")]
    pub fiat: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("missing query parameter: {name}"))),
    }
}

/// Balance of one address or extended key, priced in fiat.
#[utoipa::path(
    get,
    path = "/v1/balance",
    tag = "Balances",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Balance resolved", body = BalanceResult),
        (
            status = 400,
            description = "Missing parameter, unknown symbol or invalid address",
            body = ErrorBody
        ),
        (status = 502, description = "Chain or rate service failure", body = ErrorBody)
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceResult>, ApiError> {
    let crypto = required(query.crypto, "crypto")?;
    let address = required(query.address, "address")?;
    let fiat = query.fiat.unwrap_or_default();

    let result = state.provider.get_balance(&crypto, &address, &fiat).await?;
    Ok(Json(result))
}

/// Resolve many balances concurrently.
///
/// Always 200; failed entries carry an `error` field.
#[utoipa::path(
    post,
    path = "/v1/balances",
    tag = "Balances",
    request_body = Vec<BalanceRequest>,
    responses(
        (status = 200, description = "One result per request, in order", body = Vec<BalanceResult>)
    )
)]
pub async fn get_batch_balances(
    State(state): State<AppState>,
    Json(requests): Json<Vec<BalanceRequest>>,
) -> Json<Vec<BalanceResult>> {
    Json(state.provider.get_batch_balances(requests).await)
}
