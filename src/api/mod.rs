// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Duration;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ErrorBody,
    models::{BalanceRequest, BalanceResult},
    state::AppState,
};

pub mod balance;
pub mod health;

/// Browser preflight cache lifetime.
const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/balance", get(balance::get_balance))
        .route("/balances", post(balance::get_batch_balances))
        .with_state(state);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(cors())
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(CORS_MAX_AGE)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        balance::get_balance,
        balance::get_batch_balances
    ),
    components(
        schemas(
            BalanceRequest,
            BalanceResult,
            ErrorBody,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Balances", description = "Fiat-priced wallet balances"),
        (name = "Health", description = "Liveness")
    )
)]
struct ApiDoc;
