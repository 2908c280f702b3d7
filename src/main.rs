// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;
use std::sync::Arc;

use airgap_balance::{
    aggregator::BalanceAggregator,
    api::router,
    chains::{build_registry, RetryPolicy},
    config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER},
    providers::CmcRateClient,
    state::AppState,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match format {
        LogFormat::Json => Registry::default().with(filter).with(fmt::layer().json()).init(),
        LogFormat::Pretty => Registry::default().with(filter).with(fmt::layer()).init(),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging(LogFormat::from_env());

    let config = AppConfig::from_env();
    let shutdown = CancellationToken::new();

    info!("Connecting chain providers...");
    let providers = build_registry(&config.chains, RetryPolicy::default()).await?;
    let rates = CmcRateClient::new(&config.cmc_rest_url)?;

    let aggregator =
        BalanceAggregator::new(providers, Arc::new(rates), config.cache, shutdown.clone());
    info!(symbols = ?aggregator.symbols(), "Balance aggregator ready");

    let app = router(AppState::new(Arc::new(aggregator))).layer(TraceLayer::new_for_http());

    let addr = config.bind_address();
    let listener = TcpListener::bind(addr.as_str()).await?;
    info!(%addr, "Airgap balance server listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    info!("Server stopped");
    Ok(())
}
