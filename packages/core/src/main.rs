use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::RwLock;

use source_aggregator::api::{self, AppState};
use source_aggregator::cli::Cli;
use source_aggregator::config::Config;
use source_aggregator::error::AppError;
use source_aggregator::logging::init_logging;
use source_aggregator::metrics::AppMetrics;
use source_aggregator::scheduler::{run_gas_polling, PollingPlan};
use source_aggregator::setup::build_gas_service;
use source_aggregator::store::{GasPriceStore, DEFAULT_CAPACITY};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    if let Err(err) = run(Cli::parse()).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::from_env()
        .and_then(|config| config.apply_cli(&cli))
        .map_err(AppError::Config)?;
    tracing::info!(
        "Service starting: chains {:?}, aggregation {}, source timeout {:?}",
        config.chains,
        config.aggregation,
        config.source_timeout
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!("source-aggregator/", env!("CARGO_PKG_VERSION")))
        .timeout(config.source_timeout)
        .build()
        .map_err(|err| AppError::Network(err.to_string()))?;
    let service = build_gas_service(&config, http)?;

    let store = Arc::new(RwLock::new(GasPriceStore::new(DEFAULT_CAPACITY)));
    let metrics = Arc::new(
        AppMetrics::new().map_err(|err| AppError::Config(format!("metrics: {}", err)))?,
    );

    let app = api::create_router(AppState {
        store: Arc::clone(&store),
        metrics: Arc::clone(&metrics),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Network(format!("cannot bind {}: {}", addr, err)))?;
    tracing::info!("HTTP API listening on {}", addr);

    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!("HTTP server stopped: {}", err);
        }
    });

    let plan = PollingPlan {
        chains: config.chains.clone(),
        interval: config.poll_interval(),
        timeout: Some(config.source_timeout),
    };
    run_gas_polling(service, store, metrics, plan).await;

    server.abort();
    Ok(())
}
