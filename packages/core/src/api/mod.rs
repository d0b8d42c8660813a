//! Read-only HTTP surface of the daemon.

pub mod gas;
pub mod headers;
pub mod health;
pub mod metrics;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Router};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::metrics::AppMetrics;
use crate::store::GasPriceStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<GasPriceStore>>,
    pub metrics: Arc<AppMetrics>,
}

/// Assemble the full router. `/metrics` is served outside the request
/// metrics layer so scrapes are not counted.
pub fn create_router(state: AppState) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics::render_metrics))
        .with_state(Arc::clone(&state.metrics));

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/gas/:chain_id", get(gas::latest_gas_price))
        .route("/gas/:chain_id/history", get(gas::gas_price_history))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.metrics),
            metrics::track_http_metrics,
        ))
        .with_state(state);

    api.merge(metrics_router).layer(CorsLayer::permissive())
}
