//! Gas polling scheduler.
//!
//! Each tick asks the gas service for every configured chain concurrently,
//! pushes the results into the store and publishes them as metrics, so the
//! API layer always serves recent prices.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::signal;
use tokio::sync::RwLock;
use tokio::time;

use crate::gas::{GasPriceRequest, GasService};
use crate::metrics::AppMetrics;
use crate::store::{GasPriceStore, GasSnapshot};
use crate::types::ChainId;

/// What to poll and how often.
#[derive(Debug, Clone)]
pub struct PollingPlan {
    pub chains: Vec<ChainId>,
    pub interval: Duration,
    /// Deadline of each chain's query.
    pub timeout: Option<Duration>,
}

/// Run the gas polling loop until `Ctrl+C` (SIGINT) is received.
///
/// A failed query is logged and counted; it never stops the loop.
pub async fn run_gas_polling(
    service: GasService,
    store: Arc<RwLock<GasPriceStore>>,
    metrics: Arc<AppMetrics>,
    plan: PollingPlan,
) {
    let mut interval = time::interval(plan.interval);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    tracing::info!(
        "Gas polling started for chains {:?} (interval: {:?})",
        plan.chains,
        plan.interval
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                poll_once(&service, &store, &metrics, &plan).await;
            }

            _ = signal::ctrl_c() => {
                tracing::info!("Shutdown signal received. Stopping polling.");
                break;
            }
        }
    }

    tracing::info!("Gas polling stopped cleanly");
}

/// Execute a single poll cycle over every chain of the plan.
pub async fn poll_once(
    service: &GasService,
    store: &Arc<RwLock<GasPriceStore>>,
    metrics: &AppMetrics,
    plan: &PollingPlan,
) {
    let polls = plan.chains.iter().map(|chain_id| async move {
        let mut request = GasPriceRequest::new(*chain_id);
        request.timeout = plan.timeout;
        (*chain_id, service.get_gas_price(&request).await)
    });

    for (chain_id, outcome) in join_all(polls).await {
        metrics.polls_total.inc();
        match outcome {
            Ok(prices) => {
                metrics.record_gas_prices(chain_id, &prices);
                tracing::debug!("Chain {}: {} speed(s) updated", chain_id, prices.len());
                store.write().await.push(GasSnapshot {
                    chain_id,
                    fetched_at: Utc::now(),
                    prices,
                });
            }
            Err(err) => {
                metrics.poll_errors_total.inc();
                tracing::error!("Gas polling error on chain {}, skipping tick: {}", chain_id, err);
            }
        }
    }
}
