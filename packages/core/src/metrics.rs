//! Prometheus metrics registry for the aggregation daemon.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it to
//! the scheduler and HTTP middleware. Exposed at `GET /metrics` in the
//! Prometheus text format (`text/plain; version=0.0.4`).

use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry,
};

use crate::gas::GasPriceResult;
use crate::timeouts::orphaned_operations;
use crate::types::ChainId;

pub struct AppMetrics {
    /// Gas polling attempts across chains (success + failure).
    pub polls_total: Counter,
    pub poll_errors_total: Counter,
    /// Latest highest fee per gas in wei, labelled by chain and speed.
    pub gas_price_wei: GaugeVec,
    /// Operations still running after their caller timed out.
    pub orphaned_operations: Gauge,
    pub http_requests_total: CounterVec,
    pub http_request_duration: Histogram,
    pub registry: Registry,
}

impl AppMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let polls_total = Counter::with_opts(Opts::new(
            "source_aggregator_polls_total",
            "Total gas price polling attempts",
        ))?;

        let poll_errors_total = Counter::with_opts(Opts::new(
            "source_aggregator_poll_errors_total",
            "Failed gas price polling attempts",
        ))?;

        let gas_price_wei = GaugeVec::new(
            Opts::new(
                "source_aggregator_gas_price_wei",
                "Latest aggregated max fee per gas in wei",
            ),
            &["chain_id", "speed"],
        )?;

        let orphaned_operations = Gauge::with_opts(Opts::new(
            "source_aggregator_orphaned_operations",
            "Operations still running after their caller timed out",
        ))?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "source_aggregator_http_requests_total",
                "HTTP requests by method, path, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "source_aggregator_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(polls_total.clone()))?;
        registry.register(Box::new(poll_errors_total.clone()))?;
        registry.register(Box::new(gas_price_wei.clone()))?;
        registry.register(Box::new(orphaned_operations.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            polls_total,
            poll_errors_total,
            gas_price_wei,
            orphaned_operations,
            http_requests_total,
            http_request_duration,
            registry,
        })
    }

    /// Publish the prices of one chain.
    ///
    /// Gauges hold `f64`, so very large wei amounts lose precision here.
    pub fn record_gas_prices(&self, chain_id: ChainId, prices: &GasPriceResult) {
        let chain = chain_id.to_string();
        for (speed, price) in prices.iter() {
            let speed = speed.to_string();
            self.gas_price_wei
                .with_label_values(&[chain.as_str(), speed.as_str()])
                .set(price.max_price_per_gas() as f64);
        }
    }

    /// Render all metrics as Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        self.orphaned_operations.set(orphaned_operations() as f64);
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
