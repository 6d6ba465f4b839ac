//! # Prometheus Metrics
//!
//! Exposes operational metrics for the ledger node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Outcome label for successful operations. Failures use the error kind.
pub const OUTCOME_OK: &str = "ok";

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Ledger operations by `operation` and `outcome` (`ok` or error kind).
    pub operations_total: IntCounterVec,
    /// Transfers currently in escrow.
    pub pending_transfers: IntGauge,
    /// Transfers ever created.
    pub transfers_total: IntGauge,
    /// Ledger operation latency in seconds, by `operation`.
    pub operation_latency_seconds: HistogramVec,
}

impl LedgerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("passlock".into()), None)?;

        let operations_total = IntCounterVec::new(
            Opts::new(
                "ledger_operations_total",
                "Ledger operations by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let pending_transfers = IntGauge::new(
            "pending_transfers",
            "Transfers currently holding funds in escrow",
        )?;
        registry.register(Box::new(pending_transfers.clone()))?;

        let transfers_total =
            IntGauge::new("transfers_total", "Transfers created since genesis")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "ledger_operation_latency_seconds",
                "Ledger operation latency in seconds",
            )
            .buckets(vec![
                0.000_05, 0.000_1, 0.000_25, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
            ]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            pending_transfers,
            transfers_total,
            operation_latency_seconds,
        })
    }

    /// Records one ledger operation.
    pub fn record(&self, operation: &str, outcome: &str, seconds: f64) {
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.operation_latency_seconds
            .with_label_values(&[operation])
            .observe(seconds);
    }

    /// Refreshes the gauges from ledger counters.
    pub fn set_counts(&self, pending: usize, total: usize) {
        self.pending_transfers.set(pending as i64);
        self.transfers_total.set(total as i64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<LedgerMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
