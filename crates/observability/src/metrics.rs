//! Prometheus metrics
//!
//! Exporter initialization plus the metric set recorded by the engine.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Start the Prometheus exporter.
///
/// Serves `/metrics` on the given port.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Metric handles for aggregation runs.
///
/// # Metrics
///
/// * `ccpi_runs_total` - Completed aggregation runs
/// * `ccpi_run_duration_seconds` - Wall-clock duration per run
/// * `ccpi_score` / `ccpi_confidence` - Latest composite and confidence
/// * `ccpi_active_canaries` - Canaries active in the latest run
/// * `ccpi_indicators_unavailable` - Indicators with no raw value in the latest run
/// * `ccpi_indicator_resolutions_total{tier}` - Resolutions by tier
/// * `ccpi_adapter_failures_total{source,reason}` - Recovered adapter failures
#[derive(Clone)]
pub struct EngineMetrics {
    runs_total: Counter,
    run_duration: Histogram,
    score: Gauge,
    confidence: Gauge,
    active_canaries: Gauge,
    unavailable: Gauge,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            runs_total: counter!("ccpi_runs_total"),
            run_duration: histogram!("ccpi_run_duration_seconds"),
            score: gauge!("ccpi_score"),
            confidence: gauge!("ccpi_confidence"),
            active_canaries: gauge!("ccpi_active_canaries"),
            unavailable: gauge!("ccpi_indicators_unavailable"),
        }
    }

    /// Record the outcome of one aggregation run
    pub fn record_run(
        &self,
        duration: Duration,
        score: f64,
        confidence: f64,
        canaries: usize,
        unavailable: usize,
    ) {
        self.runs_total.increment(1);
        self.run_duration.record(duration.as_secs_f64());
        self.score.set(score);
        self.confidence.set(confidence);
        self.active_canaries.set(canaries as f64);
        self.unavailable.set(unavailable as f64);
    }

    /// Count one indicator resolution at the given tier label
    pub fn record_resolution(&self, tier: &str) {
        counter!("ccpi_indicator_resolutions_total", "tier" => tier.to_string()).increment(1);
    }

    /// Count one recovered adapter failure
    pub fn record_adapter_failure(&self, source: &str, reason: &'static str) {
        counter!(
            "ccpi_adapter_failures_total",
            "source" => source.to_string(),
            "reason" => reason
        )
        .increment(1);
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
