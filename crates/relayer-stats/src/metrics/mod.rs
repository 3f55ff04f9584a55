// Metrics and monitoring

use prometheus::{Gauge, Histogram, IntCounter, Registry};
use std::sync::Arc;

/// Engine metrics, one instance per process
pub struct EngineMetrics {
    // Run metrics
    pub runs: IntCounter,
    pub fatal_runs: IntCounter,
    pub run_duration: Histogram,

    // Unit metrics
    pub remote_errors: IntCounter,
    pub unit_failures: IntCounter,
    pub freshness_updates: IntCounter,
    pub statistics_upserted: IntCounter,
    pub relayers_registered: IntCounter,
    pub transfer_value: Gauge,
    pub fee_value: Gauge,

    registry: Arc<Registry>,
}

impl EngineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let runs = IntCounter::new("relayer_stats_runs_total", "Total aggregation runs started")?;
        let fatal_runs = IntCounter::new("relayer_stats_fatal_runs_total", "Runs aborted by a fatal error")?;
        let run_duration = Histogram::with_opts(prometheus::HistogramOpts::new(
            "relayer_stats_run_duration_seconds",
            "Wall time of one aggregation run",
        ))?;
        let remote_errors = IntCounter::new("relayer_stats_remote_errors_total", "LCD lookups that failed or timed out")?;
        let unit_failures = IntCounter::new(
            "relayer_stats_unit_failures_total",
            "Relayers, channels, chains or records skipped because of an error",
        )?;
        let freshness_updates =
            IntCounter::new("relayer_stats_freshness_updates_total", "Relayer update times moved forward")?;
        let statistics_upserted =
            IntCounter::new("relayer_stats_statistics_upserted_total", "Statistic records written")?;
        let relayers_registered =
            IntCounter::new("relayer_stats_relayers_registered_total", "Relayers created or back-filled")?;
        let transfer_value = Gauge::new(
            "relayer_stats_transfer_value",
            "Sum of relayer transfer values after the last totals pass",
        )?;
        let fee_value = Gauge::new(
            "relayer_stats_fee_value",
            "Sum of relayer fee values after the last totals pass",
        )?;

        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(fatal_runs.clone()))?;
        registry.register(Box::new(run_duration.clone()))?;
        registry.register(Box::new(remote_errors.clone()))?;
        registry.register(Box::new(unit_failures.clone()))?;
        registry.register(Box::new(freshness_updates.clone()))?;
        registry.register(Box::new(statistics_upserted.clone()))?;
        registry.register(Box::new(relayers_registered.clone()))?;
        registry.register(Box::new(transfer_value.clone()))?;
        registry.register(Box::new(fee_value.clone()))?;

        Ok(Self {
            runs,
            fatal_runs,
            run_duration,
            remote_errors,
            unit_failures,
            freshness_updates,
            statistics_upserted,
            relayers_registered,
            transfer_value,
            fee_value,
            registry,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
