// Per-relayer freshness pass with inner fan-out over channel pairs

use std::sync::Arc;
use tracing::{debug, error, info};

use super::{ChannelPairTimeResolver, FreshnessMap};
use crate::metrics::EngineMetrics;
use crate::pool::WorkerPool;
use crate::store::RelayerStore;
use crate::types::Relayer;

/// Earliest client update time worth looking at for a relayer.
///
/// Defaults to `now - lookback`. A relayer whose stored freshness is set but
/// older than that horizon keeps searching from its stored value instead.
pub fn floor_time(now: i64, lookback: chrono::Duration, stored_update_time: i64) -> i64 {
    let horizon = now - lookback.num_seconds();
    if stored_update_time > 0 && stored_update_time <= horizon {
        stored_update_time
    } else {
        horizon
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessOutcome {
    pub relayer_id: String,
    /// Resolved time per channel pair, in the relayer's pair order
    pub pair_times: Vec<i64>,
    pub resolved: i64,
    /// Whether the stored freshness moved forward
    pub persisted: bool,
    pub failed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreshnessPassReport {
    pub relayers_processed: usize,
    pub relayers_updated: usize,
    pub failures: usize,
}

#[derive(Clone)]
pub struct RelayerFreshnessUpdater {
    resolver: ChannelPairTimeResolver,
    relayers: Arc<dyn RelayerStore>,
    inner_pool: WorkerPool,
    lookback: chrono::Duration,
    metrics: Arc<EngineMetrics>,
}

impl RelayerFreshnessUpdater {
    pub fn new(
        resolver: ChannelPairTimeResolver,
        relayers: Arc<dyn RelayerStore>,
        inner_width: usize,
        lookback: chrono::Duration,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            resolver,
            relayers,
            inner_pool: WorkerPool::new("channel_pairs", inner_width),
            lookback,
            metrics,
        }
    }

    /// Resolve every pair of `relayer`, record each channel into `channel_times`
    /// and move the stored freshness forward if the result is newer.
    pub async fn update(&self, relayer: Relayer, now: i64, channel_times: FreshnessMap) -> FreshnessOutcome {
        let floor = floor_time(now, self.lookback, relayer.update_time);
        let resolver = self.resolver.clone();

        let pair_times: Vec<i64> = self
            .inner_pool
            .run(relayer.channel_pairs.clone(), move |pair| {
                let resolver = resolver.clone();
                let channel_times = channel_times.clone();
                async move {
                    let resolution = resolver.resolve(&pair, floor).await;
                    channel_times.record(&resolution.channel_id, resolution.update_time);
                    resolution.update_time
                }
            })
            .await
            .into_iter()
            .map(|t| t.unwrap_or(0))
            .collect();

        let resolved = pair_times.iter().copied().max().unwrap_or(0);
        let mut outcome = FreshnessOutcome {
            relayer_id: relayer.relayer_id.clone(),
            pair_times,
            resolved,
            persisted: false,
            failed: false,
        };

        if resolved <= relayer.update_time {
            debug!(relayer_id = %relayer.relayer_id, resolved, stored = relayer.update_time, "Freshness unchanged");
            return outcome;
        }

        match self.relayers.update_time_if_newer(&relayer.relayer_id, resolved).await {
            Ok(persisted) => {
                if persisted {
                    self.metrics.freshness_updates.inc();
                }
                outcome.persisted = persisted;
            }
            Err(e) => {
                error!(relayer_id = %relayer.relayer_id, "Failed to persist freshness: {}", e);
                self.metrics.unit_failures.inc();
                outcome.failed = true;
            }
        }
        outcome
    }

    /// Page through every relayer and update each on `outer_pool`
    pub async fn run_pass(
        &self,
        outer_pool: &WorkerPool,
        page_size: usize,
        now: i64,
        channel_times: &FreshnessMap,
    ) -> FreshnessPassReport {
        let page_size = page_size.max(1);
        let mut report = FreshnessPassReport::default();
        let mut skip = 0;

        loop {
            let page = match self.relayers.find_page(skip, page_size).await {
                Ok(page) => page,
                Err(e) => {
                    error!(skip, "Failed to read relayer page: {}", e);
                    self.metrics.unit_failures.inc();
                    report.failures += 1;
                    break;
                }
            };
            if page.is_empty() {
                break;
            }

            let fetched = page.len();
            let updater = self.clone();
            let map = channel_times.clone();
            let outcomes = outer_pool
                .run(page, move |relayer| {
                    let updater = updater.clone();
                    let map = map.clone();
                    async move { updater.update(relayer, now, map).await }
                })
                .await;

            for outcome in outcomes {
                report.relayers_processed += 1;
                match outcome {
                    Some(o) if o.failed => report.failures += 1,
                    Some(o) if o.persisted => report.relayers_updated += 1,
                    Some(_) => {}
                    None => {
                        self.metrics.unit_failures.inc();
                        report.failures += 1;
                    }
                }
            }

            skip += fetched;
            if fetched < page_size {
                break;
            }
        }

        info!(
            processed = report.relayers_processed,
            updated = report.relayers_updated,
            failures = report.failures,
            channels = channel_times.len(),
            "Relayer freshness pass finished"
        );
        report
    }
}
