// Scheduled entry point tying every phase of a run together

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::chains::RemoteChainClient;
use crate::config::EngineConfig;
use crate::counts::{ChainRelayerCountUpdater, ChannelRelayerCountUpdater};
use crate::error::EngineError;
use crate::freshness::{ChannelPairTimeResolver, FreshnessMap, RelayerFreshnessUpdater};
use crate::metrics::EngineMetrics;
use crate::pool::WorkerPool;
use crate::statistics::{
    PriceIndex, RelayerRegistrar, RelayerTotalsUpdater, RetryGate, StatisticsWindowRunner, ValueCalculator,
    WindowReport,
};
use crate::store::{
    ChainConfigProvider, ChainStore, ChannelStore, DayRetryCounterStore, MemoryStore, PriceIndexProvider,
    RelayerStatisticsStore, RelayerStore, TransactionStore,
};
use crate::types::{day_string, Segment};

/// Every collaborator a run reads from or writes to
#[derive(Clone)]
pub struct EngineStores {
    pub chain_configs: Arc<dyn ChainConfigProvider>,
    pub transactions: Arc<dyn TransactionStore>,
    pub relayers: Arc<dyn RelayerStore>,
    pub statistics: Arc<dyn RelayerStatisticsStore>,
    pub channels: Arc<dyn ChannelStore>,
    pub chains: Arc<dyn ChainStore>,
    pub prices: Arc<dyn PriceIndexProvider>,
    pub retry_counters: Arc<dyn DayRetryCounterStore>,
}

impl EngineStores {
    /// Back every collaborator with the same in-process store
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            chain_configs: store.clone(),
            transactions: store.clone(),
            relayers: store.clone(),
            statistics: store.clone(),
            channels: store.clone(),
            chains: store.clone(),
            prices: store.clone(),
            retry_counters: store,
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: i64,
    pub windows_run: Vec<Segment>,
    pub yesterday_skipped: bool,
    pub yesterday_confirmations: Option<u32>,
    pub statistics_written: usize,
    pub relayers_registered: usize,
    pub relayers_processed: usize,
    pub relayers_updated: usize,
    pub channels_updated: usize,
    pub chains_updated: usize,
    pub unit_failures: usize,
    pub duration_ms: u64,
}

impl RunReport {
    fn absorb_window(&mut self, window: &WindowReport) {
        self.windows_run.push(window.segment);
        self.statistics_written += window.inserted + window.updated;
        self.relayers_registered += window.registrations.created;
        self.unit_failures += window.write_failures + window.registrations.failures;
    }
}

pub struct Orchestrator {
    config: EngineConfig,
    stores: EngineStores,
    remote: Arc<dyn RemoteChainClient>,
    metrics: Arc<EngineMetrics>,
}

impl Orchestrator {
    pub fn new(
        config: EngineConfig,
        stores: EngineStores,
        remote: Arc<dyn RemoteChainClient>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            config,
            stores,
            remote,
            metrics,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.config.schedule.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }

    pub async fn run(&self) -> Result<RunReport, EngineError> {
        self.run_at(Utc::now()).await
    }

    /// One full run as if the clock read `now`
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport, EngineError> {
        let started = Instant::now();
        let now_ts = now.timestamp();
        let offset = self.offset();
        self.metrics.runs.inc();

        let chain_configs = match self.stores.chain_configs.find_all().await {
            Ok(configs) => Arc::new(configs),
            Err(e) => {
                error!("Run aborted, chain configuration unavailable: {}", e);
                self.metrics.fatal_runs.inc();
                return Err(EngineError::ChainConfig(e));
            }
        };
        info!(chains = chain_configs.len(), "Run started");

        let mut report = RunReport {
            started_at: now_ts,
            ..Default::default()
        };

        let index = PriceIndex::load_or_empty(self.stores.prices.as_ref()).await;
        if index.is_empty() {
            warn!("Price index is empty, transfer values will be zero");
        }
        let calculator = ValueCalculator::new(Arc::new(index));

        // Statistics windows
        let runner = StatisticsWindowRunner::new(
            self.stores.transactions.clone(),
            self.stores.statistics.clone(),
            RelayerRegistrar::new(self.stores.relayers.clone(), self.metrics.clone()),
            self.metrics.clone(),
        );

        match runner.run(Segment::today(now, offset), now_ts).await {
            Ok(window) => report.absorb_window(&window),
            Err(_) => report.unit_failures += 1,
        }

        let gate = RetryGate::new(
            self.stores.retry_counters.clone(),
            self.config.stats.task_name.clone(),
            self.config.stats.yesterday_retry_threshold,
        );
        let day = day_string(now, offset);
        if gate.should_run(&day).await {
            match runner.run(Segment::yesterday(now, offset), now_ts).await {
                Ok(window) => {
                    report.absorb_window(&window);
                    if window.is_complete() && window.registrations.failures == 0 {
                        report.yesterday_confirmations = gate.confirm(&day).await;
                    }
                }
                Err(_) => report.unit_failures += 1,
            }
        } else {
            report.yesterday_skipped = true;
        }

        // Lifetime totals
        let totals = RelayerTotalsUpdater::new(
            self.stores.relayers.clone(),
            self.stores.statistics.clone(),
            self.metrics.clone(),
        )
        .run(&calculator, self.config.stats.relayer_page_size)
        .await;
        report.unit_failures += totals.failures;

        // Freshness pass, joined before the counts read the channel map
        let resolver = ChannelPairTimeResolver::new(
            chain_configs,
            self.remote.clone(),
            self.stores.transactions.clone(),
            self.config.side_timeout(),
            self.metrics.clone(),
        );
        let updater = RelayerFreshnessUpdater::new(
            resolver,
            self.stores.relayers.clone(),
            self.config.pools.inner_width,
            self.config.lookback(),
            self.metrics.clone(),
        );
        let outer_pool = WorkerPool::new("relayers", self.config.pools.outer_width);
        let channel_times = FreshnessMap::new();
        let pass = updater
            .run_pass(&outer_pool, self.config.stats.relayer_page_size, now_ts, &channel_times)
            .await;
        report.relayers_processed = pass.relayers_processed;
        report.relayers_updated = pass.relayers_updated;
        report.unit_failures += pass.failures;

        // Derived counts
        let channel_counts =
            ChannelRelayerCountUpdater::new(self.stores.channels.clone(), self.stores.relayers.clone(), self.metrics.clone());
        let chain_counts =
            ChainRelayerCountUpdater::new(self.stores.chains.clone(), self.stores.relayers.clone(), self.metrics.clone());
        let (channels, chains) = tokio::join!(channel_counts.run(&channel_times), chain_counts.run());
        report.channels_updated = channels.updated;
        report.chains_updated = chains.updated;
        report.unit_failures += channels.failures + chains.failures;

        let elapsed = started.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;
        self.metrics.run_duration.observe(elapsed.as_secs_f64());

        info!(
            windows = report.windows_run.len(),
            yesterday_skipped = report.yesterday_skipped,
            relayers = report.relayers_processed,
            updated = report.relayers_updated,
            channels = report.channels_updated,
            chains = report.chains_updated,
            failures = report.unit_failures,
            duration_ms = report.duration_ms,
            "Run finished"
        );
        Ok(report)
    }
}
