// Full recomputation of one daily statistics window

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::registrar::{RegistrationReport, RelayerObservation, RelayerRegistrar};
use crate::error::StoreError;
use crate::metrics::EngineMetrics;
use crate::store::{RelayerStatisticsStore, TransactionStore, UpsertOutcome};
use crate::types::{BaseDenom, Segment, SegmentTransfer, StatisticRecord, TxStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct WindowAggregate {
    total_txs: u64,
    success_total_txs: u64,
    transfer_amount: u128,
}

type AggregateKey = (String, String, BaseDenom);

#[derive(Debug, Default)]
struct Aggregation {
    grouped: BTreeMap<AggregateKey, WindowAggregate>,
    unparseable: usize,
    /// Transfers without a signer address, left out of every record
    unattributed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowReport {
    pub segment: Segment,
    pub transfers: usize,
    pub unparseable_amounts: usize,
    pub unattributed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub write_failures: usize,
    pub registrations: RegistrationReport,
}

impl WindowReport {
    /// Every record of the window reached the store
    pub fn is_complete(&self) -> bool {
        self.write_failures == 0
    }
}

/// Group a scan by (address, statistic key, base denom), skipping transfers
/// with no signer
fn aggregate(transfers: &[SegmentTransfer]) -> Aggregation {
    let mut aggregation = Aggregation::default();

    for transfer in transfers {
        if transfer.address.is_empty() {
            aggregation.unattributed += 1;
            continue;
        }
        let amount = match transfer.amount.trim().parse::<u128>() {
            Ok(amount) => amount,
            Err(e) => {
                warn!(
                    address = %transfer.address,
                    key = %transfer.statistic_key(),
                    amount = %transfer.amount,
                    "Unparseable transfer amount, counting as zero: {}",
                    e
                );
                aggregation.unparseable += 1;
                0
            }
        };

        let slot = aggregation
            .grouped
            .entry((transfer.address.clone(), transfer.statistic_key(), transfer.base_denom.clone()))
            .or_default();
        slot.total_txs += 1;
        if transfer.status == TxStatus::Success {
            slot.success_total_txs += 1;
        }
        slot.transfer_amount = slot.transfer_amount.saturating_add(amount);
    }

    aggregation
}

pub struct StatisticsWindowRunner {
    transactions: Arc<dyn TransactionStore>,
    statistics: Arc<dyn RelayerStatisticsStore>,
    registrar: RelayerRegistrar,
    metrics: Arc<EngineMetrics>,
}

impl StatisticsWindowRunner {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        statistics: Arc<dyn RelayerStatisticsStore>,
        registrar: RelayerRegistrar,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            transactions,
            statistics,
            registrar,
            metrics,
        }
    }

    /// Recompute `segment` from scratch and upsert one record per key.
    ///
    /// Fails only when the segment scan itself fails. Write failures are
    /// counted in the report and leave the other keys untouched.
    pub async fn run(&self, segment: Segment, now: i64) -> Result<WindowReport, StoreError> {
        let transfers = self.transactions.segment_transfers(segment).await.map_err(|e| {
            error!(start = segment.start, end = segment.end, "Failed to scan segment: {}", e);
            e
        })?;
        debug!(start = segment.start, end = segment.end, transfers = transfers.len(), "Segment scanned");

        let registrations = self
            .registrar
            .register_all(RelayerObservation::distinct(&transfers), now)
            .await;

        let Aggregation {
            grouped,
            unparseable,
            unattributed,
        } = aggregate(&transfers);
        if unattributed > 0 {
            warn!(start = segment.start, unattributed, "Transfers without a signer skipped");
        }
        let mut report = WindowReport {
            segment,
            transfers: transfers.len(),
            unparseable_amounts: unparseable,
            unattributed,
            inserted: 0,
            updated: 0,
            write_failures: 0,
            registrations,
        };

        for ((address, statistic_key, base_denom), value) in grouped {
            let record = StatisticRecord {
                address,
                statistic_key,
                base_denom,
                segment_start_time: segment.start,
                segment_end_time: segment.end,
                total_txs: value.total_txs,
                success_total_txs: value.success_total_txs,
                transfer_amount: value.transfer_amount,
                create_at: now,
                update_at: now,
            };

            match self.statistics.upsert(record.clone()).await {
                Ok(outcome) => {
                    self.metrics.statistics_upserted.inc();
                    match outcome {
                        UpsertOutcome::Inserted => report.inserted += 1,
                        UpsertOutcome::Updated => report.updated += 1,
                    }
                }
                Err(e) => {
                    error!(
                        address = %record.address,
                        key = %record.statistic_key,
                        denom = %record.base_denom.denom,
                        "Failed to upsert statistic: {}",
                        e
                    );
                    self.metrics.unit_failures.inc();
                    report.write_failures += 1;
                }
            }
        }

        info!(
            start = segment.start,
            end = segment.end,
            transfers = report.transfers,
            inserted = report.inserted,
            updated = report.updated,
            failures = report.write_failures,
            "Statistics window done"
        );
        Ok(report)
    }
}
