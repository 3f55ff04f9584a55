// Lifetime totals per relayer, folded from every stored statistic

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{error, info};

use super::value::ValueCalculator;
use crate::metrics::EngineMetrics;
use crate::store::{RelayerStatisticsStore, RelayerStore};
use crate::types::{AddressDenomAmount, AddressFeeAmount, AddressTxs, Relayer, RelayerTotals};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TotalsReport {
    pub relayers_updated: usize,
    pub failures: usize,
    pub transfer_value: Decimal,
    pub fee_value: Decimal,
}

/// Stored aggregates indexed by (address, statistic key), fees by (chain, address)
#[derive(Default)]
struct AggregateIndex {
    amounts: HashMap<(String, String), Vec<AddressDenomAmount>>,
    txs: HashMap<(String, String), AddressTxs>,
    fees: HashMap<(String, String), Vec<AddressFeeAmount>>,
}

impl AggregateIndex {
    fn new(amounts: Vec<AddressDenomAmount>, txs: Vec<AddressTxs>, fees: Vec<AddressFeeAmount>) -> Self {
        let mut index = Self::default();
        for amount in amounts {
            index
                .amounts
                .entry((amount.address.clone(), amount.statistic_key.clone()))
                .or_default()
                .push(amount);
        }
        for tx in txs {
            index.txs.insert((tx.address.clone(), tx.statistic_key.clone()), tx);
        }
        for fee in fees {
            index
                .fees
                .entry((fee.chain_id.clone(), fee.address.clone()))
                .or_default()
                .push(fee);
        }
        index
    }

    fn totals_for(&self, relayer: &Relayer, calculator: &ValueCalculator) -> RelayerTotals {
        let signers = relayer.addresses();
        let addresses: BTreeSet<&String> = signers.iter().map(|(_, address)| address).collect();
        let keys = relayer.statistic_keys();
        let mut totals = RelayerTotals::default();

        for address in addresses {
            for key in &keys {
                let slot = (address.clone(), key.clone());
                if let Some(txs) = self.txs.get(&slot) {
                    totals.total_txs += txs.total_txs;
                    totals.success_total_txs += txs.success_total_txs;
                }
                if let Some(amounts) = self.amounts.get(&slot) {
                    let value = calculator.total_value(amounts.iter().map(|a| (&a.base_denom, a.amount)));
                    totals.transfer_value = totals.transfer_value.saturating_add(value);
                }
            }
        }

        // fees are attributed by the chain the address signs on, not by path
        for signer in &signers {
            if let Some(fees) = self.fees.get(signer) {
                let denoms: Vec<_> = fees.iter().map(|f| (f.base_denom(), f.amount)).collect();
                let value = calculator.total_value(denoms.iter().map(|(denom, amount)| (denom, *amount)));
                totals.fee_value = totals.fee_value.saturating_add(value);
            }
        }
        totals
    }
}

pub struct RelayerTotalsUpdater {
    relayers: Arc<dyn RelayerStore>,
    statistics: Arc<dyn RelayerStatisticsStore>,
    metrics: Arc<EngineMetrics>,
}

impl RelayerTotalsUpdater {
    pub fn new(
        relayers: Arc<dyn RelayerStore>,
        statistics: Arc<dyn RelayerStatisticsStore>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            relayers,
            statistics,
            metrics,
        }
    }

    pub async fn run(&self, calculator: &ValueCalculator, page_size: usize) -> TotalsReport {
        let mut report = TotalsReport::default();

        let amounts = self.statistics.aggregate_amounts().await;
        let txs = self.statistics.aggregate_txs().await;
        let fees = self.statistics.aggregate_fee_amounts().await;
        let index = match (amounts, txs, fees) {
            (Ok(amounts), Ok(txs), Ok(fees)) => AggregateIndex::new(amounts, txs, fees),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                error!("Failed to aggregate relayer statistics: {}", e);
                self.metrics.unit_failures.inc();
                report.failures += 1;
                return report;
            }
        };

        let page_size = page_size.max(1);
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
            let fetched = page.len();

            for relayer in page {
                let totals = index.totals_for(&relayer, calculator);
                let (value, fee_value) = (totals.transfer_value, totals.fee_value);
                match self.relayers.update_totals(&relayer.relayer_id, totals).await {
                    Ok(()) => {
                        report.relayers_updated += 1;
                        report.transfer_value = report.transfer_value.saturating_add(value);
                        report.fee_value = report.fee_value.saturating_add(fee_value);
                    }
                    Err(e) => {
                        error!(relayer_id = %relayer.relayer_id, "Failed to write relayer totals: {}", e);
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

        self.metrics
            .transfer_value
            .set(report.transfer_value.to_f64().unwrap_or_default());
        self.metrics.fee_value.set(report.fee_value.to_f64().unwrap_or_default());
        info!(
            relayers = report.relayers_updated,
            failures = report.failures,
            value = %report.transfer_value,
            fee_value = %report.fee_value,
            "Relayer totals updated"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::value::PriceIndex;
    use crate::store::MemoryStore;
    use crate::types::{BaseDenom, ChannelPair, PriceEntry, RelayerFeeRecord, StatisticRecord};

    fn record(address: &str, key: &str, amount: u128, start: i64) -> StatisticRecord {
        StatisticRecord {
            address: address.to_string(),
            statistic_key: key.to_string(),
            base_denom: BaseDenom::new("uatom", "cosmoshub_4"),
            segment_start_time: start,
            segment_end_time: start + 86_400,
            total_txs: 2,
            success_total_txs: 1,
            transfer_amount: amount,
            create_at: 0,
            update_at: 0,
        }
    }

    #[tokio::test]
    async fn test_totals_sum_only_own_keys() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(Relayer {
                relayer_id: "r1".to_string(),
                channel_pairs: vec![ChannelPair {
                    chain_a: "chainA".to_string(),
                    channel_a: "ch-1".to_string(),
                    address_a: String::new(),
                    chain_b: "chainB".to_string(),
                    channel_b: "ch-2".to_string(),
                    address_b: "addrX".to_string(),
                }],
                ..Default::default()
            })
            .await
            .unwrap();

        store
            .insert_many(vec![
                record("addrX", "chainA|ch-1|chainB|ch-2", 1_000_000, 0),
                record("addrX", "chainA|ch-1|chainB|ch-2", 500_000, 86_400),
                // another path, not serviced by r1
                record("addrX", "chainA|ch-9|chainC|ch-3", 7_000_000, 0),
            ])
            .await
            .unwrap();

        let mut index = PriceIndex::new();
        index.insert(
            BaseDenom::new("uatom", "cosmoshub_4"),
            PriceEntry {
                price: Decimal::new(2, 0),
                scale: 6,
            },
        );
        let calculator = ValueCalculator::new(Arc::new(index));

        let updater = RelayerTotalsUpdater::new(store.clone(), store.clone(), Arc::new(EngineMetrics::new().unwrap()));
        let report = updater.run(&calculator, 10).await;
        assert_eq!(report.relayers_updated, 1);

        let totals = store.relayer("r1").await.unwrap().totals;
        assert_eq!(totals.total_txs, 4);
        assert_eq!(totals.success_total_txs, 2);
        assert_eq!(totals.transfer_value, Decimal::new(3, 0));
    }

    fn fee(chain: &str, address: &str, denom: &str, amount: u128) -> RelayerFeeRecord {
        RelayerFeeRecord {
            chain_id: chain.to_string(),
            address: address.to_string(),
            fee_denom: denom.to_string(),
            amount,
        }
    }

    #[tokio::test]
    async fn test_fee_value_counts_only_own_signers() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(Relayer {
                relayer_id: "r1".to_string(),
                channel_pairs: vec![ChannelPair {
                    chain_a: "chainA".to_string(),
                    channel_a: "ch-1".to_string(),
                    address_a: "addrA".to_string(),
                    chain_b: "chainB".to_string(),
                    channel_b: "ch-2".to_string(),
                    address_b: "addrB".to_string(),
                }],
                ..Default::default()
            })
            .await
            .unwrap();

        store.add_relayer_fee(fee("chainA", "addrA", "uatom", 1_500_000)).await;
        store.add_relayer_fee(fee("chainA", "addrA", "uatom", 500_000)).await;
        store.add_relayer_fee(fee("chainB", "addrB", "uosmo", 4_000_000)).await;
        // no price entry, counted as zero
        store.add_relayer_fee(fee("chainB", "addrB", "uunknown", 9_000_000)).await;
        // same address on a chain it does not relay for
        store.add_relayer_fee(fee("chainC", "addrA", "uatom", 8_000_000)).await;

        let mut index = PriceIndex::new();
        index.insert(
            BaseDenom::new("uatom", "chainA"),
            PriceEntry {
                price: Decimal::new(10, 0),
                scale: 6,
            },
        );
        index.insert(
            BaseDenom::new("uosmo", "chainB"),
            PriceEntry {
                price: Decimal::new(5, 1),
                scale: 6,
            },
        );
        let calculator = ValueCalculator::new(Arc::new(index));

        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let updater = RelayerTotalsUpdater::new(store.clone(), store.clone(), metrics.clone());
        let report = updater.run(&calculator, 10).await;

        // 2 uatom at 10 plus 4 uosmo at 0.5
        assert_eq!(report.fee_value, Decimal::new(22, 0));
        assert_eq!(metrics.fee_value.get(), 22.0);

        let totals = store.relayer("r1").await.unwrap().totals;
        assert_eq!(totals.fee_value, Decimal::new(22, 0));
        assert_eq!(totals.transfer_value, Decimal::ZERO);
        assert_eq!(totals.total_txs, 0);
    }
}
