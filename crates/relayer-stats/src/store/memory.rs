//! In-process implementation of every store interface.
//!
//! `MemoryStore` backs the test-suite and the snapshot-driven binary. Statistic
//! records and retry counters live in `DashMap`s; collections that must be read
//! in a stable order (relayers, channels, chains) sit behind `RwLock`ed
//! `BTreeMap`s. No lock is held across an await point.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{
    ChainConfigProvider, ChainStore, ChannelStore, DayRetryCounterStore, PriceIndexProvider,
    RelayerStatisticsStore, RelayerStore, StoreResult, TransactionStore, UpsertOutcome,
};
use crate::error::StoreError;
use crate::types::{
    AddressDenomAmount, AddressFeeAmount, AddressTxs, BaseDenom, BaseDenomInfo, Chain, ChainConfig, Channel, ChannelPair,
    Relayer, RelayerFeeRecord, RelayerTotals, Segment, SegmentTransfer, StatisticRecord, StatisticRecordKey, UpdateClientTx,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    chain_configs: RwLock<HashMap<String, ChainConfig>>,
    transfers: RwLock<Vec<SegmentTransfer>>,
    update_client_txs: RwLock<Vec<UpdateClientTx>>,
    relayers: RwLock<BTreeMap<String, Relayer>>,
    statistics: DashMap<StatisticRecordKey, StatisticRecord>,
    relayer_fees: RwLock<Vec<RelayerFeeRecord>>,
    channels: RwLock<BTreeMap<String, Channel>>,
    chains: RwLock<BTreeMap<String, Chain>>,
    base_denoms: RwLock<Vec<BaseDenomInfo>>,
    coin_prices: RwLock<HashMap<String, Decimal>>,
    retry_counters: DashMap<(String, String), u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_chain_config(&self, config: ChainConfig) {
        self.chain_configs.write().await.insert(config.chain_id.clone(), config);
    }

    pub async fn add_transfer(&self, transfer: SegmentTransfer) {
        self.transfers.write().await.push(transfer);
    }

    pub async fn add_update_client_tx(&self, tx: UpdateClientTx) {
        self.update_client_txs.write().await.push(tx);
    }

    pub async fn add_relayer_fee(&self, fee: RelayerFeeRecord) {
        self.relayer_fees.write().await.push(fee);
    }

    pub async fn add_channel(&self, channel: Channel) {
        self.channels.write().await.insert(channel.channel_id.clone(), channel);
    }

    pub async fn add_chain(&self, chain: Chain) {
        self.chains.write().await.insert(chain.chain_id.clone(), chain);
    }

    /// Register a base denom and the price of its coin
    pub async fn add_price(&self, info: BaseDenomInfo, price: Decimal) {
        self.coin_prices.write().await.insert(info.coin_id.clone(), price);
        self.base_denoms.write().await.push(info);
    }

    pub async fn relayer(&self, relayer_id: &str) -> Option<Relayer> {
        self.relayers.read().await.get(relayer_id).cloned()
    }

    pub async fn relayers(&self) -> Vec<Relayer> {
        self.relayers.read().await.values().cloned().collect()
    }

    pub async fn channel(&self, channel_id: &str) -> Option<Channel> {
        self.channels.read().await.get(channel_id).cloned()
    }

    pub async fn chain(&self, chain_id: &str) -> Option<Chain> {
        self.chains.read().await.get(chain_id).cloned()
    }

    /// All statistic records ordered by key
    pub fn statistics(&self) -> Vec<StatisticRecord> {
        let mut records: Vec<StatisticRecord> = self.statistics.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.key());
        records
    }

    pub fn retry_counter(&self, task: &str, day: &str) -> u32 {
        self.retry_counters
            .get(&(task.to_string(), day.to_string()))
            .map(|n| *n)
            .unwrap_or(0)
    }

    pub(crate) async fn dump(&self) -> super::Snapshot {
        let mut chain_configs: Vec<ChainConfig> = self.chain_configs.read().await.values().cloned().collect();
        chain_configs.sort_by(|a, b| a.chain_id.cmp(&b.chain_id));
        let coin_prices = self.coin_prices.read().await.clone();
        let mut retry_counters: Vec<super::snapshot::RetryCounterEntry> = self
            .retry_counters
            .iter()
            .map(|e| super::snapshot::RetryCounterEntry {
                task: e.key().0.clone(),
                day: e.key().1.clone(),
                count: *e.value(),
            })
            .collect();
        retry_counters.sort_by(|a, b| (&a.task, &a.day).cmp(&(&b.task, &b.day)));

        super::Snapshot {
            chain_configs,
            transfers: self.transfers.read().await.clone(),
            update_client_txs: self.update_client_txs.read().await.clone(),
            relayers: self.relayers().await,
            statistics: self.statistics(),
            relayer_fees: self.relayer_fees.read().await.clone(),
            channels: self.channels.read().await.values().cloned().collect(),
            chains: self.chains.read().await.values().cloned().collect(),
            base_denoms: self.base_denoms.read().await.clone(),
            coin_prices: coin_prices.into_iter().collect(),
            retry_counters,
        }
    }

    pub(crate) async fn restore(&self, snapshot: super::Snapshot) {
        let super::Snapshot {
            chain_configs,
            transfers,
            update_client_txs,
            relayers,
            statistics,
            relayer_fees,
            channels,
            chains,
            base_denoms,
            coin_prices,
            retry_counters,
        } = snapshot;

        *self.chain_configs.write().await = chain_configs.into_iter().map(|c| (c.chain_id.clone(), c)).collect();
        *self.transfers.write().await = transfers;
        *self.update_client_txs.write().await = update_client_txs;
        *self.relayers.write().await = relayers.into_iter().map(|r| (r.relayer_id.clone(), r)).collect();
        self.statistics.clear();
        for record in statistics {
            self.statistics.insert(record.key(), record);
        }
        *self.relayer_fees.write().await = relayer_fees;
        *self.channels.write().await = channels.into_iter().map(|c| (c.channel_id.clone(), c)).collect();
        *self.chains.write().await = chains.into_iter().map(|c| (c.chain_id.clone(), c)).collect();
        *self.base_denoms.write().await = base_denoms;
        *self.coin_prices.write().await = coin_prices.into_iter().collect();
        self.retry_counters.clear();
        for entry in retry_counters {
            self.retry_counters.insert((entry.task, entry.day), entry.count);
        }
    }
}

#[async_trait]
impl ChainConfigProvider for MemoryStore {
    async fn find_one(&self, chain_id: &str) -> StoreResult<Option<ChainConfig>> {
        Ok(self.chain_configs.read().await.get(chain_id).cloned())
    }

    async fn find_all(&self) -> StoreResult<HashMap<String, ChainConfig>> {
        Ok(self.chain_configs.read().await.clone())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn latest_update_client_time(
        &self,
        chain_id: &str,
        address: &str,
        client_id: &str,
        floor_time: i64,
    ) -> StoreResult<Option<i64>> {
        Ok(self
            .update_client_txs
            .read()
            .await
            .iter()
            .filter(|tx| {
                tx.chain_id == chain_id && tx.signer == address && tx.client_id == client_id && tx.tx_time >= floor_time
            })
            .map(|tx| tx.tx_time)
            .max())
    }

    async fn segment_transfers(&self, segment: Segment) -> StoreResult<Vec<SegmentTransfer>> {
        Ok(self
            .transfers
            .read()
            .await
            .iter()
            .filter(|t| segment.contains(t.tx_time))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RelayerStore for MemoryStore {
    async fn find_page(&self, skip: usize, limit: usize) -> StoreResult<Vec<Relayer>> {
        Ok(self.relayers.read().await.values().skip(skip).take(limit).cloned().collect())
    }

    async fn find_by_address(&self, chain_id: &str, address: &str) -> StoreResult<Vec<Relayer>> {
        Ok(self
            .relayers
            .read()
            .await
            .values()
            .filter(|r| r.owns_address(chain_id, address))
            .cloned()
            .collect())
    }

    async fn find_by_channel(
        &self,
        chain_a: &str,
        channel_a: &str,
        chain_b: &str,
        channel_b: &str,
    ) -> StoreResult<Vec<Relayer>> {
        Ok(self
            .relayers
            .read()
            .await
            .values()
            .filter(|r| r.channel_pairs.iter().any(|p| p.connects(chain_a, channel_a, chain_b, channel_b)))
            .cloned()
            .collect())
    }

    async fn insert(&self, relayer: Relayer) -> StoreResult<()> {
        let mut relayers = self.relayers.write().await;
        if relayers.contains_key(&relayer.relayer_id) {
            return Err(StoreError::Duplicate(relayer.relayer_id));
        }
        relayers.insert(relayer.relayer_id.clone(), relayer);
        Ok(())
    }

    async fn update_channel_pairs(&self, relayer_id: &str, pairs: Vec<ChannelPair>) -> StoreResult<()> {
        let mut relayers = self.relayers.write().await;
        let relayer = relayers
            .get_mut(relayer_id)
            .ok_or_else(|| StoreError::NotFound(relayer_id.to_string()))?;
        relayer.channel_pairs = pairs;
        relayer.update_at = chrono::Utc::now().timestamp();
        Ok(())
    }

    async fn update_time_if_newer(&self, relayer_id: &str, update_time: i64) -> StoreResult<bool> {
        let mut relayers = self.relayers.write().await;
        let relayer = relayers
            .get_mut(relayer_id)
            .ok_or_else(|| StoreError::NotFound(relayer_id.to_string()))?;
        if update_time <= relayer.update_time {
            return Ok(false);
        }
        relayer.update_time = update_time;
        Ok(true)
    }

    async fn update_totals(&self, relayer_id: &str, totals: RelayerTotals) -> StoreResult<()> {
        let mut relayers = self.relayers.write().await;
        let relayer = relayers
            .get_mut(relayer_id)
            .ok_or_else(|| StoreError::NotFound(relayer_id.to_string()))?;
        relayer.totals = totals;
        relayer.update_at = chrono::Utc::now().timestamp();
        Ok(())
    }

    async fn count_channel_relayers(
        &self,
        chain_a: &str,
        channel_a: &str,
        chain_b: &str,
        channel_b: &str,
    ) -> StoreResult<u64> {
        Ok(self.find_by_channel(chain_a, channel_a, chain_b, channel_b).await?.len() as u64)
    }

    async fn count_chain_relayers(&self, chain_id: &str) -> StoreResult<u64> {
        Ok(self
            .relayers
            .read()
            .await
            .values()
            .filter(|r| r.serves_chain(chain_id))
            .count() as u64)
    }
}

#[async_trait]
impl RelayerStatisticsStore for MemoryStore {
    async fn upsert(&self, record: StatisticRecord) -> StoreResult<UpsertOutcome> {
        match self.statistics.entry(record.key()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.total_txs = record.total_txs;
                existing.success_total_txs = record.success_total_txs;
                existing.transfer_amount = record.transfer_amount;
                existing.update_at = record.update_at;
                Ok(UpsertOutcome::Updated)
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn insert_many(&self, records: Vec<StatisticRecord>) -> StoreResult<()> {
        if let Some(dup) = records.iter().find(|r| self.statistics.contains_key(&r.key())) {
            return Err(StoreError::Duplicate(format!("{:?}", dup.key())));
        }
        for record in records {
            self.statistics.insert(record.key(), record);
        }
        Ok(())
    }

    async fn aggregate_amounts(&self) -> StoreResult<Vec<AddressDenomAmount>> {
        let mut grouped: BTreeMap<(String, String, BaseDenom), u128> = BTreeMap::new();
        for entry in self.statistics.iter() {
            let r = entry.value();
            let slot = grouped
                .entry((r.address.clone(), r.statistic_key.clone(), r.base_denom.clone()))
                .or_insert(0);
            *slot = slot.saturating_add(r.transfer_amount);
        }
        Ok(grouped
            .into_iter()
            .map(|((address, statistic_key, base_denom), amount)| AddressDenomAmount {
                address,
                statistic_key,
                base_denom,
                amount,
            })
            .collect())
    }

    async fn aggregate_txs(&self) -> StoreResult<Vec<AddressTxs>> {
        let mut grouped: BTreeMap<(String, String), (u64, u64)> = BTreeMap::new();
        for entry in self.statistics.iter() {
            let r = entry.value();
            let slot = grouped.entry((r.address.clone(), r.statistic_key.clone())).or_default();
            slot.0 += r.total_txs;
            slot.1 += r.success_total_txs;
        }
        Ok(grouped
            .into_iter()
            .map(|((address, statistic_key), (total_txs, success_total_txs))| AddressTxs {
                address,
                statistic_key,
                total_txs,
                success_total_txs,
            })
            .collect())
    }

    async fn aggregate_fee_amounts(&self) -> StoreResult<Vec<AddressFeeAmount>> {
        let mut grouped: BTreeMap<(String, String, String), u128> = BTreeMap::new();
        for fee in self.relayer_fees.read().await.iter() {
            let slot = grouped
                .entry((fee.address.clone(), fee.chain_id.clone(), fee.fee_denom.clone()))
                .or_insert(0);
            *slot = slot.saturating_add(fee.amount);
        }
        Ok(grouped
            .into_iter()
            .map(|((address, chain_id, fee_denom), amount)| AddressFeeAmount {
                address,
                chain_id,
                fee_denom,
                amount,
            })
            .collect())
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn find_all(&self) -> StoreResult<Vec<Channel>> {
        Ok(self.channels.read().await.values().cloned().collect())
    }

    async fn update_relayers(&self, channel_id: &str, relayers: u64) -> StoreResult<()> {
        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(channel_id)
            .ok_or_else(|| StoreError::NotFound(channel_id.to_string()))?;
        channel.relayers = relayers;
        channel.update_at = chrono::Utc::now().timestamp();
        Ok(())
    }

    async fn update_time(&self, channel_id: &str, update_time: i64) -> StoreResult<()> {
        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(channel_id)
            .ok_or_else(|| StoreError::NotFound(channel_id.to_string()))?;
        channel.update_time = update_time;
        Ok(())
    }
}

#[async_trait]
impl ChainStore for MemoryStore {
    async fn find_all(&self) -> StoreResult<Vec<Chain>> {
        Ok(self.chains.read().await.values().cloned().collect())
    }

    async fn update_relayers(&self, chain_id: &str, relayers: u64) -> StoreResult<()> {
        let mut chains = self.chains.write().await;
        let chain = chains
            .get_mut(chain_id)
            .ok_or_else(|| StoreError::NotFound(chain_id.to_string()))?;
        chain.relayers = relayers;
        chain.update_at = chrono::Utc::now().timestamp();
        Ok(())
    }
}

#[async_trait]
impl PriceIndexProvider for MemoryStore {
    async fn base_denoms(&self) -> StoreResult<Vec<BaseDenomInfo>> {
        Ok(self.base_denoms.read().await.clone())
    }

    async fn coin_prices(&self) -> StoreResult<HashMap<String, Decimal>> {
        Ok(self.coin_prices.read().await.clone())
    }
}

#[async_trait]
impl DayRetryCounterStore for MemoryStore {
    async fn get(&self, task: &str, day: &str) -> StoreResult<u32> {
        Ok(self.retry_counter(task, day))
    }

    async fn increment(&self, task: &str, day: &str) -> StoreResult<u32> {
        let mut entry = self
            .retry_counters
            .entry((task.to_string(), day.to_string()))
            .or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}
