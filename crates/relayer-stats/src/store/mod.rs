// Collaborator interfaces the engine is built against.
// Every store is injected as `Arc<dyn ...>` so tests can swap in `MemoryStore`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::StoreError;
use crate::types::{
    AddressDenomAmount, AddressFeeAmount, AddressTxs, BaseDenomInfo, Chain, ChainConfig, Channel, ChannelPair, Relayer,
    RelayerTotals, Segment, SegmentTransfer, StatisticRecord,
};

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::Snapshot;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ChainConfigProvider: Send + Sync {
    async fn find_one(&self, chain_id: &str) -> StoreResult<Option<ChainConfig>>;

    async fn find_all(&self) -> StoreResult<HashMap<String, ChainConfig>>;
}

/// Read-only view over indexed chain transactions
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Time of the most recent update-client tx by `address` for `client_id`
    /// at or after `floor_time`
    async fn latest_update_client_time(
        &self,
        chain_id: &str,
        address: &str,
        client_id: &str,
        floor_time: i64,
    ) -> StoreResult<Option<i64>>;

    /// All transfers with a tx time inside `segment`
    async fn segment_transfers(&self, segment: Segment) -> StoreResult<Vec<SegmentTransfer>>;
}

#[async_trait]
pub trait RelayerStore: Send + Sync {
    async fn find_page(&self, skip: usize, limit: usize) -> StoreResult<Vec<Relayer>>;

    /// Relayers that sign with `address` on `chain_id`
    async fn find_by_address(&self, chain_id: &str, address: &str) -> StoreResult<Vec<Relayer>>;

    /// Relayers with a pair connecting the two channel ends
    async fn find_by_channel(
        &self,
        chain_a: &str,
        channel_a: &str,
        chain_b: &str,
        channel_b: &str,
    ) -> StoreResult<Vec<Relayer>>;

    async fn insert(&self, relayer: Relayer) -> StoreResult<()>;

    async fn update_channel_pairs(&self, relayer_id: &str, pairs: Vec<ChannelPair>) -> StoreResult<()>;

    /// Conditional write: applies only if `update_time` is strictly greater than
    /// the stored value. Returns whether the write happened.
    async fn update_time_if_newer(&self, relayer_id: &str, update_time: i64) -> StoreResult<bool>;

    async fn update_totals(&self, relayer_id: &str, totals: RelayerTotals) -> StoreResult<()>;

    async fn count_channel_relayers(
        &self,
        chain_a: &str,
        channel_a: &str,
        chain_b: &str,
        channel_b: &str,
    ) -> StoreResult<u64>;

    async fn count_chain_relayers(&self, chain_id: &str) -> StoreResult<u64>;
}

/// Whether an upsert created or overwrote a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[async_trait]
pub trait RelayerStatisticsStore: Send + Sync {
    /// Insert if the composite key is absent, otherwise overwrite the numeric
    /// fields and bump `update_at`
    async fn upsert(&self, record: StatisticRecord) -> StoreResult<UpsertOutcome>;

    async fn insert_many(&self, records: Vec<StatisticRecord>) -> StoreResult<()>;

    async fn aggregate_amounts(&self) -> StoreResult<Vec<AddressDenomAmount>>;

    async fn aggregate_txs(&self) -> StoreResult<Vec<AddressTxs>>;

    /// Relayer fees summed per (address, chain, fee denom)
    async fn aggregate_fee_amounts(&self) -> StoreResult<Vec<AddressFeeAmount>>;
}

#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn find_all(&self) -> StoreResult<Vec<Channel>>;

    async fn update_relayers(&self, channel_id: &str, relayers: u64) -> StoreResult<()>;

    async fn update_time(&self, channel_id: &str, update_time: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait ChainStore: Send + Sync {
    async fn find_all(&self) -> StoreResult<Vec<Chain>>;

    async fn update_relayers(&self, chain_id: &str, relayers: u64) -> StoreResult<()>;
}

#[async_trait]
pub trait PriceIndexProvider: Send + Sync {
    async fn base_denoms(&self) -> StoreResult<Vec<BaseDenomInfo>>;

    /// coin id -> fiat price
    async fn coin_prices(&self) -> StoreResult<HashMap<String, Decimal>>;
}

#[async_trait]
pub trait DayRetryCounterStore: Send + Sync {
    async fn get(&self, task: &str, day: &str) -> StoreResult<u32>;

    /// Returns the value after incrementing
    async fn increment(&self, task: &str, day: &str) -> StoreResult<u32>;
}
