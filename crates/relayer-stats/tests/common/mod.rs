// Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ibc_relayer_stats::chains::RemoteChainClient;
use ibc_relayer_stats::error::{RemoteError, StoreError};
use ibc_relayer_stats::store::{
    ChainStore, ChannelStore, RelayerStatisticsStore, RelayerStore, StoreResult, UpsertOutcome,
};
use ibc_relayer_stats::types::{
    AddressDenomAmount, AddressFeeAmount, AddressTxs, BaseDenom, Chain, ChainConfig, Channel, ChannelPair, Relayer,
    RelayerTotals, SegmentTransfer, StatisticRecord, TxStatus, UpdateClientTx,
};
use ibc_relayer_stats::{EngineConfig, EngineMetrics, EngineStores, MemoryStore, Orchestrator};

/// Noon UTC on a fixed day
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

pub fn lcd_for(chain_id: &str) -> String {
    format!("http://lcd.{}", chain_id)
}

pub fn chain_config(chain_id: &str) -> ChainConfig {
    ChainConfig {
        chain_id: chain_id.to_string(),
        lcd: lcd_for(chain_id),
        client_state_path: String::new(),
        channel_ports: HashMap::new(),
    }
}

pub fn client_id_for(channel_id: &str) -> String {
    format!("07-tendermint-{}", channel_id)
}

/// Remote client answering from a script. Chains can be switched to failing
/// between runs.
#[derive(Default)]
pub struct ScriptedRemote {
    failing: Mutex<HashSet<String>>,
    jitter: bool,
    calls: AtomicUsize,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spread response times a little so units finish out of order
    pub fn with_jitter() -> Self {
        Self {
            jitter: true,
            ..Self::default()
        }
    }

    pub fn fail_chain(&self, chain_id: &str) {
        self.failing.lock().unwrap().insert(lcd_for(chain_id));
    }

    pub fn heal_all(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteChainClient for ScriptedRemote {
    async fn client_id_for_channel(
        &self,
        lcd: &str,
        _client_state_path: &str,
        _port_id: &str,
        channel_id: &str,
    ) -> Result<String, RemoteError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.jitter {
            tokio::time::sleep(Duration::from_millis((call % 4) as u64)).await;
        }
        if self.failing.lock().unwrap().contains(lcd) {
            return Err(RemoteError::Status {
                status: 503,
                url: lcd.to_string(),
            });
        }
        Ok(client_id_for(channel_id))
    }
}

pub fn pair(
    chain_a: &str,
    channel_a: &str,
    address_a: &str,
    chain_b: &str,
    channel_b: &str,
    address_b: &str,
) -> ChannelPair {
    ChannelPair {
        chain_a: chain_a.to_string(),
        channel_a: channel_a.to_string(),
        address_a: address_a.to_string(),
        chain_b: chain_b.to_string(),
        channel_b: channel_b.to_string(),
        address_b: address_b.to_string(),
    }
}

pub fn update_client(chain_id: &str, signer: &str, channel_id: &str, tx_time: i64) -> UpdateClientTx {
    UpdateClientTx {
        chain_id: chain_id.to_string(),
        signer: signer.to_string(),
        client_id: client_id_for(channel_id),
        tx_time,
    }
}

/// Transfer chainA/ch-1 -> chainB/ch-2 received by `address`
pub fn transfer(address: &str, status: TxStatus, amount: &str, tx_time: i64) -> SegmentTransfer {
    SegmentTransfer {
        address: address.to_string(),
        sc_chain_id: "chainA".to_string(),
        sc_channel: "ch-1".to_string(),
        dc_chain_id: "chainB".to_string(),
        dc_channel: "ch-2".to_string(),
        base_denom: BaseDenom::new("uatom", "chainA"),
        status,
        amount: amount.to_string(),
        tx_time,
    }
}

pub async fn store_with_chains(chains: &[&str]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for chain in chains {
        store.add_chain_config(chain_config(chain)).await;
    }
    store
}

pub fn orchestrator(
    config: EngineConfig,
    store: Arc<MemoryStore>,
    remote: Arc<ScriptedRemote>,
) -> Orchestrator {
    Orchestrator::new(
        config,
        EngineStores::from_memory(store),
        remote,
        Arc::new(EngineMetrics::new().unwrap()),
    )
}

fn injected(what: &str, id: &str) -> StoreError {
    StoreError::Backend(format!("injected {} failure for {}", what, id))
}

/// Statistics store whose upserts fail for one address
pub struct FailingStatistics {
    pub inner: Arc<MemoryStore>,
    pub address: String,
}

#[async_trait]
impl RelayerStatisticsStore for FailingStatistics {
    async fn upsert(&self, record: StatisticRecord) -> StoreResult<UpsertOutcome> {
        if record.address == self.address {
            return Err(injected("upsert", &record.address));
        }
        self.inner.upsert(record).await
    }

    async fn insert_many(&self, records: Vec<StatisticRecord>) -> StoreResult<()> {
        self.inner.insert_many(records).await
    }

    async fn aggregate_amounts(&self) -> StoreResult<Vec<AddressDenomAmount>> {
        self.inner.aggregate_amounts().await
    }

    async fn aggregate_txs(&self) -> StoreResult<Vec<AddressTxs>> {
        self.inner.aggregate_txs().await
    }

    async fn aggregate_fee_amounts(&self) -> StoreResult<Vec<AddressFeeAmount>> {
        self.inner.aggregate_fee_amounts().await
    }
}

/// Relayer store that refuses freshness writes for one relayer
pub struct FailingFreshness {
    pub inner: Arc<MemoryStore>,
    pub relayer_id: String,
}

#[async_trait]
impl RelayerStore for FailingFreshness {
    async fn find_page(&self, skip: usize, limit: usize) -> StoreResult<Vec<Relayer>> {
        self.inner.find_page(skip, limit).await
    }

    async fn find_by_address(&self, chain_id: &str, address: &str) -> StoreResult<Vec<Relayer>> {
        self.inner.find_by_address(chain_id, address).await
    }

    async fn find_by_channel(
        &self,
        chain_a: &str,
        channel_a: &str,
        chain_b: &str,
        channel_b: &str,
    ) -> StoreResult<Vec<Relayer>> {
        self.inner.find_by_channel(chain_a, channel_a, chain_b, channel_b).await
    }

    async fn insert(&self, relayer: Relayer) -> StoreResult<()> {
        self.inner.insert(relayer).await
    }

    async fn update_channel_pairs(&self, relayer_id: &str, pairs: Vec<ChannelPair>) -> StoreResult<()> {
        self.inner.update_channel_pairs(relayer_id, pairs).await
    }

    async fn update_time_if_newer(&self, relayer_id: &str, update_time: i64) -> StoreResult<bool> {
        if relayer_id == self.relayer_id {
            return Err(injected("freshness", relayer_id));
        }
        self.inner.update_time_if_newer(relayer_id, update_time).await
    }

    async fn update_totals(&self, relayer_id: &str, totals: RelayerTotals) -> StoreResult<()> {
        self.inner.update_totals(relayer_id, totals).await
    }

    async fn count_channel_relayers(
        &self,
        chain_a: &str,
        channel_a: &str,
        chain_b: &str,
        channel_b: &str,
    ) -> StoreResult<u64> {
        self.inner.count_channel_relayers(chain_a, channel_a, chain_b, channel_b).await
    }

    async fn count_chain_relayers(&self, chain_id: &str) -> StoreResult<u64> {
        self.inner.count_chain_relayers(chain_id).await
    }
}

/// Channel store whose count writes fail for one channel
pub struct FailingChannel {
    pub inner: Arc<MemoryStore>,
    pub channel_id: String,
}

#[async_trait]
impl ChannelStore for FailingChannel {
    async fn find_all(&self) -> StoreResult<Vec<Channel>> {
        ChannelStore::find_all(self.inner.as_ref()).await
    }

    async fn update_relayers(&self, channel_id: &str, relayers: u64) -> StoreResult<()> {
        if channel_id == self.channel_id {
            return Err(injected("channel count", channel_id));
        }
        ChannelStore::update_relayers(self.inner.as_ref(), channel_id, relayers).await
    }

    async fn update_time(&self, channel_id: &str, update_time: i64) -> StoreResult<()> {
        self.inner.update_time(channel_id, update_time).await
    }
}

/// Chain store whose count writes fail for one chain
pub struct FailingChain {
    pub inner: Arc<MemoryStore>,
    pub chain_id: String,
}

#[async_trait]
impl ChainStore for FailingChain {
    async fn find_all(&self) -> StoreResult<Vec<Chain>> {
        ChainStore::find_all(self.inner.as_ref()).await
    }

    async fn update_relayers(&self, chain_id: &str, relayers: u64) -> StoreResult<()> {
        if chain_id == self.chain_id {
            return Err(injected("chain count", chain_id));
        }
        ChainStore::update_relayers(self.inner.as_ref(), chain_id, relayers).await
    }
}
