// File-backed snapshot of a MemoryStore, so the binary can run without a database

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::MemoryStore;
use crate::types::{
    BaseDenomInfo, Chain, ChainConfig, Channel, Relayer, RelayerFeeRecord, SegmentTransfer, StatisticRecord, UpdateClientTx,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryCounterEntry {
    pub task: String,
    pub day: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub chain_configs: Vec<ChainConfig>,
    pub transfers: Vec<SegmentTransfer>,
    pub update_client_txs: Vec<UpdateClientTx>,
    pub relayers: Vec<Relayer>,
    pub statistics: Vec<StatisticRecord>,
    pub relayer_fees: Vec<RelayerFeeRecord>,
    pub channels: Vec<Channel>,
    pub chains: Vec<Chain>,
    pub base_denoms: Vec<BaseDenomInfo>,
    /// coin id -> price
    pub coin_prices: BTreeMap<String, Decimal>,
    pub retry_counters: Vec<RetryCounterEntry>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the snapshot as pretty JSON, replacing the file atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub async fn into_store(self) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.restore(self).await;
        store
    }

    pub async fn capture(store: &MemoryStore) -> Self {
        store.dump().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelPair;

    #[tokio::test]
    async fn test_snapshot_file_roundtrip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let snapshot = Snapshot {
            relayers: vec![Relayer {
                relayer_id: "r1".to_string(),
                channel_pairs: vec![ChannelPair {
                    chain_a: "a".to_string(),
                    channel_a: "ch-1".to_string(),
                    address_a: "x".to_string(),
                    chain_b: "b".to_string(),
                    channel_b: "ch-2".to_string(),
                    address_b: String::new(),
                }],
                update_time: 42,
                ..Default::default()
            }],
            retry_counters: vec![RetryCounterEntry {
                task: "t".to_string(),
                day: "2024-01-01".to_string(),
                count: 3,
            }],
            ..Default::default()
        };
        snapshot.save(&path).unwrap();

        let store = Snapshot::load(&path).unwrap().into_store().await;
        assert_eq!(store.relayer("r1").await.unwrap().update_time, 42);
        assert_eq!(store.retry_counter("t", "2024-01-01"), 3);

        let captured = Snapshot::capture(&store).await;
        assert_eq!(captured, snapshot);
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"relayers": []}"#).unwrap();
        assert!(snapshot.chain_configs.is_empty());
        assert!(snapshot.coin_prices.is_empty());
    }
}
