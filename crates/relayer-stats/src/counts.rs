// Derived relayer counts on channel and chain entities

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::StoreError;
use crate::freshness::FreshnessMap;
use crate::metrics::EngineMetrics;
use crate::store::{ChainStore, ChannelStore, RelayerStore};
use crate::types::{canonical_channel_id, Chain, Channel};

/// Entities written concurrently by one updater
const MAX_CONCURRENT_ENTITIES: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountReport {
    pub updated: usize,
    pub failures: usize,
}

impl CountReport {
    fn from_outcomes(outcomes: &[bool]) -> Self {
        let updated = outcomes.iter().filter(|ok| **ok).count();
        Self {
            updated,
            failures: outcomes.len() - updated,
        }
    }
}

pub struct ChannelRelayerCountUpdater {
    channels: Arc<dyn ChannelStore>,
    relayers: Arc<dyn RelayerStore>,
    metrics: Arc<EngineMetrics>,
}

impl ChannelRelayerCountUpdater {
    pub fn new(channels: Arc<dyn ChannelStore>, relayers: Arc<dyn RelayerStore>, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            channels,
            relayers,
            metrics,
        }
    }

    /// Recount relayers per channel and copy positive freshness from `channel_times`
    pub async fn run(&self, channel_times: &FreshnessMap) -> CountReport {
        let channels = match self.channels.find_all().await {
            Ok(channels) => channels,
            Err(e) => {
                error!("Failed to read channels: {}", e);
                self.metrics.unit_failures.inc();
                return CountReport { updated: 0, failures: 1 };
            }
        };

        let outcomes: Vec<bool> = stream::iter(channels)
            .map(|channel| self.update_channel(channel, channel_times))
            .buffer_unordered(MAX_CONCURRENT_ENTITIES)
            .collect()
            .await;
        let report = CountReport::from_outcomes(&outcomes);

        info!(updated = report.updated, failures = report.failures, "Channel relayer counts updated");
        report
    }

    async fn update_channel(&self, channel: Channel, channel_times: &FreshnessMap) -> bool {
        let result = async {
            let count = self
                .relayers
                .count_channel_relayers(&channel.chain_a, &channel.channel_a, &channel.chain_b, &channel.channel_b)
                .await?;
            self.channels.update_relayers(&channel.channel_id, count).await?;

            let key = canonical_channel_id(&channel.chain_a, &channel.channel_a, &channel.chain_b, &channel.channel_b);
            if let Some(update_time) = channel_times.get(&key).filter(|t| *t > 0) {
                self.channels.update_time(&channel.channel_id, update_time).await?;
            }
            Ok::<(), StoreError>(())
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(channel = %channel.channel_id, "Failed to update channel: {}", e);
                self.metrics.unit_failures.inc();
                false
            }
        }
    }
}

pub struct ChainRelayerCountUpdater {
    chains: Arc<dyn ChainStore>,
    relayers: Arc<dyn RelayerStore>,
    metrics: Arc<EngineMetrics>,
}

impl ChainRelayerCountUpdater {
    pub fn new(chains: Arc<dyn ChainStore>, relayers: Arc<dyn RelayerStore>, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            chains,
            relayers,
            metrics,
        }
    }

    pub async fn run(&self) -> CountReport {
        let chains = match self.chains.find_all().await {
            Ok(chains) => chains,
            Err(e) => {
                error!("Failed to read chains: {}", e);
                self.metrics.unit_failures.inc();
                return CountReport { updated: 0, failures: 1 };
            }
        };

        let outcomes: Vec<bool> = stream::iter(chains)
            .map(|chain| self.update_chain(chain))
            .buffer_unordered(MAX_CONCURRENT_ENTITIES)
            .collect()
            .await;
        let report = CountReport::from_outcomes(&outcomes);

        info!(updated = report.updated, failures = report.failures, "Chain relayer counts updated");
        report
    }

    async fn update_chain(&self, chain: Chain) -> bool {
        let result = match self.relayers.count_chain_relayers(&chain.chain_id).await {
            Ok(count) => self.chains.update_relayers(&chain.chain_id, count).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(chain = %chain.chain_id, "Failed to update chain relayer count: {}", e);
                self.metrics.unit_failures.inc();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{ChannelPair, Relayer};

    fn relayer(id: &str, chain_b: &str, channel_b: &str) -> Relayer {
        Relayer {
            relayer_id: id.to_string(),
            channel_pairs: vec![ChannelPair {
                chain_a: "chainA".to_string(),
                channel_a: "ch-1".to_string(),
                address_a: format!("{}-a", id),
                chain_b: chain_b.to_string(),
                channel_b: channel_b.to_string(),
                address_b: format!("{}-b", id),
            }],
            ..Default::default()
        }
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert(relayer("r1", "chainB", "ch-2")).await.unwrap();
        store.insert(relayer("r2", "chainB", "ch-2")).await.unwrap();
        store.insert(relayer("r3", "chainC", "ch-7")).await.unwrap();

        // stored with the ends reversed
        store
            .add_channel(Channel {
                channel_id: "ab".to_string(),
                chain_a: "chainB".to_string(),
                channel_a: "ch-2".to_string(),
                chain_b: "chainA".to_string(),
                channel_b: "ch-1".to_string(),
                ..Default::default()
            })
            .await;
        store
            .add_channel(Channel {
                channel_id: "ac".to_string(),
                chain_a: "chainA".to_string(),
                channel_a: "ch-1".to_string(),
                chain_b: "chainC".to_string(),
                channel_b: "ch-7".to_string(),
                update_time: 42,
                ..Default::default()
            })
            .await;
        for chain in ["chainA", "chainB", "chainC"] {
            store
                .add_chain(Chain {
                    chain_id: chain.to_string(),
                    ..Default::default()
                })
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_channel_counts_and_freshness() {
        let store = seeded().await;
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let updater = ChannelRelayerCountUpdater::new(store.clone(), store.clone(), metrics);

        let map = FreshnessMap::new();
        map.record("chainA|ch-1|chainB|ch-2", 900);
        map.record("chainA|ch-1|chainC|ch-7", 0);

        let report = updater.run(&map).await;
        assert_eq!(report, CountReport { updated: 2, failures: 0 });

        let ab = store.channel("ab").await.unwrap();
        assert_eq!(ab.relayers, 2);
        assert_eq!(ab.update_time, 900);

        // zero is not written over an existing time
        let ac = store.channel("ac").await.unwrap();
        assert_eq!(ac.relayers, 1);
        assert_eq!(ac.update_time, 42);
    }

    #[tokio::test]
    async fn test_chain_counts() {
        let store = seeded().await;
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        let updater = ChainRelayerCountUpdater::new(store.clone(), store.clone(), metrics);

        let report = updater.run().await;
        assert_eq!(report.updated, 3);
        assert_eq!(store.chain("chainA").await.unwrap().relayers, 3);
        assert_eq!(store.chain("chainB").await.unwrap().relayers, 2);
        assert_eq!(store.chain("chainC").await.unwrap().relayers, 1);
    }
}
