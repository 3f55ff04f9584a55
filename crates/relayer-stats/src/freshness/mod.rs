// Relayer freshness: latest light client update per channel pair and relayer

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod resolver;
pub mod updater;

pub use resolver::{ChannelPairTimeResolver, PairResolution};
pub use updater::{floor_time, FreshnessOutcome, FreshnessPassReport, RelayerFreshnessUpdater};

/// Run-scoped channel id -> resolved timestamp map.
///
/// Written concurrently by every pair resolution of a pass. When two units
/// resolve the same channel the larger timestamp wins. Read it only after
/// the pass has joined.
#[derive(Debug, Clone, Default)]
pub struct FreshnessMap {
    inner: Arc<DashMap<String, i64>>,
}

impl FreshnessMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, channel_id: &str, update_time: i64) {
        self.inner
            .entry(channel_id.to_string())
            .and_modify(|current| {
                if update_time > *current {
                    *current = update_time;
                }
            })
            .or_insert(update_time);
    }

    pub fn get(&self, channel_id: &str) -> Option<i64> {
        self.inner.get(channel_id).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Sorted copy of the current contents
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.inner.iter().map(|e| (e.key().clone(), *e.value())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_maximum() {
        let map = FreshnessMap::new();
        map.record("a|1|b|2", 100);
        map.record("a|1|b|2", 50);
        map.record("a|1|b|2", 120);
        map.record("c|1|d|2", 0);

        assert_eq!(map.get("a|1|b|2"), Some(120));
        assert_eq!(map.get("c|1|d|2"), Some(0));
        assert_eq!(map.get("missing"), None);
        assert_eq!(map.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_converge_on_max() {
        let map = FreshnessMap::new();
        let mut handles = Vec::new();
        for ts in 0..64i64 {
            let map = map.clone();
            handles.push(tokio::spawn(async move { map.record("shared", ts) }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(map.snapshot().get("shared"), Some(&63));
    }
}
