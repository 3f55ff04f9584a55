// Latest client update time across both ends of one channel pair

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::chains::RemoteChainClient;
use crate::error::{RemoteError, ResolveError};
use crate::metrics::EngineMetrics;
use crate::store::TransactionStore;
use crate::types::{ChainConfig, ChannelPair};

/// Result of resolving one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairResolution {
    pub channel_id: String,
    /// Larger of the two side times, 0 when neither side produced a signal
    pub update_time: i64,
}

/// Resolves a channel pair's freshness from the light client updates its
/// relayer submitted on either end.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct ChannelPairTimeResolver {
    chain_configs: Arc<HashMap<String, ChainConfig>>,
    remote: Arc<dyn RemoteChainClient>,
    transactions: Arc<dyn TransactionStore>,
    side_timeout: Duration,
    metrics: Arc<EngineMetrics>,
}

impl ChannelPairTimeResolver {
    pub fn new(
        chain_configs: Arc<HashMap<String, ChainConfig>>,
        remote: Arc<dyn RemoteChainClient>,
        transactions: Arc<dyn TransactionStore>,
        side_timeout: Duration,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            chain_configs,
            remote,
            transactions,
            side_timeout,
            metrics,
        }
    }

    /// Resolve both sides concurrently and keep the larger time.
    /// Never fails: a side that errors contributes 0.
    pub async fn resolve(&self, pair: &ChannelPair, floor_time: i64) -> PairResolution {
        let (side_a, side_b) = tokio::join!(
            self.side_time(&pair.chain_a, &pair.channel_a, &pair.address_a, floor_time),
            self.side_time(&pair.chain_b, &pair.channel_b, &pair.address_b, floor_time),
        );

        PairResolution {
            channel_id: pair.channel_id(),
            update_time: side_a.max(side_b),
        }
    }

    async fn side_time(&self, chain_id: &str, channel_id: &str, address: &str, floor_time: i64) -> i64 {
        if address.is_empty() {
            debug!(chain = chain_id, channel = channel_id, "No relayer address on this side");
            return 0;
        }

        let lookup = self.lookup_side(chain_id, channel_id, address, floor_time);
        let outcome = match tokio::time::timeout(self.side_timeout, lookup).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.side_timeout).into()),
        };

        match outcome {
            Ok(update_time) => update_time,
            Err(e) => {
                if matches!(e, ResolveError::Remote(_)) {
                    self.metrics.remote_errors.inc();
                }
                warn!(
                    chain = chain_id,
                    channel = channel_id,
                    address = address,
                    "Failed to resolve client update time: {}",
                    e
                );
                0
            }
        }
    }

    async fn lookup_side(
        &self,
        chain_id: &str,
        channel_id: &str,
        address: &str,
        floor_time: i64,
    ) -> Result<i64, ResolveError> {
        let config = self
            .chain_configs
            .get(chain_id)
            .ok_or_else(|| ResolveError::MissingChainConfig(chain_id.to_string()))?;

        let port_id = config.port_for_channel(channel_id);
        let client_id = self
            .remote
            .client_id_for_channel(&config.lcd, &config.client_state_path, port_id, channel_id)
            .await?;

        let latest = self
            .transactions
            .latest_update_client_time(chain_id, address, &client_id, floor_time)
            .await?;

        debug!(
            chain = chain_id,
            channel = channel_id,
            client_id = %client_id,
            "Latest client update: {:?}",
            latest
        );
        Ok(latest.unwrap_or(0))
    }
}
