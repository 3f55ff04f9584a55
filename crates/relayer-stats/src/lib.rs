// IBC relayer statistics library
// Exposes the engine components for the binary and the integration tests

pub mod chains;
pub mod config;
pub mod counts;
pub mod error;
pub mod freshness;
pub mod metrics;
pub mod orchestrator;
pub mod pool;
pub mod statistics;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use chains::{LcdClient, RemoteChainClient};
pub use config::EngineConfig;
pub use counts::{ChainRelayerCountUpdater, ChannelRelayerCountUpdater, CountReport};
pub use error::{EngineError, RemoteError, ResolveError, StoreError};
pub use freshness::{ChannelPairTimeResolver, FreshnessMap, RelayerFreshnessUpdater};
pub use metrics::EngineMetrics;
pub use orchestrator::{EngineStores, Orchestrator, RunReport};
pub use pool::WorkerPool;
pub use statistics::{
    PriceIndex, RelayerRegistrar, RelayerTotalsUpdater, RetryGate, StatisticsWindowRunner, ValueCalculator,
};
pub use store::{MemoryStore, Snapshot};
