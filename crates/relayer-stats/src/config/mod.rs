use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub global: GlobalConfig,
    pub schedule: ScheduleConfig,
    pub stats: StatsConfig,
    pub pools: PoolConfig,
    pub remote: RemoteConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Log level for the engine
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between two scheduled runs
    pub interval_secs: u64,
    /// Offset from UTC used to cut calendar days, in seconds
    pub utc_offset_secs: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Task name used to scope the day retry counter
    pub task_name: String,
    /// Look-back horizon for client update lookups, in days
    pub lookback_days: u32,
    /// Yesterday is recomputed while its counter is at most this value
    pub yesterday_retry_threshold: u32,
    /// Relayers read per page during the freshness pass
    pub relayer_page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Concurrent relayers in the freshness pass
    pub outer_width: usize,
    /// Concurrent channel pairs per relayer
    pub inner_width: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Timeout for a single LCD request in milliseconds
    pub request_timeout_ms: u64,
    /// Upper bound for resolving one side of a channel pair in milliseconds
    pub side_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics server
    pub enabled: bool,
    /// Metrics server host
    pub host: String,
    /// Metrics server port
    pub port: u16,
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pools.outer_width == 0 || self.pools.inner_width == 0 {
            anyhow::bail!("pool widths must be positive");
        }
        if self.stats.relayer_page_size == 0 {
            anyhow::bail!("relayer_page_size must be positive");
        }
        if self.stats.lookback_days == 0 {
            anyhow::bail!("lookback_days must be positive");
        }
        if self.schedule.utc_offset_secs.unsigned_abs() >= 86_400 {
            anyhow::bail!("utc_offset_secs must be within one day");
        }
        Ok(())
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.stats.lookback_days))
    }

    pub fn side_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.side_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.request_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig {
                log_level: "info".to_string(),
            },
            schedule: ScheduleConfig {
                interval_secs: 180,
                utc_offset_secs: 0,
            },
            stats: StatsConfig {
                task_name: "ibc_relayer_task".to_string(),
                lookback_days: 21, // unbonding period of most hubs
                yesterday_retry_threshold: 5,
                relayer_page_size: 1000,
            },
            pools: PoolConfig {
                outer_width: 5,
                inner_width: 3,
            },
            remote: RemoteConfig {
                request_timeout_ms: 10_000,
                side_timeout_ms: 30_000,
            },
            metrics: MetricsConfig {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
        }
    }
}
