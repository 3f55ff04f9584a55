use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ibc_relayer_stats::{EngineConfig, EngineMetrics, EngineStores, LcdClient, MemoryStore, Orchestrator, Snapshot};

#[derive(Parser)]
#[command(name = "relayer-stats")]
#[command(about = "IBC relayer statistics engine")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/relayer-stats.toml")]
    pub config: String,

    /// Log level, overrides the configured one
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run on the configured schedule until interrupted
    Run {
        /// Snapshot file backing the stores
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Run once and print the report
    Once {
        /// Snapshot file backing the stores
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Validate and print the configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::CheckConfig = cli.command {
        let config = EngineConfig::load(&cli.config)?;
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    let log_level = cli.log_level.clone().unwrap_or_else(|| config.global.log_level.clone());

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ibc_relayer_stats={level},relayer_stats={level}", level = log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting IBC relayer statistics engine");

    match cli.command {
        Commands::Run { snapshot } => run_scheduled(config, snapshot).await?,
        Commands::Once { snapshot } => run_once(config, snapshot).await?,
        Commands::CheckConfig => {}
    }

    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<EngineConfig> {
    if Path::new(path).exists() {
        let config = EngineConfig::load(path)?;
        Ok(config)
    } else {
        eprintln!("Config {} not found, using defaults", path);
        Ok(EngineConfig::default())
    }
}

async fn open_store(snapshot: Option<&Path>) -> anyhow::Result<Arc<MemoryStore>> {
    match snapshot {
        Some(path) if path.exists() => {
            info!("Loading snapshot from: {}", path.display());
            Ok(Snapshot::load(path)?.into_store().await)
        }
        Some(path) => {
            warn!("Snapshot {} not found, starting empty", path.display());
            Ok(Arc::new(MemoryStore::new()))
        }
        None => {
            warn!("No snapshot given, state will not outlive the process");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn persist(store: &MemoryStore, snapshot: Option<&Path>) {
    if let Some(path) = snapshot {
        if let Err(e) = Snapshot::capture(store).await.save(path) {
            error!("Failed to save snapshot {}: {}", path.display(), e);
        }
    }
}

fn build_orchestrator(config: EngineConfig, store: Arc<MemoryStore>) -> anyhow::Result<Orchestrator> {
    let metrics = Arc::new(EngineMetrics::new()?);
    let remote = Arc::new(LcdClient::new(config.request_timeout())?);
    Ok(Orchestrator::new(config, EngineStores::from_memory(store), remote, metrics))
}

async fn run_once(config: EngineConfig, snapshot: Option<PathBuf>) -> anyhow::Result<()> {
    let store = open_store(snapshot.as_deref()).await?;
    let orchestrator = build_orchestrator(config, store.clone())?;

    let report = orchestrator.run().await?;
    persist(&store, snapshot.as_deref()).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_scheduled(config: EngineConfig, snapshot: Option<PathBuf>) -> anyhow::Result<()> {
    let store = open_store(snapshot.as_deref()).await?;
    let interval = Duration::from_secs(config.schedule.interval_secs.max(1));
    let orchestrator = build_orchestrator(config, store.clone())?;

    if orchestrator.config().metrics.enabled {
        start_metrics_server(&orchestrator);
    }

    info!("Running every {:?}", interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = orchestrator.run().await {
                    error!("Run failed: {}", e);
                }
                persist(&store, snapshot.as_deref()).await;
            }
            _ = &mut shutdown => {
                info!("Shutting down relayer statistics engine...");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(feature = "metrics")]
fn start_metrics_server(orchestrator: &Orchestrator) {
    use axum::{extract::State, routing::get, Router};

    async fn render(State(metrics): State<Arc<EngineMetrics>>) -> String {
        metrics.render()
    }

    let settings = orchestrator.config().metrics.clone();
    let app = Router::new()
        .route("/metrics", get(render))
        .with_state(orchestrator.metrics());

    tokio::spawn(async move {
        let addr = format!("{}:{}", settings.host, settings.port);
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server on {}: {}", addr, e);
                return;
            }
        };
        info!("Serving metrics on http://{}/metrics", addr);
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server stopped: {}", e);
        }
    });
}

#[cfg(not(feature = "metrics"))]
fn start_metrics_server(_orchestrator: &Orchestrator) {
    warn!("Metrics enabled in config but the binary was built without the metrics feature");
}
