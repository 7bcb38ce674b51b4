//! CCN daemon — entry point for running a core channel node.

use std::path::PathBuf;

use ccn_node::logging::{init_logging, LogFormat};
use ccn_node::{Node, NodeConfig};
use clap::Parser;

#[derive(Parser)]
#[command(name = "ccn-daemon", about = "Core channel node daemon")]
struct Cli {
    /// Data directory for the message store.
    #[arg(long, default_value = "./ccn_data", env = "CCN_DATA_DIR")]
    data_dir: PathBuf,

    /// Chains to accept, comma-separated (e.g. "hex,solana,tezos").
    #[arg(long, env = "CCN_CHAINS", value_delimiter = ',')]
    chains: Vec<String>,

    /// HTTP gateway of the content storage service.
    #[arg(long, env = "CCN_CONTENT_GATEWAY")]
    content_gateway: Option<String>,

    /// Number of pipeline drain workers.
    #[arg(long, env = "CCN_PIPELINE_WORKERS")]
    workers: Option<usize>,

    /// Log format: "human" or "json".
    #[arg(long, default_value = "human", env = "CCN_LOG_FORMAT")]
    log_format: String,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "CCN_LOG_LEVEL")]
    log_level: String,

    /// Path to a TOML configuration file. If provided, file settings are
    /// used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_chains(raw: &[String]) -> anyhow::Result<Vec<ccn_types::Chain>> {
    raw.iter()
        .map(|s| {
            s.parse::<ccn_types::Chain>()
                .map_err(|e| anyhow::anyhow!("{e}"))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config: Option<NodeConfig> = if let Some(ref config_path) = cli.config {
        match std::fs::read_to_string(config_path) {
            Ok(contents) => match toml::from_str::<NodeConfig>(&contents) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    anyhow::bail!("failed to parse config file {}: {e}", config_path.display())
                }
            },
            Err(e) => {
                anyhow::bail!("failed to read config file {}: {e}", config_path.display())
            }
        }
    } else {
        None
    };

    let mut config = file_config.unwrap_or_default();
    config.data_dir = cli.data_dir;
    if !cli.chains.is_empty() {
        config.chains = parse_chains(&cli.chains)?;
    }
    if let Some(gateway) = cli.content_gateway {
        config.content_gateway = gateway;
    }
    if let Some(workers) = cli.workers {
        config.pipeline_workers = workers;
    }
    config.log_format = cli.log_format;
    config.log_level = cli.log_level;

    init_logging(
        LogFormat::from_str_or_default(&config.log_format),
        &config.log_level,
    );

    tracing::info!(
        data_dir = %config.data_dir.display(),
        chains = ?config.chains,
        workers = config.pipeline_workers,
        "starting CCN node"
    );

    let mut node = Node::new(config)?;
    node.start()?;

    node.wait_for_signal().await;
    tracing::info!("shutdown signal received, stopping node");
    node.stop().await;

    tracing::info!("CCN daemon exited cleanly");
    Ok(())
}
