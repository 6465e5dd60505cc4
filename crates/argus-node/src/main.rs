use anyhow::{Context, Result};
use argus_node::config::ArgusConfig;
use argus_node::logging::init_logging;
use argus_node::node::ArgusNode;
use argus_node::transport::{LogWeightSink, SimulatedTransport};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "argus")]
#[command(about = "Argus - Company Intelligence Validator Node", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the validator loop
    Start {
        /// Data directory for state
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Use simulated miners instead of a real transport
        #[arg(long)]
        simulate: bool,

        /// Number of simulated miners
        #[arg(long, default_value = "8")]
        sim_miners: u16,
    },

    /// Write a default configuration file
    Init {
        /// Output directory for the configuration
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ArgusConfig::from_file(path)?,
        None => ArgusConfig::default(),
    };
    config.apply_env_overrides();

    match cli.command {
        Commands::Init { output } => {
            let path = output.join("argus-config.toml");
            config
                .save_to_file(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
        Commands::Start {
            data_dir,
            simulate,
            sim_miners,
        } => {
            config.node.data_dir = data_dir;
            config.validate()?;
            init_logging(&config.logging, cli.verbose)?;

            if !simulate {
                anyhow::bail!(
                    "no miner transport configured; run with --simulate or wire a transport"
                );
            }

            info!(miners = sim_miners, "🚀 Starting validator with simulated miners");
            let transport = Arc::new(SimulatedTransport::new(sim_miners));
            let sink = Arc::new(LogWeightSink);
            let node = ArgusNode::new(config, transport, sink)?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("🛑 Shutdown signal received");
                    let _ = shutdown_tx.send(true);
                }
            });

            node.run(shutdown_rx).await
        }
    }
}
