// relay-node: run a replica, dump its state, or force one exchange

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relaymesh::sync::RoundOutcome;
use relaymesh::transport::{gossip_router, serve};
use relaymesh::{
    GossipEngine, GossipScheduler, HttpTransport, NodeConfig, PeerAddress, SledStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relay-node", version, about = "Gossip-replicated device command relay")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve /gossip and run periodic exchange rounds
    Run {
        /// Override the listen address
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,

        /// Replace the configured peers (repeatable)
        #[arg(long = "peer", value_name = "HOST:PORT")]
        peers: Vec<String>,
    },

    /// Print the local payload as JSON
    Snapshot,

    /// Run a single exchange against one peer
    Exchange {
        #[arg(long, value_name = "HOST:PORT")]
        peer: String,
    },
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = NodeConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Commands::Run { listen, peers } = &cli.command {
        if let Some(listen) = listen {
            config = config.with_listen_address(listen);
        }
        if !peers.is_empty() {
            config = config.with_peers(peers.clone());
        }
        config.validate().context("invalid configuration")?;
    }

    init_tracing(&config.log_level);

    let store = Arc::new(
        SledStore::open(&config.data_dir)
            .with_context(|| format!("failed to open store at {}", config.data_dir.display()))?,
    );
    let transport = Arc::new(HttpTransport::new(config.transport.clone())?);
    let engine = Arc::new(GossipEngine::new(
        &config.node_name,
        store.clone(),
        config.peer_selector()?,
        transport,
    ));

    match cli.command {
        Commands::Run { .. } => run(config, engine, store).await,
        Commands::Snapshot => {
            let payload = engine.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Commands::Exchange { peer } => {
            let peer = PeerAddress::parse(&peer)?;
            let outcome = engine.exchange_with(&peer).await;
            store.flush()?;
            match outcome {
                RoundOutcome::Completed { report, .. } => {
                    println!(
                        "exchanged with {peer}: {} changed, {} failed",
                        report.changed(),
                        report.failed()
                    );
                    Ok(())
                }
                RoundOutcome::Failed { error, .. } => {
                    Err(error).with_context(|| format!("exchange with {peer} failed"))
                }
                other => anyhow::bail!("exchange with {peer} did not run: {other:?}"),
            }
        }
    }
}

async fn run(
    config: NodeConfig,
    engine: Arc<GossipEngine<SledStore>>,
    store: Arc<SledStore>,
) -> Result<()> {
    let listen = config.listen_socket()?;
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    info!(node = %config.node_name, address = %listen, "Listening for gossip");

    let router = gossip_router(engine.clone(), &config.transport);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, router, async move {
        let _ = stop_rx.await;
    }));

    let scheduler = if config.gossip.enabled {
        Some(GossipScheduler::spawn(engine.clone(), config.gossip.interval()))
    } else {
        info!("Periodic gossip disabled");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutting down");

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    let _ = stop_tx.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Server exited with error"),
        Err(e) => warn!(error = %e, "Server task failed"),
    }
    store.flush()?;

    let stats = engine.stats();
    info!(
        rounds_completed = stats.rounds_completed,
        rounds_failed = stats.rounds_failed,
        exchanges_served = stats.exchanges_served,
        "Stopped"
    );
    Ok(())
}
