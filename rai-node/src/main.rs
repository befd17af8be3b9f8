use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rai_network::{Body, ChainPuller, GossipEvent, GossipTransport, NetworkConfig};
use tokio::signal;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

mod cli;
mod config;
mod logging;

use cli::{Args, Command};
use config::{NodeConfig, APP_NAME, CONFIG_NAME};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = logging::init(&args.log_level, args.log_file.as_deref())?;

    match confy::get_configuration_file_path(APP_NAME, CONFIG_NAME) {
        Ok(path) => info!("Configuration file path: {:?}", path),
        Err(e) => debug!("No configuration path: {}", e),
    }
    let mut cfg: NodeConfig = match confy::load(APP_NAME, CONFIG_NAME) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}. Using default.", e);
            NodeConfig::default()
        }
    };
    cfg.apply_args(&args);
    debug!("Loaded configuration: {:#?}", cfg);

    let network = cfg.network_config();
    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(network).await,
        Command::Pull { account } => {
            pull(network, &account, Duration::from_secs(cfg.warmup_secs)).await
        }
    }
}

/// Gossip until Ctrl+C, re-broadcasting keepalives on a timer
async fn run(network: NetworkConfig) -> anyhow::Result<()> {
    let keepalive_interval = network.keepalive_interval;
    let bootstrap_peers = network.bootstrap_peers.clone();
    let (transport, mut events) = GossipTransport::bind(network)
        .await
        .context("Failed to bind gossip socket")?;
    let receive_loop = transport.spawn();
    transport.bootstrap(&bootstrap_peers).await;

    info!(
        "Node is running on {}. Press Ctrl+C to shut down gracefully.",
        transport.local_addr()?
    );

    let mut keepalive = tokio::time::interval(keepalive_interval);
    loop {
        tokio::select! {
            _ = keepalive.tick() => {
                let publication = transport.broadcast_keepalive().await?;
                let peers = transport.peers().await.len();
                tokio::spawn(async move {
                    let sent = publication.sent().await;
                    debug!("Keepalive reached {}/{} peers", sent, peers);
                });
            }
            event = events.recv() => match event {
                Some(event) => log_event(event),
                None => break,
            },
            _ = signal::ctrl_c() => {
                info!("Ctrl+C received, sending shutdown signal.");
                break;
            }
        }
    }

    transport.shutdown();
    receive_loop.await.context("Gossip task panicked")?;
    info!("Node shut down.");
    Ok(())
}

/// Discover peers for a while, then pull `account` from all of them
async fn pull(network: NetworkConfig, account: &str, warmup: Duration) -> anyhow::Result<()> {
    let puller = ChainPuller::new(&network);
    let bootstrap_peers = network.bootstrap_peers.clone();
    let (transport, events) = GossipTransport::bind(network)
        .await
        .context("Failed to bind gossip socket")?;
    let receive_loop = transport.spawn();
    let drain = tokio::spawn(drain_events(events));

    transport.bootstrap(&bootstrap_peers).await;
    tokio::time::sleep(warmup / 2).await;
    transport.broadcast_keepalive().await?;
    tokio::time::sleep(warmup - warmup / 2).await;

    let peers = transport.peers().await;
    if peers.is_empty() {
        warn!("No peers discovered; the result will be empty");
    }
    let summary = puller.fetch_account(&peers, account).await?;
    info!(
        "{} of {} peers answered, {:.0}% agree on {} blocks",
        summary.return_count,
        peers.len(),
        summary.match_proportion * 100.0,
        summary.blocks.len()
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    transport.shutdown();
    receive_loop.await.context("Gossip task panicked")?;
    drain.abort();
    Ok(())
}

async fn drain_events(mut events: UnboundedReceiver<GossipEvent>) {
    while let Some(event) = events.recv().await {
        if let GossipEvent::Error(e) = event {
            debug!("{}", e);
        }
    }
}

fn log_event(event: GossipEvent) {
    match event {
        GossipEvent::Message { message, from } => {
            debug!("{:?} from {}", message.message_type(), from);
        }
        GossipEvent::Block { block, from } => {
            info!("Block {} ({:?}) from {}", block.hash(), block.block_type(), from);
        }
        GossipEvent::Vote { body, from } => match body {
            Body::Vote(vote) => info!(
                "Vote by {} for {} (sequence {}) from {}",
                hex::encode_upper(vote.account),
                vote.block.hash(),
                vote.sequence(),
                from
            ),
            Body::VoteAccount { account, .. } => {
                info!("Vote by {} from {}", hex::encode_upper(account), from)
            }
            _ => {}
        },
        GossipEvent::Error(e) => warn!("{}", e),
    }
}
