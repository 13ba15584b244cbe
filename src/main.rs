use chordvault::{
    config::{PeerConfig, PROTOCOL_VERSION},
    network::node::ChordPeer,
};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "chordvault")]
#[command(about = "Distributed chunk backup over a Chord ring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PeerArgs {
    /// Host this peer listens on
    #[arg(long = "host", default_value = "127.0.0.1")]
    host: String,
    /// Port this peer listens on
    #[arg(short = 'p', long = "port")]
    port: u16,
    /// Numeric peer id carried in every message header
    #[arg(long = "peer-id", default_value_t = 0)]
    peer_id: u32,
    /// Protocol version carried in every message header
    #[arg(long = "protocol-version", default_value = PROTOCOL_VERSION)]
    protocol_version: String,
    /// File to back up once the peer is part of the ring
    #[arg(long = "backup")]
    backup: Option<PathBuf>,
    /// Replication degree for --backup
    #[arg(long = "replication", default_value_t = 1)]
    replication: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the first peer of a new ring
    #[command(name = "create")]
    Create {
        #[command(flatten)]
        peer: PeerArgs,
    },
    /// Join an existing ring through any of its peers
    #[command(name = "join")]
    Join {
        #[command(flatten)]
        peer: PeerArgs,
        /// Host of the contact peer
        #[arg(long = "contact-host", default_value = "127.0.0.1")]
        contact_host: String,
        /// Port of the contact peer
        #[arg(short = 'c', long = "contact-port")]
        contact_port: u16,
    },
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, String> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| format!("Failed to resolve {}:{}: {}", host, port, e))?
        .next()
        .ok_or_else(|| format!("No address found for {}:{}", host, port))
}

async fn build_peer(args: &PeerArgs) -> Result<Arc<ChordPeer>, String> {
    let address = resolve(&args.host, args.port).await?;
    let mut config = PeerConfig::new(args.peer_id, address);
    config.version = args.protocol_version.clone();
    Ok(ChordPeer::with_tcp(config))
}

async fn listen(peer: &Arc<ChordPeer>) -> Result<JoinHandle<()>, String> {
    peer.listen().await.map_err(|e| {
        error!("Peer error: {}", e);
        format!("Peer error: {}", e)
    })
}

/// Backs up `path` once the ring has had a few stabilize rounds to settle.
fn schedule_backup(peer: &Arc<ChordPeer>, path: PathBuf, replication: u32) {
    let peer = peer.clone();
    let settle = peer.config().stabilize_interval * 3;

    tokio::spawn(async move {
        tokio::time::sleep(settle).await;
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return;
            }
        };
        let name = path.to_string_lossy();
        match peer.backup_file(&name, &contents, replication).await {
            Ok(information) => info!(
                "Started backup of {} ({} chunk(s))",
                name, information.num_chunks
            ),
            Err(e) => error!("Backup of {} failed: {}", name, e),
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let (peer, args, server) = match cli.command {
        Commands::Create { peer: args } => {
            info!("Initializing first peer of a new ring...");
            let peer = build_peer(&args).await?;
            let server = listen(&peer).await?;
            peer.create_network().await;
            info!(
                "Ring created. Other peers can join using: chordvault join -p <PORT> -c {}",
                args.port
            );
            (peer, args, server)
        }
        Commands::Join {
            peer: args,
            contact_host,
            contact_port,
        } => {
            info!("Initializing peer to join a ring...");
            let peer = build_peer(&args).await?;
            let contact = resolve(&contact_host, contact_port).await?;
            let server = listen(&peer).await?;
            peer.join(contact)
                .await
                .map_err(|e| format!("Failed to join network: {}", e))?;
            (peer, args, server)
        }
    };

    if let Some(path) = args.backup.clone() {
        schedule_backup(&peer, path, args.replication);
    }

    info!("Peer {} running on {}", peer.config().peer_id, peer.info());
    peer.run(server).await;

    info!("Peer shut down gracefully");
    Ok(())
}
