//! Shoal CLI - tracker and peer entry points.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use shoal_core::tracker_list::{load_tracker_list, select_tracker};
use shoal_core::{init_tracing, spawn_catalog, CliLogLevel, PieceServer, TrackerService};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "shoal")]
#[command(about = "Group-scoped peer-to-peer file sharing")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Also write a full-debug log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run a tracker: bind the tracker-info entry at INDEX
    Tracker {
        /// Tracker-info file, one ip:port per line
        tracker_file: PathBuf,
        /// Which line of the file is this tracker
        index: usize,
    },
    /// Run a serving peer
    Peer {
        /// ip:port this peer serves pieces on
        address: SocketAddr,
        /// Tracker-info file, one ip:port per line
        tracker_file: PathBuf,
        /// Directory shared files are served from
        #[arg(long, default_value = ".")]
        share_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.log_file.as_deref())?;

    match cli.command {
        Commands::Tracker {
            tracker_file,
            index,
        } => run_tracker(&tracker_file, index).await?,
        Commands::Peer {
            address,
            tracker_file,
            share_dir,
        } => run_peer(address, &tracker_file, share_dir).await?,
    }

    Ok(())
}

async fn run_tracker(tracker_file: &std::path::Path, index: usize) -> shoal_core::Result<()> {
    let entries = load_tracker_list(tracker_file).await?;
    let (own, siblings) = select_tracker(&entries, index)?;
    // Siblings are recorded for operators; no replication happens.
    tracing::info!(
        "tracker {index} binding port {}, {} sibling(s) configured",
        own.port(),
        siblings.len()
    );

    let bind_addr = SocketAddr::new(IpAddr::from([0, 0, 0, 0]), own.port());
    let service = TrackerService::bind(bind_addr, spawn_catalog()).await?;

    service.run(shutdown_on_ctrl_c()).await?;
    Ok(())
}

async fn run_peer(
    address: SocketAddr,
    tracker_file: &std::path::Path,
    share_dir: PathBuf,
) -> shoal_core::Result<()> {
    let trackers = load_tracker_list(tracker_file).await?;
    tracing::info!("{} tracker(s) configured", trackers.len());

    let server = PieceServer::bind(address, share_dir).await?;
    server.run(shutdown_on_ctrl_c()).await?;
    Ok(())
}

/// Returns a watch receiver that flips to true when ctrl-c arrives.
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (sender, receiver) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = sender.send(true);
        }
    });
    receiver
}
