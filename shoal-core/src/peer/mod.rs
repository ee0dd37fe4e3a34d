//! Peer side: piece serving endpoint, tracker client, and the download
//! orchestrator.

pub mod downloader;
pub mod server;
pub mod session;
pub mod tracker_client;

use std::net::SocketAddr;
use std::path::PathBuf;

pub use downloader::{ActiveDownloads, DownloadInfo, DownloadOutcome, Downloader};
pub use server::PieceServer;
pub use session::{PeerSession, UploadSummary};
pub use tracker_client::TcpTrackerClient;

/// Errors from the peer process.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// A session operation was attempted before `login`.
    #[error("not logged in")]
    NotLoggedIn,

    /// Every configured tracker refused the connection.
    #[error("no tracker reachable")]
    NoTrackerReachable,

    /// The tracker answered with an `ERROR:` line.
    #[error("tracker refused: {reply}")]
    TrackerRefused { reply: String },

    /// The tracker's reply did not match the expected grammar.
    #[error("malformed tracker reply: {reply}")]
    MalformedReply { reply: String },

    /// No advertised peer survived the reachability probe.
    #[error("no reachable peers for {filename}")]
    NoPeersReachable { filename: String },

    /// The download loop ended without a single successful piece.
    #[error("no pieces downloaded for {filename}")]
    NoPiecesDownloaded { filename: String },

    /// The serving peer answered `PIECE_NOT_FOUND`.
    #[error("piece {index} not available")]
    PieceUnavailable { index: u32 },

    /// The serving peer answered `INVALID_REQUEST`.
    #[error("piece request rejected by peer")]
    RequestRejected,

    /// The piece reply header could not be parsed.
    #[error("malformed piece response")]
    MalformedPieceResponse,

    /// The connection closed before the full payload arrived.
    #[error("short piece read: got {got} of {expected} bytes")]
    ShortPiece { got: usize, expected: usize },

    /// A network operation exceeded its deadline.
    #[error("timed out while {operation}")]
    Timeout { operation: &'static str },

    /// The serving endpoint could not bind its listener.
    #[error("failed to bind piece server on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An upload source file is missing, unreadable, or empty.
    #[error("invalid source file {path}: {reason}")]
    InvalidSourceFile { path: PathBuf, reason: String },

    /// Everything else file- or socket-shaped.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
