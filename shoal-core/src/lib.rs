//! Shoal core - group-scoped peer-to-peer file sharing.

#![warn(missing_docs)]
#![warn(clippy::too_many_lines)]
//!
//! This crate provides both halves of the shoal protocol family: the tracker
//! (catalog authority plus TCP connection service) and the peer engine
//! (piece serving endpoint, tracker client, and download orchestrator),
//! together with the SHA-1 content hashing used at upload time.

pub mod config;
pub mod hashing;
pub mod peer;
pub mod tracker;
pub mod tracker_list;
pub mod tracing_setup;
pub mod wire;

// Re-export main types for convenient access
pub use config::ShoalConfig;
pub use peer::{PeerError, PeerSession, PieceServer, TcpTrackerClient};
pub use tracker::{spawn_catalog, CatalogHandle, TrackerError, TrackerService};
pub use tracker_list::TrackerListError;
pub use tracing_setup::{init_tracing, CliLogLevel};
pub use wire::PIECE_SIZE;

/// Errors that can bubble up from any shoal subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ShoalError {
    /// Tracker-side errors (authority actor, connection service)
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// Peer-side errors (serving, tracker round trips, downloads)
    #[error("Peer error: {0}")]
    Peer(#[from] PeerError),

    /// Tracker-info file errors
    #[error("Tracker list error: {0}")]
    TrackerList(#[from] TrackerListError),

    /// Standard I/O errors from filesystem or socket operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using ShoalError as the error type
pub type Result<T> = std::result::Result<T, ShoalError>;
