//! Tracker side: catalog authority actor and TCP connection service.

pub mod actor;
pub mod catalog;
pub mod commands;
pub mod handle;
pub mod service;

use std::net::SocketAddr;

pub use actor::spawn_catalog;
pub use catalog::Catalog;
pub use commands::{CatalogCommand, CatalogStats};
pub use handle::CatalogHandle;
pub use service::TrackerService;

/// Errors from the tracker process.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The catalog actor has stopped and can no longer answer commands.
    #[error("catalog authority is no longer running")]
    AuthorityClosed,

    /// The connection service could not bind its listener.
    #[error("failed to bind tracker listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Connection-level I/O failure.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
