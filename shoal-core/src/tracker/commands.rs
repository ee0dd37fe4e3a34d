//! Command definitions for the catalog authority actor.

use tokio::sync::oneshot;

use crate::wire::TrackerRequest;

/// Commands the catalog actor processes.
///
/// Each command carries a oneshot responder; the actor answers every command
/// in arrival order, which is what serializes all catalog mutations.
pub enum CatalogCommand {
    /// Apply one tracker request and return its wire reply.
    Execute {
        request: TrackerRequest,
        responder: oneshot::Sender<String>,
    },
    /// Report catalog counts.
    Stats {
        responder: oneshot::Sender<CatalogStats>,
    },
    /// Stop the actor.
    Shutdown { responder: oneshot::Sender<()> },
}

/// Catalog counts for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogStats {
    pub users: usize,
    pub online_users: usize,
    pub groups: usize,
    pub files: usize,
}
