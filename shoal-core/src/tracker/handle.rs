//! Handle for talking to the catalog authority actor.

use tokio::sync::{mpsc, oneshot};

use super::commands::{CatalogCommand, CatalogStats};
use super::TrackerError;
use crate::wire::TrackerRequest;

/// Cloneable handle to the catalog actor.
///
/// The connection service holds one per connection task; everything funnels
/// into the same actor loop.
#[derive(Clone)]
pub struct CatalogHandle {
    sender: mpsc::Sender<CatalogCommand>,
}

impl CatalogHandle {
    /// Wraps a command sender into a handle.
    pub fn new(sender: mpsc::Sender<CatalogCommand>) -> Self {
        Self { sender }
    }

    /// Applies one tracker request and returns its wire reply.
    ///
    /// # Errors
    /// - `TrackerError::AuthorityClosed` - the actor has stopped
    pub async fn execute(&self, request: TrackerRequest) -> Result<String, TrackerError> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(CatalogCommand::Execute { request, responder })
            .await
            .map_err(|_| TrackerError::AuthorityClosed)?;
        receiver.await.map_err(|_| TrackerError::AuthorityClosed)
    }

    /// Returns catalog counts.
    ///
    /// # Errors
    /// - `TrackerError::AuthorityClosed` - the actor has stopped
    pub async fn stats(&self) -> Result<CatalogStats, TrackerError> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(CatalogCommand::Stats { responder })
            .await
            .map_err(|_| TrackerError::AuthorityClosed)?;
        receiver.await.map_err(|_| TrackerError::AuthorityClosed)
    }

    /// Stops the actor after it drains queued commands.
    ///
    /// # Errors
    /// - `TrackerError::AuthorityClosed` - the actor had already stopped
    pub async fn shutdown(&self) -> Result<(), TrackerError> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(CatalogCommand::Shutdown { responder })
            .await
            .map_err(|_| TrackerError::AuthorityClosed)?;
        receiver.await.map_err(|_| TrackerError::AuthorityClosed)
    }

    /// True while the actor still accepts commands.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}
