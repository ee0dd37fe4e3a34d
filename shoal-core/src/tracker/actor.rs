//! Actor running the catalog authority.
//!
//! The actor owns the [`Catalog`] outright and processes commands one at a
//! time, so every mutation is serialized without a lock in sight.

use tokio::sync::mpsc;

use super::catalog::Catalog;
use super::commands::CatalogCommand;
use super::handle::CatalogHandle;

const COMMAND_CHANNEL_CAPACITY: usize = 100;

/// Spawns the catalog actor and returns its handle.
///
/// The handle can be cloned freely; the actor stops when every handle is
/// dropped or a shutdown command arrives.
pub fn spawn_catalog() -> CatalogHandle {
    let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        run_actor_loop(Catalog::new(), receiver).await;
    });

    CatalogHandle::new(sender)
}

async fn run_actor_loop(mut catalog: Catalog, mut receiver: mpsc::Receiver<CatalogCommand>) {
    tracing::debug!("catalog actor started");

    while let Some(command) = receiver.recv().await {
        match command {
            CatalogCommand::Execute { request, responder } => {
                let reply = catalog.execute(request);
                let _ = responder.send(reply);
            }
            CatalogCommand::Stats { responder } => {
                let _ = responder.send(catalog.stats());
            }
            CatalogCommand::Shutdown { responder } => {
                let _ = responder.send(());
                break;
            }
        }
    }

    tracing::debug!("catalog actor stopped");
}
