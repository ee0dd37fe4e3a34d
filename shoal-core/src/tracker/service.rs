//! TCP connection service for the tracker.
//!
//! Accepts clients, frames newline-terminated request lines, dispatches each
//! to the catalog authority, and writes the reply back. A connection may
//! issue any number of commands; replies come back in request order.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use super::handle::CatalogHandle;
use super::TrackerError;
use crate::wire::TrackerRequest;

/// Characters of a command shown in logs before truncation. Upload commands
/// carry piece-hash blobs proportional to file size.
const LOG_PREVIEW_CHARS: usize = 100;

/// The tracker's listening side.
pub struct TrackerService {
    listener: TcpListener,
    handle: CatalogHandle,
}

impl TrackerService {
    /// Binds the listener.
    ///
    /// # Errors
    /// - `TrackerError::Bind` - the address is unavailable
    pub async fn bind(addr: SocketAddr, handle: CatalogHandle) -> Result<Self, TrackerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TrackerError::Bind { addr, source })?;
        Ok(Self { listener, handle })
    }

    /// The address the service actually bound (useful with port 0).
    ///
    /// # Errors
    /// Propagates the listener's local-address lookup failure.
    pub fn local_addr(&self) -> Result<SocketAddr, TrackerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop until `shutdown` flips to true.
    ///
    /// Each accepted client gets its own task; in-flight connections drain
    /// on their own once the accept loop stops.
    ///
    /// # Errors
    /// - `TrackerError::Io` - accepting failed in a non-transient way
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), TrackerError> {
        let local = self.listener.local_addr()?;
        tracing::info!("tracker listening on {local}");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = accepted?;
                    tracing::debug!("client connected: {peer_addr}");
                    let handle = self.handle.clone();
                    tokio::spawn(async move {
                        if let Err(error) = serve_connection(stream, handle).await {
                            tracing::debug!("client {peer_addr} dropped: {error}");
                        }
                        tracing::debug!("client disconnected: {peer_addr}");
                    });
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too.
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("tracker shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, handle: CatalogHandle) -> Result<(), TrackerError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        // The line buffer grows as needed, so multi-megabyte UPLOAD_FILE
        // commands frame correctly.
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }

        let command = line.trim_end_matches(['\r', '\n']);
        tracing::debug!("command: {}", preview(command));

        let reply = match TrackerRequest::parse(command) {
            Ok(request) => handle
                .execute(request)
                .await
                .unwrap_or_else(|_| "ERROR: Tracker shutting down\n".to_string()),
            Err(parse_error) => parse_error.to_reply(),
        };

        writer.write_all(reply.as_bytes()).await?;
        tracing::debug!("reply: {}", preview(reply.trim_end()));
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    format!("{head}... [{} chars]", text.len())
}
