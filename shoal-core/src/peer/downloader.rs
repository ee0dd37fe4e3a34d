//! Download orchestrator.
//!
//! Given a filename and the tracker's peer list, probes the peers, fetches
//! pieces sequentially round-robin across the survivors, persists each piece
//! to its own file, and concatenates them into the final artifact once the
//! peer network signals end-of-file.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::time::timeout;

use super::PeerError;
use crate::wire::{PeerContact, PieceHeader, PieceRequest, PIECE_SIZE};

/// Upper bound on piece indices tried per download.
const MAX_PIECES: u32 = 1000;

/// Consecutive failed pieces that end the download loop. After at least one
/// success this is read as end-of-file; before any success it is a failed
/// download.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Progress record for one in-flight or finished download.
#[derive(Debug, Clone)]
pub struct DownloadInfo {
    pub filename: String,
    pub dest_path: PathBuf,
    /// Estimated: counted in whole pieces while the download runs.
    pub downloaded_bytes: u64,
    /// Growing upper bound until completion fixes the real size.
    pub total_bytes: u64,
    pub complete: bool,
}

/// Shared registry of downloads, keyed by filename.
pub type ActiveDownloads = Arc<RwLock<HashMap<String, DownloadInfo>>>;

/// What a finished download produced.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub pieces: usize,
    pub bytes_written: u64,
}

/// One download run: probe, fetch, persist, reassemble.
pub struct Downloader {
    filename: String,
    dest_path: PathBuf,
    peers: Vec<PeerContact>,
    active_downloads: ActiveDownloads,
    probe_timeout: Duration,
    piece_timeout: Duration,
}

impl Downloader {
    /// Creates a download run for `filename` from the tracker-advertised
    /// peer list, writing into `dest_path`.
    pub fn new(
        filename: String,
        dest_path: PathBuf,
        peers: Vec<PeerContact>,
        active_downloads: ActiveDownloads,
        probe_timeout: Duration,
        piece_timeout: Duration,
    ) -> Self {
        Self {
            filename,
            dest_path,
            peers,
            active_downloads,
            probe_timeout,
            piece_timeout,
        }
    }

    /// Runs the download to completion.
    ///
    /// # Errors
    /// - `PeerError::NoPeersReachable` - every advertised peer failed the probe
    /// - `PeerError::NoPiecesDownloaded` - the first pieces failed three times
    ///   in a row
    /// - `PeerError::Io` - reassembly failed
    pub async fn run(self) -> Result<DownloadOutcome, PeerError> {
        tracing::info!("starting download of {}", self.filename);

        let survivors = self.probe_peers().await;
        if survivors.is_empty() {
            tracing::warn!("no reachable peers for {}", self.filename);
            return Err(PeerError::NoPeersReachable {
                filename: self.filename.clone(),
            });
        }
        tracing::info!(
            "{} of {} advertised peers reachable for {}",
            survivors.len(),
            self.peers.len(),
            self.filename
        );

        self.register().await;
        let successful = self.fetch_pieces(&survivors).await?;
        if successful.is_empty() {
            return Err(PeerError::NoPiecesDownloaded {
                filename: self.filename.clone(),
            });
        }

        let outcome = self.assemble(&successful).await?;
        self.mark_complete(outcome.bytes_written).await;
        tracing::info!(
            "download of {} complete: {} pieces, {} bytes",
            self.filename,
            outcome.pieces,
            outcome.bytes_written
        );
        Ok(outcome)
    }

    /// Probes every advertised peer with a plain TCP connect and keeps the
    /// ones that answer.
    async fn probe_peers(&self) -> Vec<(SocketAddr, String)> {
        let mut survivors = Vec::new();
        for contact in &self.peers {
            let Some(addr) = contact.socket_addr() else {
                tracing::debug!("skipping unparseable peer endpoint: {contact}");
                continue;
            };
            match timeout(self.probe_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_stream)) => {
                    tracing::debug!("peer {contact} reachable");
                    survivors.push((addr, contact.user_id.clone()));
                }
                Ok(Err(error)) => tracing::debug!("peer {contact} refused probe: {error}"),
                Err(_) => tracing::debug!("peer {contact} probe timed out"),
            }
        }
        survivors
    }

    async fn register(&self) {
        let mut downloads = self.active_downloads.write().await;
        downloads.insert(
            self.filename.clone(),
            DownloadInfo {
                filename: self.filename.clone(),
                dest_path: self.dest_path.clone(),
                downloaded_bytes: 0,
                total_bytes: 0,
                complete: false,
            },
        );
    }

    /// Sequential piece loop with round-robin peer selection.
    async fn fetch_pieces(&self, survivors: &[(SocketAddr, String)]) -> Result<Vec<u32>, PeerError> {
        let mut successful = Vec::new();
        let mut consecutive_failures = 0;
        let mut index = 0u32;

        while index < MAX_PIECES && consecutive_failures < MAX_CONSECUTIVE_FAILURES {
            let (addr, user_id) = &survivors[index as usize % survivors.len()];

            let stored = match fetch_piece(*addr, &self.filename, index, self.piece_timeout).await {
                Ok(payload) => self.store_piece(index, &payload).await.map(|()| payload.len()),
                Err(error) => Err(error),
            };

            match stored {
                Ok(length) => {
                    tracing::debug!(
                        "piece {index} from {user_id}: {length} bytes"
                    );
                    successful.push(index);
                    consecutive_failures = 0;
                    self.record_progress(successful.len() as u64).await;
                }
                Err(error) => {
                    consecutive_failures += 1;
                    tracing::debug!(
                        "piece {index} from {user_id} failed ({consecutive_failures} consecutive): {error}"
                    );
                }
            }
            index += 1;
        }

        Ok(successful)
    }

    async fn store_piece(&self, index: u32, payload: &[u8]) -> Result<(), PeerError> {
        let path = piece_path(&self.dest_path, &self.filename, index);
        fs::write(&path, payload).await?;
        Ok(())
    }

    async fn record_progress(&self, pieces_done: u64) {
        let mut downloads = self.active_downloads.write().await;
        if let Some(info) = downloads.get_mut(&self.filename) {
            info.downloaded_bytes += PIECE_SIZE;
            // The real size is never on the wire; keep a growing estimate a
            // few pieces ahead so percentages stay under 100 until the end.
            info.total_bytes = info.total_bytes.max((pieces_done + 5) * PIECE_SIZE);
        }
    }

    /// Concatenates the piece files in ascending index order, then deletes
    /// them.
    async fn assemble(&self, successful: &[u32]) -> Result<DownloadOutcome, PeerError> {
        let mut indices = successful.to_vec();
        indices.sort_unstable();

        let final_path = self.dest_path.join(&self.filename);
        let mut output = fs::File::create(&final_path).await?;
        let mut bytes_written = 0u64;

        for &index in &indices {
            let piece = fs::read(piece_path(&self.dest_path, &self.filename, index)).await?;
            output.write_all(&piece).await?;
            bytes_written += piece.len() as u64;
        }
        output.flush().await?;

        for &index in &indices {
            let path = piece_path(&self.dest_path, &self.filename, index);
            if let Err(error) = fs::remove_file(&path).await {
                tracing::warn!("leaving piece file {}: {error}", path.display());
            }
        }

        Ok(DownloadOutcome {
            path: final_path,
            pieces: indices.len(),
            bytes_written,
        })
    }

    async fn mark_complete(&self, bytes_written: u64) {
        let mut downloads = self.active_downloads.write().await;
        if let Some(info) = downloads.get_mut(&self.filename) {
            info.downloaded_bytes = bytes_written;
            info.total_bytes = bytes_written;
            info.complete = true;
        }
    }
}

/// Fetches one piece over a fresh connection.
///
/// The first read may hold the header alone, the header plus part of the
/// payload, or the whole reply; payload bytes are accumulated until exactly
/// the advertised count has arrived.
///
/// # Errors
/// - `PeerError::PieceUnavailable` - the peer answered `PIECE_NOT_FOUND`
/// - `PeerError::RequestRejected` - the peer answered `INVALID_REQUEST`
/// - `PeerError::ShortPiece` - the connection closed mid-payload
/// - `PeerError::Timeout` / `PeerError::Io` - transport failures
pub async fn fetch_piece(
    addr: SocketAddr,
    filename: &str,
    index: u32,
    io_timeout: Duration,
) -> Result<bytes::Bytes, PeerError> {
    let mut stream = timeout(io_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| PeerError::Timeout {
            operation: "connecting to peer",
        })??;

    let request = PieceRequest {
        filename: filename.to_string(),
        index,
    };
    let line = format!("{}\n", request.to_line());
    timeout(io_timeout, stream.write_all(line.as_bytes()))
        .await
        .map_err(|_| PeerError::Timeout {
            operation: "sending piece request",
        })??;

    // Read until the header line is complete.
    let mut buffer = BytesMut::with_capacity(8192);
    let newline = loop {
        if let Some(position) = buffer.iter().position(|&byte| byte == b'\n') {
            break position;
        }
        let read = timeout(io_timeout, stream.read_buf(&mut buffer))
            .await
            .map_err(|_| PeerError::Timeout {
                operation: "reading piece header",
            })??;
        if read == 0 {
            return Err(PeerError::MalformedPieceResponse);
        }
    };

    let header = std::str::from_utf8(&buffer[..newline])
        .map_err(|_| PeerError::MalformedPieceResponse)?;
    let expected = match PieceHeader::parse(header) {
        Some(PieceHeader::Data(expected)) if expected as u64 <= PIECE_SIZE => expected,
        Some(PieceHeader::Data(_)) => return Err(PeerError::MalformedPieceResponse),
        Some(PieceHeader::NotFound) => return Err(PeerError::PieceUnavailable { index }),
        Some(PieceHeader::Invalid) => return Err(PeerError::RequestRejected),
        None => return Err(PeerError::MalformedPieceResponse),
    };
    buffer.advance(newline + 1);

    // Accumulate the remaining payload.
    while buffer.len() < expected {
        let read = timeout(io_timeout, stream.read_buf(&mut buffer))
            .await
            .map_err(|_| PeerError::Timeout {
                operation: "reading piece payload",
            })??;
        if read == 0 {
            return Err(PeerError::ShortPiece {
                got: buffer.len(),
                expected,
            });
        }
    }

    Ok(buffer.split_to(expected).freeze())
}

fn piece_path(dest_path: &Path, filename: &str, index: u32) -> PathBuf {
    dest_path.join(format!("{filename}.piece{index}"))
}
