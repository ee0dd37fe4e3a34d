//! Piece serving endpoint.
//!
//! Every participant listens for `GET_PIECE` requests and answers them from
//! files it can find locally. One request per connection: read a line,
//! reply, close.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use super::PeerError;
use crate::wire::{PieceRequest, INVALID_REQUEST, PIECE_NOT_FOUND, PIECE_SIZE};

/// Directories probed for a requested filename, relative to the server's
/// base directory. The list is part of the serving contract: uploaders and
/// servers agree on where shared files live.
const CANDIDATE_DIRS: &[&str] = &["", ".", "..", "downloads"];

/// TCP listener answering `GET_PIECE` requests.
pub struct PieceServer {
    listener: TcpListener,
    base_dir: PathBuf,
}

impl PieceServer {
    /// Binds the serving endpoint.
    ///
    /// `base_dir` roots the candidate path lookup; production peers pass the
    /// directory they share from (usually `.`).
    ///
    /// # Errors
    /// - `PeerError::Bind` - the address is unavailable
    pub async fn bind(addr: SocketAddr, base_dir: PathBuf) -> Result<Self, PeerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| PeerError::Bind { addr, source })?;
        Ok(Self { listener, base_dir })
    }

    /// The address the endpoint actually bound.
    ///
    /// # Errors
    /// Propagates the listener's local-address lookup failure.
    pub fn local_addr(&self) -> Result<SocketAddr, PeerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop until `shutdown` flips to true.
    ///
    /// # Errors
    /// - `PeerError::Io` - accepting failed in a non-transient way
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), PeerError> {
        let local = self.listener.local_addr()?;
        tracing::info!("piece server listening on {local}");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = accepted?;
                    let base_dir = self.base_dir.clone();
                    tokio::spawn(async move {
                        if let Err(error) = serve_request(stream, &base_dir).await {
                            tracing::debug!("piece request from {peer_addr} failed: {error}");
                        }
                    });
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too.
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("piece server shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn serve_request(stream: TcpStream, base_dir: &Path) -> Result<(), PeerError> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    reader.read_line(&mut line).await?;
    let line = line.trim_end_matches(['\r', '\n']);

    let Some(request) = PieceRequest::parse(line) else {
        tracing::debug!("invalid piece request: {line}");
        writer
            .write_all(format!("{INVALID_REQUEST}\n").as_bytes())
            .await?;
        return Ok(());
    };

    // The filename names a shared file, never a path.
    if request.filename.contains(['/', '\\']) {
        tracing::debug!("rejecting path-shaped filename: {}", request.filename);
        writer
            .write_all(format!("{INVALID_REQUEST}\n").as_bytes())
            .await?;
        return Ok(());
    }

    match read_piece(base_dir, &request.filename, request.index).await {
        Some(payload) => {
            tracing::debug!(
                "serving piece {} of {} ({} bytes)",
                request.index,
                request.filename,
                payload.len()
            );
            // Header and payload go out as separate writes; receivers must
            // reassemble across arbitrary boundaries either way.
            writer
                .write_all(format!("PIECE_DATA {}\n", payload.len()).as_bytes())
                .await?;
            writer.write_all(&payload).await?;
            writer.flush().await?;
        }
        None => {
            tracing::debug!(
                "piece {} of {} not available",
                request.index,
                request.filename
            );
            writer
                .write_all(format!("{PIECE_NOT_FOUND}\n").as_bytes())
                .await?;
        }
    }
    Ok(())
}

/// Probes the candidate directories for the filename.
async fn locate(base_dir: &Path, filename: &str) -> Option<PathBuf> {
    for dir in CANDIDATE_DIRS {
        let path = if dir.is_empty() {
            base_dir.join(filename)
        } else {
            base_dir.join(dir).join(filename)
        };
        if fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            return Some(path);
        }
    }
    None
}

/// Reads piece `index` of the file, or `None` for any failure the protocol
/// folds into `PIECE_NOT_FOUND`: unknown file, out-of-range index, or a
/// short read.
async fn read_piece(base_dir: &Path, filename: &str, index: u32) -> Option<Vec<u8>> {
    let path = locate(base_dir, filename).await?;

    let mut file = fs::File::open(&path).await.ok()?;
    let file_size = file.metadata().await.ok()?.len();

    let offset = u64::from(index) * PIECE_SIZE;
    if offset >= file_size {
        return None;
    }

    let length = PIECE_SIZE.min(file_size - offset) as usize;
    file.seek(std::io::SeekFrom::Start(offset)).await.ok()?;

    let mut payload = vec![0u8; length];
    file.read_exact(&mut payload).await.ok()?;
    Some(payload)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    async fn start_server(base_dir: PathBuf) -> SocketAddr {
        let server = PieceServer::bind("127.0.0.1:0".parse().unwrap(), base_dir)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            let _shutdown_tx = _shutdown_tx;
            let _ = server.run(shutdown_rx).await;
        });
        addr
    }

    async fn request_raw(addr: SocketAddr, line: &str) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        response
    }

    fn split_header(response: &[u8]) -> (&str, &[u8]) {
        let newline = response.iter().position(|&b| b == b'\n').unwrap();
        (
            std::str::from_utf8(&response[..newline]).unwrap(),
            &response[newline + 1..],
        )
    }

    fn three_piece_file() -> Vec<u8> {
        (0..1_200_000u32).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_piece_boundaries() {
        let dir = tempdir().unwrap();
        let bytes = three_piece_file();
        fs::write(dir.path().join("F"), &bytes).await.unwrap();
        let addr = start_server(dir.path().to_path_buf()).await;

        let response = request_raw(addr, "GET_PIECE F 0").await;
        let (header, payload) = split_header(&response);
        assert_eq!(header, "PIECE_DATA 524288");
        assert_eq!(payload, &bytes[..524_288]);

        let response = request_raw(addr, "GET_PIECE F 2").await;
        let (header, payload) = split_header(&response);
        assert_eq!(header, "PIECE_DATA 151424");
        assert_eq!(payload, &bytes[1_048_576..]);

        let response = request_raw(addr, "GET_PIECE F 3").await;
        assert_eq!(response, b"PIECE_NOT_FOUND\n");
    }

    #[tokio::test]
    async fn test_unknown_file_and_malformed_requests() {
        let dir = tempdir().unwrap();
        let addr = start_server(dir.path().to_path_buf()).await;

        assert_eq!(
            request_raw(addr, "GET_PIECE missing.bin 0").await,
            b"PIECE_NOT_FOUND\n"
        );
        assert_eq!(request_raw(addr, "GET_PIECE only-two").await, b"INVALID_REQUEST\n");
        assert_eq!(request_raw(addr, "FETCH F 0").await, b"INVALID_REQUEST\n");
        assert_eq!(
            request_raw(addr, "GET_PIECE ../../etc/passwd 0").await,
            b"INVALID_REQUEST\n"
        );
    }

    #[tokio::test]
    async fn test_candidate_path_lookup() {
        let dir = tempdir().unwrap();
        let downloads = dir.path().join("downloads");
        fs::create_dir_all(&downloads).await.unwrap();
        fs::write(downloads.join("fetched.bin"), b"payload")
            .await
            .unwrap();
        let addr = start_server(dir.path().to_path_buf()).await;

        let response = request_raw(addr, "GET_PIECE fetched.bin 0").await;
        let (header, payload) = split_header(&response);
        assert_eq!(header, "PIECE_DATA 7");
        assert_eq!(payload, b"payload");
    }
}
