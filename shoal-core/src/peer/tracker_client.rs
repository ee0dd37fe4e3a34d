//! Client side of the tracker protocol.
//!
//! Every user-level operation is one short-lived connection: connect to the
//! first reachable tracker, send one newline-terminated command, read the
//! reply, close. Failed trackers are not blacklisted; the next operation
//! walks the same list again.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::PeerError;
use crate::config::NetworkConfig;
use crate::wire::TrackerRequest;

/// Failover client over a static tracker list.
#[derive(Debug, Clone)]
pub struct TcpTrackerClient {
    trackers: Vec<SocketAddr>,
    round_trip_timeout: Duration,
}

impl TcpTrackerClient {
    /// Creates a client over the configured tracker list.
    pub fn new(trackers: Vec<SocketAddr>, network: &NetworkConfig) -> Self {
        Self {
            trackers,
            round_trip_timeout: network.tracker_timeout,
        }
    }

    /// Sends one request to the first tracker that answers.
    ///
    /// Returns the raw reply text, which may span multiple lines for list
    /// queries. An `ERROR:` reply is still `Ok` here; callers decide what a
    /// refusal means for their operation.
    ///
    /// # Errors
    /// - `PeerError::NoTrackerReachable` - every tracker failed
    pub async fn request(&self, request: &TrackerRequest) -> Result<String, PeerError> {
        for &addr in &self.trackers {
            match self.round_trip(addr, request).await {
                Ok(reply) => return Ok(reply),
                Err(error) => {
                    tracing::debug!("tracker {addr} failed: {error}, trying next");
                }
            }
        }
        Err(PeerError::NoTrackerReachable)
    }

    async fn round_trip(
        &self,
        addr: SocketAddr,
        request: &TrackerRequest,
    ) -> Result<String, PeerError> {
        let mut stream = timeout(self.round_trip_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| PeerError::Timeout {
                operation: "connecting to tracker",
            })??;

        let line = format!("{}\n", request.to_line());
        timeout(self.round_trip_timeout, stream.write_all(line.as_bytes()))
            .await
            .map_err(|_| PeerError::Timeout {
                operation: "sending tracker command",
            })??;
        // Half-close tells the tracker we are done sending; its connection
        // task replies and then sees EOF, so read_to_end terminates.
        stream.shutdown().await?;

        let mut reply = Vec::new();
        timeout(self.round_trip_timeout, stream.read_to_end(&mut reply))
            .await
            .map_err(|_| PeerError::Timeout {
                operation: "reading tracker reply",
            })??;

        Ok(String::from_utf8_lossy(&reply).into_owned())
    }
}
