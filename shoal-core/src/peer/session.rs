//! User-level operations of a peer.
//!
//! `PeerSession` carries the login state and turns each user action into one
//! tracker round trip, plus the hashing work for uploads and the download
//! kickoff. The interactive surface on top of this (menus, prompts) lives
//! outside the core.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::downloader::{ActiveDownloads, DownloadInfo, DownloadOutcome, Downloader};
use super::tracker_client::TcpTrackerClient;
use super::PeerError;
use crate::config::ShoalConfig;
use crate::hashing;
use crate::wire::{parse_peer_list, TrackerRequest};

/// What an upload announced to the tracker.
#[derive(Debug, Clone)]
pub struct UploadSummary {
    pub filename: String,
    pub file_hash: String,
    pub piece_count: usize,
    pub file_size: u64,
}

/// One peer's session against the tracker network.
pub struct PeerSession {
    client: TcpTrackerClient,
    my_ip: String,
    my_port: u16,
    user_id: Option<String>,
    active_downloads: ActiveDownloads,
    config: ShoalConfig,
}

impl PeerSession {
    /// Creates a session for a peer serving at `my_ip:my_port`.
    pub fn new(client: TcpTrackerClient, my_ip: String, my_port: u16, config: ShoalConfig) -> Self {
        Self {
            client,
            my_ip,
            my_port,
            user_id: None,
            active_downloads: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// The logged-in user id, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn require_login(&self) -> Result<String, PeerError> {
        self.user_id.clone().ok_or(PeerError::NotLoggedIn)
    }

    /// Registers a new account. Does not log in.
    ///
    /// # Errors
    /// - `PeerError::TrackerRefused` - the tracker answered `ERROR:`
    /// - transport errors from the tracker round trip
    pub async fn create_user(&self, user: &str, password: &str) -> Result<(), PeerError> {
        let reply = self
            .client
            .request(&TrackerRequest::CreateUser {
                user: user.to_string(),
                password: password.to_string(),
            })
            .await?;
        expect_success(&reply)
    }

    /// Logs in, announcing this peer's serving endpoint.
    ///
    /// # Errors
    /// - `PeerError::TrackerRefused` - unknown user or wrong password
    pub async fn login(&mut self, user: &str, password: &str) -> Result<(), PeerError> {
        let reply = self
            .client
            .request(&TrackerRequest::Login {
                user: user.to_string(),
                password: password.to_string(),
                ip: self.my_ip.clone(),
                port: self.my_port,
            })
            .await?;
        expect_success(&reply)?;
        self.user_id = Some(user.to_string());
        Ok(())
    }

    /// Logs out and clears session-local state.
    ///
    /// # Errors
    /// - `PeerError::NotLoggedIn` - no session to end
    pub async fn logout(&mut self) -> Result<(), PeerError> {
        let user = self.require_login()?;
        let reply = self
            .client
            .request(&TrackerRequest::Logout { user })
            .await?;
        expect_success(&reply)?;

        self.user_id = None;
        self.active_downloads.write().await.clear();
        Ok(())
    }

    /// Creates a group owned by the logged-in user.
    ///
    /// # Errors
    /// - `PeerError::NotLoggedIn` / `PeerError::TrackerRefused`
    pub async fn create_group(&self, group: &str) -> Result<(), PeerError> {
        let user = self.require_login()?;
        let reply = self
            .client
            .request(&TrackerRequest::CreateGroup {
                user,
                group: group.to_string(),
            })
            .await?;
        expect_success(&reply)
    }

    /// Asks to join a group; the owner has to accept.
    ///
    /// # Errors
    /// - `PeerError::NotLoggedIn` / `PeerError::TrackerRefused`
    pub async fn join_group(&self, group: &str) -> Result<(), PeerError> {
        let user = self.require_login()?;
        let reply = self
            .client
            .request(&TrackerRequest::JoinGroup {
                user,
                group: group.to_string(),
            })
            .await?;
        expect_success(&reply)
    }

    /// Leaves a group.
    ///
    /// # Errors
    /// - `PeerError::NotLoggedIn` / `PeerError::TrackerRefused`
    pub async fn leave_group(&self, group: &str) -> Result<(), PeerError> {
        let user = self.require_login()?;
        let reply = self
            .client
            .request(&TrackerRequest::LeaveGroup {
                user,
                group: group.to_string(),
            })
            .await?;
        expect_success(&reply)
    }

    /// Lists all groups, as the tracker renders them.
    ///
    /// # Errors
    /// Transport errors from the tracker round trip.
    pub async fn list_groups(&self) -> Result<String, PeerError> {
        let reply = self.client.request(&TrackerRequest::ListGroups).await?;
        expect_payload(reply)
    }

    /// Lists pending join requests for a group this user owns.
    ///
    /// # Errors
    /// - `PeerError::NotLoggedIn` / `PeerError::TrackerRefused`
    pub async fn list_requests(&self, group: &str) -> Result<String, PeerError> {
        let user = self.require_login()?;
        let reply = self
            .client
            .request(&TrackerRequest::ListRequests {
                user,
                group: group.to_string(),
            })
            .await?;
        expect_payload(reply)
    }

    /// Accepts a pending join request.
    ///
    /// # Errors
    /// - `PeerError::NotLoggedIn` / `PeerError::TrackerRefused`
    pub async fn accept_request(&self, group: &str, user: &str) -> Result<(), PeerError> {
        let owner = self.require_login()?;
        let reply = self
            .client
            .request(&TrackerRequest::AcceptRequest {
                owner,
                group: group.to_string(),
                user: user.to_string(),
            })
            .await?;
        expect_success(&reply)
    }

    /// Lists files shared in a group.
    ///
    /// # Errors
    /// - `PeerError::NotLoggedIn` / `PeerError::TrackerRefused`
    pub async fn list_files(&self, group: &str) -> Result<String, PeerError> {
        let user = self.require_login()?;
        let reply = self
            .client
            .request(&TrackerRequest::ListFiles {
                user,
                group: group.to_string(),
            })
            .await?;
        expect_payload(reply)
    }

    /// Hashes a local file and announces it to the group.
    ///
    /// The whole-file SHA-1 and the 20-hex-char fragments of each 512 KiB
    /// piece digest go on the wire; the file itself stays where it is and is
    /// served from there.
    ///
    /// # Errors
    /// - `PeerError::InvalidSourceFile` - missing or empty file
    /// - `PeerError::NotLoggedIn` / `PeerError::TrackerRefused`
    pub async fn upload_file(&self, path: &Path, group: &str) -> Result<UploadSummary, PeerError> {
        let user = self.require_login()?;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|error| PeerError::InvalidSourceFile {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?;
        if metadata.len() == 0 {
            return Err(PeerError::InvalidSourceFile {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            });
        }
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| PeerError::InvalidSourceFile {
                path: path.to_path_buf(),
                reason: "no usable filename".to_string(),
            })?;

        let file_hash = hashing::file_digest(path).await?;
        let digests = hashing::piece_digests(path).await?;
        let blob = hashing::fragment_blob(&digests);
        tracing::info!(
            "announcing {filename}: {} bytes, {} pieces",
            metadata.len(),
            digests.len()
        );

        let reply = self
            .client
            .request(&TrackerRequest::UploadFile {
                user,
                group: group.to_string(),
                filename: filename.clone(),
                file_hash: file_hash.clone(),
                piece_hashes: blob,
                file_size: metadata.len(),
            })
            .await?;
        expect_success(&reply)?;

        Ok(UploadSummary {
            filename,
            file_hash,
            piece_count: digests.len(),
            file_size: metadata.len(),
        })
    }

    /// Withdraws this user from a file's seeder list.
    ///
    /// # Errors
    /// - `PeerError::NotLoggedIn` / `PeerError::TrackerRefused`
    pub async fn stop_share(&self, group: &str, filename: &str) -> Result<(), PeerError> {
        let user = self.require_login()?;
        let reply = self
            .client
            .request(&TrackerRequest::StopShare {
                user,
                group: group.to_string(),
                filename: filename.to_string(),
            })
            .await?;
        expect_success(&reply)
    }

    /// Starts downloading a file from the group's online seeders.
    ///
    /// The orchestrator runs on its own task so the caller is never blocked;
    /// the returned handle resolves to the download outcome. Progress is
    /// visible through [`PeerSession::downloads`] while it runs.
    ///
    /// # Errors
    /// - `PeerError::TrackerRefused` - not a member, unknown file, or no
    ///   online seeders
    /// - `PeerError::MalformedReply` - the tracker's peer list did not parse
    pub async fn download_file(
        &self,
        group: &str,
        filename: &str,
        dest_path: &Path,
    ) -> Result<JoinHandle<Result<DownloadOutcome, PeerError>>, PeerError> {
        let user = self.require_login()?;
        let reply = self
            .client
            .request(&TrackerRequest::DownloadFile {
                user,
                group: group.to_string(),
                filename: filename.to_string(),
            })
            .await?;
        if reply.starts_with("ERROR:") {
            return Err(PeerError::TrackerRefused {
                reply: reply.trim_end().to_string(),
            });
        }

        let peers = parse_peer_list(&reply).ok_or_else(|| PeerError::MalformedReply {
            reply: reply.trim_end().to_string(),
        })?;
        tracing::info!("{} seeder(s) advertised for {filename}", peers.len());

        let downloader = Downloader::new(
            filename.to_string(),
            dest_path.to_path_buf(),
            peers,
            self.active_downloads.clone(),
            self.config.network.probe_timeout,
            self.config.network.piece_timeout,
        );
        Ok(tokio::spawn(downloader.run()))
    }

    /// Snapshot of all downloads this session has started.
    pub async fn downloads(&self) -> Vec<DownloadInfo> {
        self.active_downloads.read().await.values().cloned().collect()
    }
}

fn expect_success(reply: &str) -> Result<(), PeerError> {
    if reply.starts_with("SUCCESS") {
        Ok(())
    } else {
        Err(PeerError::TrackerRefused {
            reply: reply.trim_end().to_string(),
        })
    }
}

fn expect_payload(reply: String) -> Result<String, PeerError> {
    if reply.starts_with("ERROR:") {
        Err(PeerError::TrackerRefused {
            reply: reply.trim_end().to_string(),
        })
    } else {
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::watch;

    use super::*;
    use crate::tracker::{spawn_catalog, TrackerService};

    async fn start_tracker() -> std::net::SocketAddr {
        let service = TrackerService::bind("127.0.0.1:0".parse().unwrap(), spawn_catalog())
            .await
            .unwrap();
        let addr = service.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            let _shutdown_tx = shutdown_tx;
            let _ = service.run(shutdown_rx).await;
        });
        addr
    }

    fn session(tracker: std::net::SocketAddr, port: u16) -> PeerSession {
        let config = ShoalConfig::for_testing();
        let client = TcpTrackerClient::new(vec![tracker], &config.network);
        PeerSession::new(client, "127.0.0.1".to_string(), port, config)
    }

    #[tokio::test]
    async fn test_session_requires_login() {
        let tracker = start_tracker().await;
        let session = session(tracker, 7001);

        let result = session.create_group("g1").await;
        assert!(matches!(result, Err(PeerError::NotLoggedIn)));
        assert!(session.user_id().is_none());
    }

    #[tokio::test]
    async fn test_login_flow() {
        let tracker = start_tracker().await;
        let mut session = session(tracker, 7001);

        session.create_user("alice", "pw").await.unwrap();

        let refused = session.login("alice", "wrong").await;
        assert!(matches!(refused, Err(PeerError::TrackerRefused { .. })));
        assert!(session.user_id().is_none());

        session.login("alice", "pw").await.unwrap();
        assert_eq!(session.user_id(), Some("alice"));

        session.logout().await.unwrap();
        assert!(session.user_id().is_none());
    }

    #[tokio::test]
    async fn test_group_and_listing_flow() {
        let tracker = start_tracker().await;
        let mut alice = session(tracker, 7001);
        let mut bob = session(tracker, 7002);

        alice.create_user("alice", "pw").await.unwrap();
        bob.create_user("bob", "pw").await.unwrap();
        alice.login("alice", "pw").await.unwrap();
        bob.login("bob", "pw").await.unwrap();

        alice.create_group("g1").await.unwrap();
        bob.join_group("g1").await.unwrap();
        assert_eq!(alice.list_requests("g1").await.unwrap(), "bob\n");
        alice.accept_request("g1", "bob").await.unwrap();

        assert_eq!(
            bob.list_groups().await.unwrap(),
            "g1 (Owner: alice, Members: 2)\n"
        );

        // Refusals surface as typed errors, not panics.
        let refused = bob.list_requests("g1").await;
        assert!(matches!(refused, Err(PeerError::TrackerRefused { .. })));
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_and_missing_files() {
        let tracker = start_tracker().await;
        let mut alice = session(tracker, 7001);
        alice.create_user("alice", "pw").await.unwrap();
        alice.login("alice", "pw").await.unwrap();
        alice.create_group("g1").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.bin");
        tokio::fs::write(&empty, b"").await.unwrap();

        let result = alice.upload_file(&empty, "g1").await;
        assert!(matches!(result, Err(PeerError::InvalidSourceFile { .. })));

        let result = alice.upload_file(&dir.path().join("missing.bin"), "g1").await;
        assert!(matches!(result, Err(PeerError::InvalidSourceFile { .. })));
    }
}
