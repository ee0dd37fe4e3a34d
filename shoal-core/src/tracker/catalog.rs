//! In-memory catalog: users, groups, and the file/seeder index.
//!
//! The catalog is plain state owned by the authority actor; every request
//! maps to exactly one reply string, newline-terminated, and failed requests
//! never mutate anything. Ordered maps keep listings and ownership transfer
//! deterministic.

use std::collections::{BTreeMap, BTreeSet};

use crate::hashing::FRAGMENT_LEN;
use crate::wire::TrackerRequest;

/// A registered account and its current session.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: String,
    pub password: String,
    /// Endpoint announced at login; meaningful only while `online`.
    pub endpoint: Option<SessionEndpoint>,
    pub online: bool,
    pub groups: BTreeSet<String>,
}

/// Where a logged-in user's serving endpoint listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndpoint {
    pub ip: String,
    pub port: u16,
}

/// A named membership set with an owner who approves joins.
#[derive(Debug, Clone)]
pub struct Group {
    pub group_id: String,
    pub owner: String,
    pub members: BTreeSet<String>,
    pub pending_requests: BTreeSet<String>,
    /// filename -> seeders, in announcement order.
    pub shared_files: BTreeMap<String, Vec<String>>,
}

/// Upload metadata keyed by whole-file SHA-1.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub filename: String,
    pub file_hash: String,
    pub piece_hashes: Vec<String>,
    pub file_size: u64,
    pub owner: String,
    pub group_id: String,
}

/// The tracker's entire in-memory state.
///
/// Lives for the run lifetime of the tracker process; there is no
/// persistence.
#[derive(Debug, Default)]
pub struct Catalog {
    users: BTreeMap<String, User>,
    groups: BTreeMap<String, Group>,
    files: BTreeMap<String, FileEntry>,
}

fn ok(message: &str) -> String {
    format!("SUCCESS: {message}\n")
}

fn err(message: &str) -> String {
    format!("ERROR: {message}\n")
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one request and renders its reply.
    ///
    /// The reply is the full wire payload including the trailing newline;
    /// list queries may span multiple lines.
    pub fn execute(&mut self, request: TrackerRequest) -> String {
        match request {
            TrackerRequest::CreateUser { user, password } => self.create_user(user, password),
            TrackerRequest::Login {
                user,
                password,
                ip,
                port,
            } => self.login(user, password, ip, port),
            TrackerRequest::Logout { user } => self.logout(&user),
            TrackerRequest::CreateGroup { user, group } => self.create_group(&user, group),
            TrackerRequest::JoinGroup { user, group } => self.join_group(&user, &group),
            TrackerRequest::LeaveGroup { user, group } => self.leave_group(&user, &group),
            TrackerRequest::ListGroups => self.list_groups(),
            TrackerRequest::ListRequests { user, group } => self.list_requests(&user, &group),
            TrackerRequest::AcceptRequest { owner, group, user } => {
                self.accept_request(&owner, &group, &user)
            }
            TrackerRequest::ListFiles { user, group } => self.list_files(&user, &group),
            TrackerRequest::UploadFile {
                user,
                group,
                filename,
                file_hash,
                piece_hashes,
                file_size,
            } => self.upload_file(&user, &group, filename, file_hash, &piece_hashes, file_size),
            TrackerRequest::DownloadFile {
                user,
                group,
                filename,
            } => self.download_file(&user, &group, &filename),
            TrackerRequest::StopShare {
                user,
                group,
                filename,
            } => self.stop_share(&user, &group, &filename),
        }
    }

    /// Counts for logging and monitoring.
    pub fn stats(&self) -> super::CatalogStats {
        super::CatalogStats {
            users: self.users.len(),
            online_users: self.users.values().filter(|u| u.online).count(),
            groups: self.groups.len(),
            files: self.files.len(),
        }
    }

    fn is_online(&self, user_id: &str) -> bool {
        self.users.get(user_id).is_some_and(|user| user.online)
    }

    fn create_user(&mut self, user_id: String, password: String) -> String {
        if self.users.contains_key(&user_id) {
            return err("User already exists");
        }

        tracing::info!("user created: {user_id}");
        self.users.insert(
            user_id.clone(),
            User {
                user_id,
                password,
                endpoint: None,
                online: false,
                groups: BTreeSet::new(),
            },
        );
        ok("User created")
    }

    fn login(&mut self, user_id: String, password: String, ip: String, port: u16) -> String {
        let Some(user) = self.users.get_mut(&user_id) else {
            return err("User not found");
        };
        if user.password != password {
            return err("Invalid password");
        }

        user.online = true;
        user.endpoint = Some(SessionEndpoint { ip, port });
        tracing::info!("user logged in: {user_id}");
        ok("Login successful")
    }

    fn logout(&mut self, user_id: &str) -> String {
        // Idempotent: logging out an unknown or offline user still succeeds.
        if let Some(user) = self.users.get_mut(user_id) {
            user.online = false;
            tracing::info!("user logged out: {user_id}");
        }
        ok("Logged out")
    }

    fn create_group(&mut self, user_id: &str, group_id: String) -> String {
        if !self.is_online(user_id) {
            return err("User not logged in");
        }
        if self.groups.contains_key(&group_id) {
            return err("Group already exists");
        }

        tracing::info!("group created: {group_id} by {user_id}");
        self.groups.insert(
            group_id.clone(),
            Group {
                group_id: group_id.clone(),
                owner: user_id.to_string(),
                members: BTreeSet::from([user_id.to_string()]),
                pending_requests: BTreeSet::new(),
                shared_files: BTreeMap::new(),
            },
        );
        if let Some(user) = self.users.get_mut(user_id) {
            user.groups.insert(group_id);
        }
        ok("Group created")
    }

    fn join_group(&mut self, user_id: &str, group_id: &str) -> String {
        if !self.is_online(user_id) {
            return err("User not logged in");
        }
        let Some(group) = self.groups.get_mut(group_id) else {
            return err("Group not found");
        };
        if group.members.contains(user_id) {
            return err("Already a member");
        }

        group.pending_requests.insert(user_id.to_string());
        ok("Join request sent")
    }

    fn leave_group(&mut self, user_id: &str, group_id: &str) -> String {
        if !self.is_online(user_id) {
            return err("User not logged in");
        }
        let Some(group) = self.groups.get_mut(group_id) else {
            return err("Group not found");
        };
        if !group.members.remove(user_id) {
            return err("Not a member");
        }

        if group.owner == user_id {
            // Deterministic transfer: smallest remaining member id.
            if let Some(next_owner) = group.members.iter().next() {
                tracing::info!(
                    "group {group_id} ownership: {user_id} -> {next_owner}"
                );
                group.owner = next_owner.clone();
            }
        }
        if let Some(user) = self.users.get_mut(user_id) {
            user.groups.remove(group_id);
        }
        ok("Left group")
    }

    fn list_groups(&self) -> String {
        if self.groups.is_empty() {
            return "No groups available\n".to_string();
        }

        self.groups
            .values()
            .map(|group| {
                format!(
                    "{} (Owner: {}, Members: {})\n",
                    group.group_id,
                    group.owner,
                    group.members.len()
                )
            })
            .collect()
    }

    fn list_requests(&self, user_id: &str, group_id: &str) -> String {
        if !self.is_online(user_id) {
            return err("User not logged in");
        }
        let Some(group) = self.groups.get(group_id) else {
            return err("Group not found");
        };
        if group.owner != user_id {
            return err("Not group owner");
        }

        if group.pending_requests.is_empty() {
            return "No pending requests\n".to_string();
        }
        group
            .pending_requests
            .iter()
            .map(|pending| format!("{pending}\n"))
            .collect()
    }

    fn accept_request(&mut self, owner_id: &str, group_id: &str, user_id: &str) -> String {
        if !self.is_online(owner_id) {
            return err("Owner not logged in");
        }
        let Some(group) = self.groups.get_mut(group_id) else {
            return err("Group not found");
        };
        if group.owner != owner_id {
            return err("Not group owner");
        }
        if !group.pending_requests.remove(user_id) {
            return err("No pending request from user");
        }

        group.members.insert(user_id.to_string());
        if let Some(user) = self.users.get_mut(user_id) {
            user.groups.insert(group_id.to_string());
        }
        tracing::info!("{user_id} joined group {group_id}");
        ok("Request accepted")
    }

    fn list_files(&self, user_id: &str, group_id: &str) -> String {
        if !self.is_online(user_id) {
            return err("User not logged in");
        }
        let Some(group) = self.groups.get(group_id) else {
            return err("Group not found");
        };
        if !group.members.contains(user_id) {
            return err("Not a group member");
        }

        if group.shared_files.is_empty() {
            return "No files shared in this group\n".to_string();
        }
        group
            .shared_files
            .iter()
            .map(|(filename, seeders)| {
                format!("{filename} (Shared by: {})\n", seeders.join(", "))
            })
            .collect()
    }

    fn upload_file(
        &mut self,
        user_id: &str,
        group_id: &str,
        filename: String,
        file_hash: String,
        piece_hash_blob: &str,
        file_size: u64,
    ) -> String {
        if !self.is_online(user_id) {
            return err("User not logged in");
        }
        let Some(group) = self.groups.get_mut(group_id) else {
            return err("Group not found");
        };
        if !group.members.contains(user_id) {
            return err("Not a group member");
        }

        let seeders = group.shared_files.entry(filename.clone()).or_default();
        if !seeders.iter().any(|seeder| seeder == user_id) {
            seeders.push(user_id.to_string());
        }

        let piece_hashes = parse_piece_hash_blob(piece_hash_blob);
        tracing::info!(
            "file registered: {filename} in {group_id} by {user_id} \
             ({file_size} bytes, {} piece hashes)",
            piece_hashes.len()
        );
        self.files.insert(
            file_hash.clone(),
            FileEntry {
                filename,
                file_hash,
                piece_hashes,
                file_size,
                owner: user_id.to_string(),
                group_id: group_id.to_string(),
            },
        );
        ok("File uploaded")
    }

    fn download_file(&self, user_id: &str, group_id: &str, filename: &str) -> String {
        if !self.is_online(user_id) {
            return err("User not logged in");
        }
        let Some(group) = self.groups.get(group_id) else {
            return err("Group not found");
        };
        if !group.members.contains(user_id) {
            return err("Not a group member");
        }
        let Some(seeders) = group.shared_files.get(filename) else {
            return err("File not found in group");
        };

        let contacts: Vec<String> = seeders
            .iter()
            .filter_map(|seeder| {
                let user = self.users.get(seeder)?;
                if !user.online {
                    return None;
                }
                let endpoint = user.endpoint.as_ref()?;
                Some(format!("{} {} {seeder}", endpoint.ip, endpoint.port))
            })
            .collect();

        if contacts.is_empty() {
            return err("No online peers available");
        }
        format!("PEERS: {}\n", contacts.join(" "))
    }

    fn stop_share(&mut self, user_id: &str, group_id: &str, filename: &str) -> String {
        if !self.is_online(user_id) {
            return err("User not logged in");
        }
        let Some(group) = self.groups.get_mut(group_id) else {
            return err("Group not found");
        };
        if !group.members.contains(user_id) {
            return err("Not a group member");
        }
        let Some(seeders) = group.shared_files.get_mut(filename) else {
            return err("File not found in group");
        };

        let before = seeders.len();
        seeders.retain(|seeder| seeder != user_id);
        if seeders.len() == before {
            return err("Not sharing this file");
        }
        if seeders.is_empty() {
            group.shared_files.remove(filename);
        }
        tracing::info!("{user_id} stopped sharing {filename} in {group_id}");
        ok("Stopped sharing file")
    }
}

/// Splits an `UPLOAD_FILE` piece-hash blob into per-piece fragments.
///
/// Accepts both on-wire formats: 20-hex-chars per piece and 8-hex-chars per
/// piece, plus a `TRUNCATED` sentinel marking a blob cut short by the
/// uploader (8-char fragments up to the sentinel). Blobs matching neither
/// stride fall back to 8-char chunking of whatever fits. The 8-char stride
/// wins when a length satisfies both.
fn parse_piece_hash_blob(blob: &str) -> Vec<String> {
    const SHORT_LEN: usize = 8;

    let chunk = |hashes: &str, stride: usize| -> Vec<String> {
        hashes
            .as_bytes()
            .chunks_exact(stride)
            .map(|piece| String::from_utf8_lossy(piece).into_owned())
            .collect()
    };

    if let Some(sentinel) = blob.find("TRUNCATED") {
        return chunk(&blob[..sentinel], SHORT_LEN);
    }

    if blob.len() % SHORT_LEN == 0 {
        chunk(blob, SHORT_LEN)
    } else if blob.len() % FRAGMENT_LEN == 0 {
        chunk(blob, FRAGMENT_LEN)
    } else {
        chunk(blob, SHORT_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::TrackerRequest as Req;

    fn catalog_with_online_users(users: &[&str]) -> Catalog {
        let mut catalog = Catalog::new();
        for (i, user) in users.iter().enumerate() {
            assert_eq!(
                catalog.execute(Req::CreateUser {
                    user: user.to_string(),
                    password: "pw".to_string(),
                }),
                "SUCCESS: User created\n"
            );
            assert_eq!(
                catalog.execute(Req::Login {
                    user: user.to_string(),
                    password: "pw".to_string(),
                    ip: "10.0.0.1".to_string(),
                    port: 7001 + i as u16,
                }),
                "SUCCESS: Login successful\n"
            );
        }
        catalog
    }

    fn upload(catalog: &mut Catalog, user: &str, group: &str, filename: &str) -> String {
        catalog.execute(Req::UploadFile {
            user: user.to_string(),
            group: group.to_string(),
            filename: filename.to_string(),
            file_hash: format!("hash-of-{filename}"),
            piece_hashes: "a".repeat(60),
            file_size: 1_200_000,
        })
    }

    #[test]
    fn test_registration_and_login() {
        let mut catalog = Catalog::new();

        assert_eq!(
            catalog.execute(Req::CreateUser {
                user: "alice".to_string(),
                password: "pw".to_string(),
            }),
            "SUCCESS: User created\n"
        );
        assert_eq!(
            catalog.execute(Req::CreateUser {
                user: "alice".to_string(),
                password: "other".to_string(),
            }),
            "ERROR: User already exists\n"
        );

        assert_eq!(
            catalog.execute(Req::Login {
                user: "alice".to_string(),
                password: "pw".to_string(),
                ip: "10.0.0.1".to_string(),
                port: 7001,
            }),
            "SUCCESS: Login successful\n"
        );
        assert_eq!(
            catalog.execute(Req::Login {
                user: "alice".to_string(),
                password: "wrong".to_string(),
                ip: "10.0.0.1".to_string(),
                port: 7001,
            }),
            "ERROR: Invalid password\n"
        );
        assert_eq!(
            catalog.execute(Req::Login {
                user: "nobody".to_string(),
                password: "pw".to_string(),
                ip: "10.0.0.1".to_string(),
                port: 7001,
            }),
            "ERROR: User not found\n"
        );
    }

    #[test]
    fn test_logout_is_idempotent() {
        let mut catalog = catalog_with_online_users(&["alice"]);

        assert_eq!(
            catalog.execute(Req::Logout {
                user: "alice".to_string()
            }),
            "SUCCESS: Logged out\n"
        );
        // Again, and for a user that never existed.
        assert_eq!(
            catalog.execute(Req::Logout {
                user: "alice".to_string()
            }),
            "SUCCESS: Logged out\n"
        );
        assert_eq!(
            catalog.execute(Req::Logout {
                user: "ghost".to_string()
            }),
            "SUCCESS: Logged out\n"
        );
    }

    #[test]
    fn test_commands_require_login() {
        let mut catalog = Catalog::new();
        catalog.execute(Req::CreateUser {
            user: "alice".to_string(),
            password: "pw".to_string(),
        });

        assert_eq!(
            catalog.execute(Req::CreateGroup {
                user: "alice".to_string(),
                group: "g1".to_string(),
            }),
            "ERROR: User not logged in\n"
        );
    }

    #[test]
    fn test_group_approval_flow() {
        let mut catalog = catalog_with_online_users(&["alice", "bob"]);

        assert_eq!(
            catalog.execute(Req::CreateGroup {
                user: "alice".to_string(),
                group: "g1".to_string(),
            }),
            "SUCCESS: Group created\n"
        );
        assert_eq!(
            catalog.execute(Req::JoinGroup {
                user: "bob".to_string(),
                group: "g1".to_string(),
            }),
            "SUCCESS: Join request sent\n"
        );

        // Only the owner may see or accept requests.
        assert_eq!(
            catalog.execute(Req::ListRequests {
                user: "bob".to_string(),
                group: "g1".to_string(),
            }),
            "ERROR: Not group owner\n"
        );
        assert_eq!(
            catalog.execute(Req::ListRequests {
                user: "alice".to_string(),
                group: "g1".to_string(),
            }),
            "bob\n"
        );

        assert_eq!(
            catalog.execute(Req::AcceptRequest {
                owner: "alice".to_string(),
                group: "g1".to_string(),
                user: "bob".to_string(),
            }),
            "SUCCESS: Request accepted\n"
        );
        assert_eq!(
            catalog.execute(Req::ListRequests {
                user: "alice".to_string(),
                group: "g1".to_string(),
            }),
            "No pending requests\n"
        );
        assert_eq!(
            catalog.execute(Req::AcceptRequest {
                owner: "alice".to_string(),
                group: "g1".to_string(),
                user: "bob".to_string(),
            }),
            "ERROR: No pending request from user\n"
        );

        // Members cannot re-request.
        assert_eq!(
            catalog.execute(Req::JoinGroup {
                user: "bob".to_string(),
                group: "g1".to_string(),
            }),
            "ERROR: Already a member\n"
        );
    }

    #[test]
    fn test_pending_and_members_stay_disjoint() {
        let mut catalog = catalog_with_online_users(&["alice", "bob", "carol"]);
        catalog.execute(Req::CreateGroup {
            user: "alice".to_string(),
            group: "g1".to_string(),
        });
        for user in ["bob", "carol"] {
            catalog.execute(Req::JoinGroup {
                user: user.to_string(),
                group: "g1".to_string(),
            });
        }
        catalog.execute(Req::AcceptRequest {
            owner: "alice".to_string(),
            group: "g1".to_string(),
            user: "bob".to_string(),
        });

        let group = catalog.groups.get("g1").unwrap();
        assert!(group.members.contains("bob"));
        assert!(!group.pending_requests.contains("bob"));
        assert!(group.pending_requests.contains("carol"));
        assert!(group.members.contains(&group.owner));
    }

    #[test]
    fn test_ownership_transfer_is_deterministic() {
        let mut catalog = catalog_with_online_users(&["alice", "bob", "zed"]);
        catalog.execute(Req::CreateGroup {
            user: "zed".to_string(),
            group: "g1".to_string(),
        });
        for user in ["alice", "bob"] {
            catalog.execute(Req::JoinGroup {
                user: user.to_string(),
                group: "g1".to_string(),
            });
            catalog.execute(Req::AcceptRequest {
                owner: "zed".to_string(),
                group: "g1".to_string(),
                user: user.to_string(),
            });
        }

        assert_eq!(
            catalog.execute(Req::LeaveGroup {
                user: "zed".to_string(),
                group: "g1".to_string(),
            }),
            "SUCCESS: Left group\n"
        );
        // Smallest remaining member id wins.
        assert_eq!(
            catalog.execute(Req::ListGroups),
            "g1 (Owner: alice, Members: 2)\n"
        );

        assert_eq!(
            catalog.execute(Req::LeaveGroup {
                user: "zed".to_string(),
                group: "g1".to_string(),
            }),
            "ERROR: Not a member\n"
        );
    }

    #[test]
    fn test_list_groups_empty() {
        let mut catalog = Catalog::new();
        assert_eq!(catalog.execute(Req::ListGroups), "No groups available\n");
    }

    #[test]
    fn test_upload_registers_file_and_seeder_once() {
        let mut catalog = catalog_with_online_users(&["alice", "bob"]);
        catalog.execute(Req::CreateGroup {
            user: "alice".to_string(),
            group: "g1".to_string(),
        });

        assert_eq!(upload(&mut catalog, "alice", "g1", "F"), "SUCCESS: File uploaded\n");
        // Re-announcing the same file must not duplicate the seeder.
        assert_eq!(upload(&mut catalog, "alice", "g1", "F"), "SUCCESS: File uploaded\n");

        assert_eq!(
            catalog.execute(Req::ListFiles {
                user: "alice".to_string(),
                group: "g1".to_string(),
            }),
            "F (Shared by: alice)\n"
        );

        // Non-members can neither upload nor list.
        assert_eq!(upload(&mut catalog, "bob", "g1", "F"), "ERROR: Not a group member\n");
        assert_eq!(
            catalog.execute(Req::ListFiles {
                user: "bob".to_string(),
                group: "g1".to_string(),
            }),
            "ERROR: Not a group member\n"
        );
    }

    #[test]
    fn test_download_lists_only_online_seeders() {
        let mut catalog = catalog_with_online_users(&["alice", "bob", "carol"]);
        catalog.execute(Req::CreateGroup {
            user: "alice".to_string(),
            group: "g1".to_string(),
        });
        for user in ["bob", "carol"] {
            catalog.execute(Req::JoinGroup {
                user: user.to_string(),
                group: "g1".to_string(),
            });
            catalog.execute(Req::AcceptRequest {
                owner: "alice".to_string(),
                group: "g1".to_string(),
                user: user.to_string(),
            });
        }
        upload(&mut catalog, "alice", "g1", "F");
        upload(&mut catalog, "carol", "g1", "F");

        assert_eq!(
            catalog.execute(Req::DownloadFile {
                user: "bob".to_string(),
                group: "g1".to_string(),
                filename: "F".to_string(),
            }),
            "PEERS: 10.0.0.1 7001 alice 10.0.0.1 7003 carol\n"
        );

        catalog.execute(Req::Logout {
            user: "alice".to_string(),
        });
        assert_eq!(
            catalog.execute(Req::DownloadFile {
                user: "bob".to_string(),
                group: "g1".to_string(),
                filename: "F".to_string(),
            }),
            "PEERS: 10.0.0.1 7003 carol\n"
        );

        catalog.execute(Req::Logout {
            user: "carol".to_string(),
        });
        assert_eq!(
            catalog.execute(Req::DownloadFile {
                user: "bob".to_string(),
                group: "g1".to_string(),
                filename: "F".to_string(),
            }),
            "ERROR: No online peers available\n"
        );

        assert_eq!(
            catalog.execute(Req::DownloadFile {
                user: "bob".to_string(),
                group: "g1".to_string(),
                filename: "missing".to_string(),
            }),
            "ERROR: File not found in group\n"
        );
    }

    #[test]
    fn test_stop_share_removes_seeder_then_file() {
        let mut catalog = catalog_with_online_users(&["alice", "bob"]);
        catalog.execute(Req::CreateGroup {
            user: "alice".to_string(),
            group: "g1".to_string(),
        });
        catalog.execute(Req::JoinGroup {
            user: "bob".to_string(),
            group: "g1".to_string(),
        });
        catalog.execute(Req::AcceptRequest {
            owner: "alice".to_string(),
            group: "g1".to_string(),
            user: "bob".to_string(),
        });
        upload(&mut catalog, "alice", "g1", "F");
        upload(&mut catalog, "bob", "g1", "F");

        assert_eq!(
            catalog.execute(Req::StopShare {
                user: "alice".to_string(),
                group: "g1".to_string(),
                filename: "F".to_string(),
            }),
            "SUCCESS: Stopped sharing file\n"
        );
        assert_eq!(
            catalog.execute(Req::ListFiles {
                user: "bob".to_string(),
                group: "g1".to_string(),
            }),
            "F (Shared by: bob)\n"
        );
        assert_eq!(
            catalog.execute(Req::StopShare {
                user: "alice".to_string(),
                group: "g1".to_string(),
                filename: "F".to_string(),
            }),
            "ERROR: Not sharing this file\n"
        );

        // Last seeder gone: the filename disappears from the group.
        catalog.execute(Req::StopShare {
            user: "bob".to_string(),
            group: "g1".to_string(),
            filename: "F".to_string(),
        });
        assert_eq!(
            catalog.execute(Req::ListFiles {
                user: "bob".to_string(),
                group: "g1".to_string(),
            }),
            "No files shared in this group\n"
        );
    }

    #[test]
    fn test_stats_counts() {
        let mut catalog = catalog_with_online_users(&["alice", "bob"]);
        catalog.execute(Req::CreateGroup {
            user: "alice".to_string(),
            group: "g1".to_string(),
        });
        upload(&mut catalog, "alice", "g1", "F");
        catalog.execute(Req::Logout {
            user: "bob".to_string(),
        });

        let stats = catalog.stats();
        assert_eq!(stats.users, 2);
        assert_eq!(stats.online_users, 1);
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.files, 1);
    }

    #[test]
    fn test_piece_hash_blob_formats() {
        // 20-char stride: 60 chars, not divisible by 8.
        let legacy = format!("{}{}{}", "a".repeat(20), "b".repeat(20), "c".repeat(20));
        let parsed = parse_piece_hash_blob(&legacy);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0], "a".repeat(20));

        // 8-char stride.
        let short = format!("{}{}", "1".repeat(8), "2".repeat(8));
        let parsed = parse_piece_hash_blob(&short);
        assert_eq!(parsed, vec!["1".repeat(8), "2".repeat(8)]);

        // 8-char stride wins when both formats divide the length (40 chars).
        let ambiguous = "d".repeat(40);
        assert_eq!(parse_piece_hash_blob(&ambiguous).len(), 5);

        // TRUNCATED sentinel: fragments before the marker, 8 chars each.
        let truncated = format!("{}TRUNCATED", "e".repeat(16));
        let parsed = parse_piece_hash_blob(&truncated);
        assert_eq!(parsed, vec!["e".repeat(8), "e".repeat(8)]);

        // Neither stride: flexible 8-char fallback keeps the full chunks.
        let odd = "f".repeat(19);
        assert_eq!(parse_piece_hash_blob(&odd).len(), 2);

        assert!(parse_piece_hash_blob("").is_empty());
    }
}
