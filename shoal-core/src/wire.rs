//! Wire grammar shared by the tracker and peer protocols.
//!
//! Both protocols are line-oriented, space-separated ASCII. Stringly-typed
//! verbs exist only at this boundary; everything past parsing is a tagged
//! enum.

use std::fmt;
use std::net::SocketAddr;

/// Fixed piece size for the peer transfer protocol: 512 KiB.
pub const PIECE_SIZE: u64 = 524_288;

/// Reply line sent by a serving peer when a piece cannot be produced.
pub const PIECE_NOT_FOUND: &str = "PIECE_NOT_FOUND";

/// Reply line sent by a serving peer for a request it cannot parse.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

/// Prefix of the tracker's peer-list reply to `DOWNLOAD_FILE`.
pub const PEERS_PREFIX: &str = "PEERS:";

/// A parsed tracker command.
///
/// One variant per wire verb. `parse` accepts a single request line (no
/// trailing newline); `to_line` produces the same line back, so clients and
/// the connection service share one grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerRequest {
    CreateUser {
        user: String,
        password: String,
    },
    Login {
        user: String,
        password: String,
        ip: String,
        port: u16,
    },
    Logout {
        user: String,
    },
    CreateGroup {
        user: String,
        group: String,
    },
    JoinGroup {
        user: String,
        group: String,
    },
    LeaveGroup {
        user: String,
        group: String,
    },
    ListGroups,
    ListRequests {
        user: String,
        group: String,
    },
    AcceptRequest {
        owner: String,
        group: String,
        user: String,
    },
    ListFiles {
        user: String,
        group: String,
    },
    UploadFile {
        user: String,
        group: String,
        filename: String,
        file_hash: String,
        piece_hashes: String,
        file_size: u64,
    },
    DownloadFile {
        user: String,
        group: String,
        filename: String,
    },
    StopShare {
        user: String,
        group: String,
        filename: String,
    },
}

/// Why a request line failed to parse.
///
/// Each variant renders to the exact `ERROR:` reply the tracker puts on the
/// wire, so the connection service can answer without touching the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestParseError {
    #[error("ERROR: Empty command")]
    Empty,

    #[error("ERROR: Unknown command")]
    UnknownVerb,

    #[error("ERROR: Invalid {verb} command")]
    Malformed { verb: &'static str },

    #[error("ERROR: Invalid file size")]
    InvalidFileSize,
}

impl RequestParseError {
    /// Renders the reply line the tracker sends for this parse failure.
    pub fn to_reply(&self) -> String {
        format!("{self}\n")
    }
}

impl TrackerRequest {
    /// Parses one request line.
    ///
    /// Extra trailing tokens are ignored, matching the tolerance of the
    /// original protocol.
    ///
    /// # Errors
    /// - `RequestParseError::Empty` - blank line
    /// - `RequestParseError::UnknownVerb` - unrecognized first token
    /// - `RequestParseError::Malformed` - too few tokens or a bad number
    /// - `RequestParseError::InvalidFileSize` - non-numeric `UPLOAD_FILE` size
    pub fn parse(line: &str) -> Result<Self, RequestParseError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&verb) = tokens.first() else {
            return Err(RequestParseError::Empty);
        };

        let malformed = |verb| RequestParseError::Malformed { verb };
        let arg = |i: usize, verb| -> Result<String, RequestParseError> {
            tokens
                .get(i)
                .map(|t| (*t).to_string())
                .ok_or(malformed(verb))
        };

        match verb {
            "CREATE_USER" => Ok(TrackerRequest::CreateUser {
                user: arg(1, "CREATE_USER")?,
                password: arg(2, "CREATE_USER")?,
            }),
            "LOGIN" => Ok(TrackerRequest::Login {
                user: arg(1, "LOGIN")?,
                password: arg(2, "LOGIN")?,
                ip: arg(3, "LOGIN")?,
                port: arg(4, "LOGIN")?
                    .parse()
                    .map_err(|_| malformed("LOGIN"))?,
            }),
            "LOGOUT" => Ok(TrackerRequest::Logout {
                user: arg(1, "LOGOUT")?,
            }),
            "CREATE_GROUP" => Ok(TrackerRequest::CreateGroup {
                user: arg(1, "CREATE_GROUP")?,
                group: arg(2, "CREATE_GROUP")?,
            }),
            "JOIN_GROUP" => Ok(TrackerRequest::JoinGroup {
                user: arg(1, "JOIN_GROUP")?,
                group: arg(2, "JOIN_GROUP")?,
            }),
            "LEAVE_GROUP" => Ok(TrackerRequest::LeaveGroup {
                user: arg(1, "LEAVE_GROUP")?,
                group: arg(2, "LEAVE_GROUP")?,
            }),
            "LIST_GROUPS" => Ok(TrackerRequest::ListGroups),
            "LIST_REQUESTS" => Ok(TrackerRequest::ListRequests {
                user: arg(1, "LIST_REQUESTS")?,
                group: arg(2, "LIST_REQUESTS")?,
            }),
            "ACCEPT_REQUEST" => Ok(TrackerRequest::AcceptRequest {
                owner: arg(1, "ACCEPT_REQUEST")?,
                group: arg(2, "ACCEPT_REQUEST")?,
                user: arg(3, "ACCEPT_REQUEST")?,
            }),
            "LIST_FILES" => Ok(TrackerRequest::ListFiles {
                user: arg(1, "LIST_FILES")?,
                group: arg(2, "LIST_FILES")?,
            }),
            "UPLOAD_FILE" => Ok(TrackerRequest::UploadFile {
                user: arg(1, "UPLOAD_FILE")?,
                group: arg(2, "UPLOAD_FILE")?,
                filename: arg(3, "UPLOAD_FILE")?,
                file_hash: arg(4, "UPLOAD_FILE")?,
                piece_hashes: arg(5, "UPLOAD_FILE")?,
                file_size: arg(6, "UPLOAD_FILE")?
                    .parse()
                    .map_err(|_| RequestParseError::InvalidFileSize)?,
            }),
            "DOWNLOAD_FILE" => Ok(TrackerRequest::DownloadFile {
                user: arg(1, "DOWNLOAD_FILE")?,
                group: arg(2, "DOWNLOAD_FILE")?,
                filename: arg(3, "DOWNLOAD_FILE")?,
            }),
            "STOP_SHARE" => Ok(TrackerRequest::StopShare {
                user: arg(1, "STOP_SHARE")?,
                group: arg(2, "STOP_SHARE")?,
                filename: arg(3, "STOP_SHARE")?,
            }),
            _ => Err(RequestParseError::UnknownVerb),
        }
    }

    /// Renders the request back into its wire line, without the trailing
    /// newline.
    pub fn to_line(&self) -> String {
        match self {
            TrackerRequest::CreateUser { user, password } => {
                format!("CREATE_USER {user} {password}")
            }
            TrackerRequest::Login {
                user,
                password,
                ip,
                port,
            } => format!("LOGIN {user} {password} {ip} {port}"),
            TrackerRequest::Logout { user } => format!("LOGOUT {user}"),
            TrackerRequest::CreateGroup { user, group } => {
                format!("CREATE_GROUP {user} {group}")
            }
            TrackerRequest::JoinGroup { user, group } => format!("JOIN_GROUP {user} {group}"),
            TrackerRequest::LeaveGroup { user, group } => format!("LEAVE_GROUP {user} {group}"),
            TrackerRequest::ListGroups => "LIST_GROUPS".to_string(),
            TrackerRequest::ListRequests { user, group } => {
                format!("LIST_REQUESTS {user} {group}")
            }
            TrackerRequest::AcceptRequest { owner, group, user } => {
                format!("ACCEPT_REQUEST {owner} {group} {user}")
            }
            TrackerRequest::ListFiles { user, group } => format!("LIST_FILES {user} {group}"),
            TrackerRequest::UploadFile {
                user,
                group,
                filename,
                file_hash,
                piece_hashes,
                file_size,
            } => format!("UPLOAD_FILE {user} {group} {filename} {file_hash} {piece_hashes} {file_size}"),
            TrackerRequest::DownloadFile {
                user,
                group,
                filename,
            } => format!("DOWNLOAD_FILE {user} {group} {filename}"),
            TrackerRequest::StopShare {
                user,
                group,
                filename,
            } => format!("STOP_SHARE {user} {group} {filename}"),
        }
    }
}

/// One `ip port user` triple from a `PEERS:` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerContact {
    pub ip: String,
    pub port: u16,
    pub user_id: String,
}

impl PeerContact {
    /// Resolves the contact into a connectable socket address, if the
    /// tracker-reported ip parses.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.ip, self.port).parse().ok()
    }
}

impl fmt::Display for PeerContact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.user_id, self.ip, self.port)
    }
}

/// Parses the tracker's `PEERS: ip1 p1 user1 ip2 p2 user2 ...` reply line.
///
/// Returns `None` when the line does not carry the `PEERS:` prefix.
/// Incomplete trailing triples and unparseable ports are skipped rather
/// than failing the whole list.
pub fn parse_peer_list(line: &str) -> Option<Vec<PeerContact>> {
    let rest = line.trim_end().strip_prefix(PEERS_PREFIX)?;
    let tokens: Vec<&str> = rest.split_whitespace().collect();

    let mut contacts = Vec::with_capacity(tokens.len() / 3);
    for triple in tokens.chunks_exact(3) {
        let Ok(port) = triple[1].parse::<u16>() else {
            continue;
        };
        contacts.push(PeerContact {
            ip: triple[0].to_string(),
            port,
            user_id: triple[2].to_string(),
        });
    }
    Some(contacts)
}

/// A parsed `GET_PIECE` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceRequest {
    pub filename: String,
    pub index: u32,
}

impl PieceRequest {
    /// Parses one `GET_PIECE <filename> <piece_index>` line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        if tokens.next()? != "GET_PIECE" {
            return None;
        }
        let filename = tokens.next()?.to_string();
        let index = tokens.next()?.parse().ok()?;
        Some(Self { filename, index })
    }

    /// Renders the request line, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!("GET_PIECE {} {}", self.filename, self.index)
    }
}

/// The first line of a serving peer's reply to `GET_PIECE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceHeader {
    /// `PIECE_DATA <n>`: exactly `n` raw payload bytes follow.
    Data(usize),
    /// `PIECE_NOT_FOUND`: index out of range or the file is unavailable.
    NotFound,
    /// `INVALID_REQUEST`: the peer could not parse our request.
    Invalid,
}

impl PieceHeader {
    /// Parses a reply header line (without the trailing newline).
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end();
        if line == PIECE_NOT_FOUND {
            return Some(PieceHeader::NotFound);
        }
        if line == INVALID_REQUEST {
            return Some(PieceHeader::Invalid);
        }
        let n = line.strip_prefix("PIECE_DATA ")?.parse().ok()?;
        Some(PieceHeader::Data(n))
    }
}
