//! Tracker-info file handling.
//!
//! Plain text, one `ip:port` per non-empty line. Peers use every entry as a
//! failover candidate; a tracker process picks the line at its index and
//! keeps the remaining entries as siblings.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::fs;

/// Errors from reading or interpreting a tracker-info file.
#[derive(Debug, thiserror::Error)]
pub enum TrackerListError {
    #[error("failed to read tracker list {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid tracker entry `{line}`")]
    InvalidEntry { line: String },

    #[error("tracker list has no entries")]
    Empty,

    #[error("tracker index {index} out of range for {count} entries")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Parses tracker-info file contents into socket addresses.
///
/// Blank lines are skipped; surrounding whitespace is tolerated.
///
/// # Errors
/// - `TrackerListError::InvalidEntry` - a non-empty line is not `ip:port`
/// - `TrackerListError::Empty` - no usable entries
pub fn parse_tracker_list(contents: &str) -> Result<Vec<SocketAddr>, TrackerListError> {
    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let addr = line
            .parse()
            .map_err(|_| TrackerListError::InvalidEntry {
                line: line.to_string(),
            })?;
        entries.push(addr);
    }

    if entries.is_empty() {
        return Err(TrackerListError::Empty);
    }
    Ok(entries)
}

/// Reads and parses a tracker-info file.
///
/// # Errors
/// - `TrackerListError::Read` - the file cannot be read
/// - plus everything [`parse_tracker_list`] returns
pub async fn load_tracker_list(path: &Path) -> Result<Vec<SocketAddr>, TrackerListError> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|source| TrackerListError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_tracker_list(&contents)
}

/// Splits the entry list into (own endpoint, sibling endpoints) for the
/// tracker at `index`.
///
/// # Errors
/// - `TrackerListError::IndexOutOfRange` - `index` does not name an entry
pub fn select_tracker(
    entries: &[SocketAddr],
    index: usize,
) -> Result<(SocketAddr, Vec<SocketAddr>), TrackerListError> {
    if index >= entries.len() {
        return Err(TrackerListError::IndexOutOfRange {
            index,
            count: entries.len(),
        });
    }

    let own = entries[index];
    let siblings = entries
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, addr)| *addr)
        .collect();
    Ok((own, siblings))
}
