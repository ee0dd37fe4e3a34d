//! SHA-1 content hashing for upload announcements.
//!
//! Two digests are produced at upload time: one over the whole file and one
//! per 512 KiB piece window. Only the leading 20 hex characters of each
//! piece digest travel on the wire; nothing is re-verified on download.

use std::io;
use std::path::Path;

use sha1::{Digest, Sha1};
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::wire::PIECE_SIZE;

/// Hex characters of a piece digest that survive into the upload blob.
pub const FRAGMENT_LEN: usize = 20;

const READ_BUFFER_SIZE: usize = 65_536;

/// Computes the lowercase hex SHA-1 of the whole file, streamed in 64 KiB
/// reads.
///
/// # Errors
/// Any I/O error from opening or reading the file.
pub async fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(to_hex(&hasher.finalize()))
}

/// Computes one lowercase hex SHA-1 per 512 KiB window of the file.
///
/// Windows start at offsets `0, PIECE_SIZE, 2 * PIECE_SIZE, ...`; the last
/// window is shorter when the file size is not a multiple. An empty file
/// yields no digests.
///
/// # Errors
/// Any I/O error from opening or reading the file.
pub async fn piece_digests(path: &Path) -> io::Result<Vec<String>> {
    let mut file = fs::File::open(path).await?;
    let mut digests = Vec::new();
    let mut window = vec![0u8; PIECE_SIZE as usize];

    loop {
        let filled = fill_window(&mut file, &mut window).await?;
        if filled == 0 {
            break;
        }

        let mut hasher = Sha1::new();
        hasher.update(&window[..filled]);
        digests.push(to_hex(&hasher.finalize()));

        if filled < window.len() {
            break;
        }
    }

    Ok(digests)
}

/// Concatenates the first [`FRAGMENT_LEN`] hex characters of each piece
/// digest into the `UPLOAD_FILE` blob argument.
pub fn fragment_blob(digests: &[String]) -> String {
    digests
        .iter()
        .map(|digest| &digest[..digest.len().min(FRAGMENT_LEN)])
        .collect()
}

/// Reads until the window is full or the file ends; returns bytes filled.
async fn fill_window(file: &mut fs::File, window: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < window.len() {
        let read = file.read(&mut window[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

fn to_hex(digest: &[u8]) -> String {
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
