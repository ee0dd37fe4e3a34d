//! Centralized configuration for shoal.
//!
//! All tunable parameters live here so the protocol modules stay free of
//! scattered magic numbers. Environment variables override the defaults at
//! startup.

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for both the tracker and peer sides.
#[derive(Debug, Clone, Default)]
pub struct ShoalConfig {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
}

/// Timeouts for tracker round trips and peer transfers.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Connect/reply timeout for one tracker round trip
    pub tracker_timeout: Duration,
    /// Pre-download reachability probe timeout per peer
    pub probe_timeout: Duration,
    /// Send/recv timeout for one piece fetch
    pub piece_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tracker_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            piece_timeout: Duration::from_secs(10),
        }
    }
}

/// File lookup and buffering settings for the serving endpoint.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base directory the serving endpoint resolves its candidate paths
    /// against
    pub serve_base: PathBuf,
    /// Buffer size for streamed file reads
    pub read_buffer_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            serve_base: PathBuf::from("."),
            read_buffer_size: 65_536, // 64 KiB
        }
    }
}

impl ShoalConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// `SHOAL_TRACKER_TIMEOUT`, `SHOAL_PROBE_TIMEOUT` and
    /// `SHOAL_PIECE_TIMEOUT` are whole seconds; `SHOAL_SERVE_BASE` is a
    /// directory path. Unparseable values keep the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(timeout) = env_seconds("SHOAL_TRACKER_TIMEOUT") {
            config.network.tracker_timeout = timeout;
        }
        if let Some(timeout) = env_seconds("SHOAL_PROBE_TIMEOUT") {
            config.network.probe_timeout = timeout;
        }
        if let Some(timeout) = env_seconds("SHOAL_PIECE_TIMEOUT") {
            config.network.piece_timeout = timeout;
        }
        if let Ok(base) = std::env::var("SHOAL_SERVE_BASE") {
            config.storage.serve_base = PathBuf::from(base);
        }

        config
    }

    /// Creates a configuration with short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            network: NetworkConfig {
                tracker_timeout: Duration::from_secs(2),
                probe_timeout: Duration::from_secs(1),
                piece_timeout: Duration::from_secs(2),
            },
            ..Default::default()
        }
    }
}

fn env_seconds(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
