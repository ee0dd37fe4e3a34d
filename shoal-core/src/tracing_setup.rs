//! Tracing setup for shoal processes.
//!
//! Console output at a user-chosen level, plus an optional full-debug log
//! file so transfer failures can be diagnosed after the fact without rerunning
//! at trace verbosity.

use std::fs::File;
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Initializes tracing with a console layer and, when `log_file` is given,
/// a trace-level file layer.
///
/// The console level comes from `RUST_LOG` when set, otherwise from
/// `console_level`.
///
/// # Errors
/// Returns an error when the log file cannot be created.
pub fn init_tracing(
    console_level: Level,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));
    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            let layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
                .with_filter(EnvFilter::new("trace"));
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// Console log levels exposed on the command line.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug and above
    Debug,
    /// Everything, including per-piece tracing
    Trace,
}

impl CliLogLevel {
    /// Converts the CLI level to the corresponding `tracing::Level`.
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CliLogLevel::Error => "error",
            CliLogLevel::Warn => "warn",
            CliLogLevel::Info => "info",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Trace => "trace",
        };
        write!(f, "{name}")
    }
}
