//! Structured logging with `tracing`.
//!
//! This module provides:
//! - [`LogFormat`] selecting human-readable or JSON output
//! - [`init_subscriber`] for setting up the global `tracing` subscriber
//! - [`capture_logs`] for asserting on emitted events in tests
//!
//! Log output always goes to stderr so that stdout stays free for whatever
//! the embedding front end renders.

pub mod test_utils;

use serde::{Deserialize, Serialize};

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Output format of the stderr log layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human-readable records.
    #[default]
    Compact,
    /// One JSON object per record.
    Json,
}

impl LogFormat {
    /// Parse a format name, case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" | "pretty" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
///
/// * `level` - Minimum log level to display. Defaults to `"warn"` upstream.
/// * `format` - Compact text or JSON lines.
pub fn init_subscriber(level: &str, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // try_init is a no-op if a global subscriber is already set
    match format {
        LogFormat::Compact => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact()
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .json()
                .try_init();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
