//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. Every section is `#[serde(default)]`
//! so partial JSON files are accepted; missing fields keep their default.

mod endpoint;
mod session;

pub use endpoint::*;
pub use session::*;

use serde::{Deserialize, Serialize};
use ucode_core::logging::LogFormat;

/// Root settings type for the ucode agent client.
///
/// ```json
/// {
///   "endpoint": { "wsUrl": "wss://agent.example.com/ws" },
///   "session": { "maxReconnects": 5 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UcodeSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Backend endpoints.
    pub endpoint: EndpointSettings,
    /// Connection lifecycle tuning.
    pub session: SessionSettings,
    /// Handshake defaults.
    pub agent: AgentSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for UcodeSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "ucode".to_string(),
            endpoint: EndpointSettings::default(),
            session: SessionSettings::default(),
            agent: AgentSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`) or an
    /// `EnvFilter` directive string.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}
