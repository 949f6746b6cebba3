//! Backend endpoint settings.

use serde::{Deserialize, Serialize};

/// Where the agent backend lives.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointSettings {
    /// Persistent transport URL (`ws://` or `wss://`).
    pub ws_url: String,
    /// Base URL of the request/response side channel.
    pub api_base_url: String,
    /// Timeout for side-channel requests, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8000/ws".to_string(),
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}
