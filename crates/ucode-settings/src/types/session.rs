//! Connection lifecycle and handshake settings.

use serde::{Deserialize, Serialize};

/// Heartbeat and reconnect tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Keep-alive interval while the transport is open, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Reconnect budget after an abnormal close.
    pub max_reconnects: u32,
    /// Flat delay before each reconnect attempt, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Close codes that end the session without reconnecting.
    pub terminal_close_codes: Vec<u16>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 25_000,
            max_reconnects: 3,
            reconnect_delay_ms: 2_000,
            // normal closure, policy violation, missing task, provider rejected
            terminal_close_codes: vec![1000, 1008, 4001, 4002],
        }
    }
}

/// Values carried in the handshake frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    /// Project / workspace identifier. Empty falls back to the org id.
    pub project_id: String,
    /// Model provider (`anthropic`, `google`, `openai`, ...).
    pub model_provider: String,
    /// Repository to clone for the agent.
    pub repo_url: String,
    /// Branch to clone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            model_provider: "anthropic".to_string(),
            repo_url: String::new(),
            branch: None,
        }
    }
}
