//! Client-to-server frames.

use serde::Serialize;

/// Sent exactly once per connection, immediately after the transport opens.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Bearer token for the repository provider (empty when anonymous).
    pub token: String,
    /// Project / workspace identifier.
    pub project_id: String,
    /// Selected model provider (`anthropic`, `google`, ...).
    pub model_provider: String,
    /// Repository to clone into the agent workspace.
    pub repo_url: String,
    /// Deferred initial task; empty when none was recorded.
    pub task: String,
    /// Branch to clone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Command frames emitted after the handshake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Keep-alive, emitted only by the heartbeat timer.
    Ping,
    /// A user task or follow-up message.
    Action {
        /// Message text.
        content: String,
    },
}
