//! Runtime configuration of one agent session.

use std::time::Duration;

use ucode_core::identity::{Identity, resolve_project_id};
use ucode_core::protocol::Handshake;
use ucode_settings::UcodeSettings;

use crate::reconnect::ReconnectPolicy;

/// Everything a session needs to connect, handshake and recover.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Persistent transport endpoint.
    pub ws_url: String,
    /// Base URL of the file side channel.
    pub api_base_url: String,
    /// Bearer token, appended to the transport URL and sent in the handshake.
    pub token: Option<String>,
    /// Project / workspace identifier.
    pub project_id: String,
    /// Model provider identifier.
    pub model_provider: String,
    /// Repository to clone.
    pub repo_url: String,
    /// Branch to clone.
    pub branch: Option<String>,
    /// Keep-alive interval while connected.
    pub heartbeat_interval: Duration,
    /// Timeout for side-channel requests.
    pub request_timeout: Duration,
    /// Reconnect behaviour after a close.
    pub reconnect: ReconnectPolicy,
}

impl SessionConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &UcodeSettings, token: Option<String>) -> Self {
        Self {
            ws_url: settings.endpoint.ws_url.clone(),
            api_base_url: settings.endpoint.api_base_url.clone(),
            token: token.filter(|t| !t.is_empty()),
            project_id: settings.agent.project_id.clone(),
            model_provider: settings.agent.model_provider.clone(),
            repo_url: settings.agent.repo_url.clone(),
            branch: settings.agent.branch.clone(),
            heartbeat_interval: Duration::from_millis(settings.session.heartbeat_interval_ms),
            request_timeout: Duration::from_millis(settings.endpoint.request_timeout_ms),
            reconnect: ReconnectPolicy {
                max_attempts: settings.session.max_reconnects,
                delay: Duration::from_millis(settings.session.reconnect_delay_ms),
                terminal_close_codes: settings.session.terminal_close_codes.clone(),
            },
        }
    }

    /// Fill an empty project id from the signed-in actor's org.
    #[must_use]
    pub fn with_identity(mut self, identity: &Identity) -> Self {
        self.project_id = resolve_project_id(&self.project_id, Some(identity));
        self
    }

    /// Handshake frame for a connection carrying `task`.
    pub fn handshake(&self, task: &str) -> Handshake {
        Handshake {
            token: self.token.clone().unwrap_or_default(),
            project_id: self.project_id.clone(),
            model_provider: self.model_provider.clone(),
            repo_url: self.repo_url.clone(),
            task: task.to_string(),
            branch: self.branch.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&UcodeSettings::default(), None)
    }
}
