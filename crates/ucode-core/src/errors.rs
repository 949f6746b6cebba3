//! Error hierarchy for the session client.
//!
//! [`ClientError`] covers the transport, the HTTP side channel and URL
//! handling. None of these cross the `AgentSession` public boundary: the
//! session driver converts every failure into state (status, error string,
//! terminal log lines) for the UI to render.

use thiserror::Error;

/// Errors raised inside the session client and its collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The persistent transport could not be opened or failed mid-stream.
    #[error("transport error: {context}")]
    Transport {
        /// What went wrong.
        context: String,
    },

    /// A side-channel HTTP call returned a non-success status.
    #[error("HTTP {status}: {detail}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Human-readable detail from the response body.
        detail: String,
    },

    /// A side-channel call was attempted before the backend assigned a session ID.
    #[error("no active agent session")]
    NoSession,

    /// A configured endpoint is not a valid URL.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it failed to parse.
        reason: String,
    },

    /// Failed to encode or decode JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The HTTP request itself failed (connect, timeout, body read).
    #[error("request failed: {0}")]
    Request(String),
}

impl ClientError {
    /// Build a transport error from any displayable cause.
    pub fn transport(context: impl std::fmt::Display) -> Self {
        Self::Transport {
            context: context.to_string(),
        }
    }

    /// Short human-readable description suitable for inline placeholders.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { detail, .. } => detail.clone(),
            Self::NoSession => "No active agent session".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
