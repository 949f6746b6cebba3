//! Persistent duplex transport seam.
//!
//! The session driver never touches a socket directly. It asks a
//! [`Connector`] for a [`TransportLink`]: a pair of channels carrying
//! outbound commands in and [`TransportEvent`]s out. Every link reports
//! exactly one [`TransportEvent::Closed`], always as its last event.

mod ws;

use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::mpsc;
use ucode_core::{ClientError, Result};

pub use ws::WsConnector;

/// Command sent to an open link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// A text frame.
    Text(String),
    /// Close the link with the given code.
    Close(u16),
}

/// Something that happened on an open link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// An inbound text frame (binary frames arrive here decoded as UTF-8).
    Text(String),
    /// A transport error. The close that follows drives any state change.
    Error(String),
    /// The link is gone. `code` is `None` when it ended without a close frame.
    Closed {
        /// Close code, if the peer or the client sent one.
        code: Option<u16>,
        /// Close reason or failure description.
        reason: String,
    },
}

/// Channels of one open connection.
#[derive(Debug)]
pub struct TransportLink {
    /// Commands to the connection.
    pub outgoing: mpsc::Sender<Outbound>,
    /// Events from the connection, ending with one `Closed`.
    pub incoming: mpsc::Receiver<TransportEvent>,
}

/// Opens transport links.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a link to `url`. Resolves once the connection is established.
    async fn connect(&self, url: &str) -> Result<TransportLink>;
}

/// Endpoint URL with the auth token, when present, as a `token` query parameter.
pub fn connection_url(base: &str, token: Option<&str>) -> Result<String> {
    let mut url = Url::parse(base).map_err(|e| ClientError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    match token.filter(|t| !t.is_empty()) {
        Some(token) => {
            let _ = url.query_pairs_mut().append_pair("token", token);
            Ok(url.into())
        }
        None => Ok(base.to_string()),
    }
}
