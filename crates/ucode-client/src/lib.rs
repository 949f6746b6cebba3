//! # ucode-client
//!
//! Client-side session manager for the ucode agent backend.
//!
//! - [`session::AgentSession`]: the single-owner driver task behind
//!   `start`, `send_message`, `stop`, `select_file` and `refresh_file_tree`
//! - [`transport`]: the [`Connector`](transport::Connector) seam and its
//!   `tokio-tungstenite` implementation
//! - [`heartbeat`] and [`reconnect`]: keep-alive timer and bounded flat retry
//! - [`dispatcher`]: routes inbound frames into [`SessionState`](ucode_core::SessionState)
//! - [`encoder`]: handshake, action and ping frames
//! - [`files`]: request/response file side channel

#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod encoder;
pub mod files;
pub mod heartbeat;
pub mod reconnect;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use files::{FileService, HttpFileService};
pub use session::AgentSession;
pub use transport::{Connector, WsConnector};
