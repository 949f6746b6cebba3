//! # ucode-core
//!
//! Foundation types shared by the ucode agent session client.
//!
//! - **Branded IDs**: `SessionId`, `MessageId`, `LogEntryId` as newtypes
//! - **Model**: the projections the session client publishes (chat transcript,
//!   terminal log, file tree, active file, session status)
//! - **Protocol**: the inbound event sum type and the outbound frames
//! - **Errors**: `ClientError` via `thiserror`
//! - **Logging**: `tracing` subscriber bootstrap and test capture utilities
//! - **Identity**: the identity-provider collaborator contract

#![deny(unsafe_code)]

pub mod errors;
pub mod identity;
pub mod ids;
pub mod logging;
pub mod model;
pub mod protocol;

pub use errors::{ClientError, Result};
pub use ids::{LogEntryId, MessageId, SessionId};
pub use model::{
    ActiveFile, ChatMessage, ConnectionStatus, FileNode, FileTree, MessageKind, NodeKind, Session,
    SessionState, TerminalLogEntry,
};
