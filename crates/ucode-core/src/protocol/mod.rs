//! Wire protocol between the session client and the agent backend.
//!
//! Inbound frames are JSON objects discriminated by `type` and decode into
//! the [`ServerEvent`] sum type; anything else degrades to
//! [`InboundFrame::Unrecognized`] or [`InboundFrame::Raw`] rather than failing.
//! Outbound traffic is the one-shot [`Handshake`] plus [`ClientFrame`]s.

mod inbound;
pub mod lenient;
mod outbound;

pub use inbound::{
    AgentEventPayload, ErrorPayload, EventKind, FileChangePayload, InboundFrame, LogPayload, ServerEvent,
    StatusPayload, decode_frame,
};
pub use outbound::{ClientFrame, Handshake};
