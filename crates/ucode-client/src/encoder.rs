//! Outbound command encoding.

use ucode_core::protocol::{ClientFrame, Handshake};
use ucode_core::Result;

/// Serialize the per-connection handshake.
pub fn encode_handshake(handshake: &Handshake) -> Result<String> {
    Ok(serde_json::to_string(handshake)?)
}

/// Serialize a user task or message.
pub fn encode_action(content: &str) -> Result<String> {
    Ok(serde_json::to_string(&ClientFrame::Action {
        content: content.to_string(),
    })?)
}

/// Serialize a heartbeat ping.
pub fn encode_ping() -> Result<String> {
    Ok(serde_json::to_string(&ClientFrame::Ping)?)
}
