//! Server-pushed frames.

use serde::Deserialize;
use serde_json::Value;

use super::lenient;
use crate::model::FileTree;

/// Payload shared by `log` and `observation` frames.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPayload {
    /// Line text.
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: String,
    /// Coarse event category (`action`, `observation`, `message`, ...).
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub event: Option<String>,
    /// Backend event class name (e.g. `AgentMessageAction`).
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub event_type: Option<String>,
}

impl LogPayload {
    /// Whether the payload also signals an agent-facing chat message.
    #[must_use]
    pub fn is_agent_message(&self) -> bool {
        EventKind::classify(self.event_type.as_deref(), self.event.as_deref()) == EventKind::Message
    }
}

/// Payload of a `file_change` frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FileChangePayload {
    /// Full flat file list (replace).
    #[serde(default, deserialize_with = "lenient::opt_string_list")]
    pub files: Option<Vec<String>>,
    /// Single changed path (set-like insert).
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub path: Option<String>,
}

/// Payload of an `agent_event` frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEventPayload {
    /// Coarse event category (`action`, `observation`, `system`, ...).
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub event: Option<String>,
    /// Backend event class name (e.g. `CmdRunAction`).
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub event_type: Option<String>,
    /// Event text.
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: String,
    /// Shell command the agent ran.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub command: Option<String>,
    /// Agent reasoning attached to the action.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub thought: Option<String>,
    /// Workspace path the event touched.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub path: Option<String>,
    /// Embedded flat file list.
    #[serde(default, deserialize_with = "lenient::opt_string_list")]
    pub files: Option<Vec<String>>,
    /// Command exit code, when the event is a command observation.
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub exit_code: Option<i64>,
}

impl AgentEventPayload {
    /// Classified event kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::classify(self.event_type.as_deref(), self.event.as_deref())
    }
}

/// Payload of a `status` frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawStatus")]
pub struct StatusPayload {
    /// Backend status word (`initializing`, `ready`, `completed`, ...).
    pub status: String,
    /// Human-readable status message.
    pub message: String,
    /// Session correlation ID, when the backend assigns one.
    pub session_id: Option<String>,
}

/// Wire shape of a `status` frame. The correlation id arrives as
/// `sessionId` or `session_id`, sometimes both.
#[derive(Deserialize)]
struct RawStatus {
    #[serde(default, deserialize_with = "lenient::string")]
    status: String,
    #[serde(default, deserialize_with = "lenient::string")]
    message: String,
    #[serde(default, rename = "sessionId", deserialize_with = "lenient::opt_string")]
    session_id: Option<String>,
    #[serde(default, rename = "session_id", deserialize_with = "lenient::opt_string")]
    session_id_snake: Option<String>,
}

impl From<RawStatus> for StatusPayload {
    fn from(raw: RawStatus) -> Self {
        Self {
            status: raw.status,
            message: raw.message,
            session_id: raw.session_id.or(raw.session_id_snake),
        }
    }
}

impl StatusPayload {
    /// Whether the status announces a ready agent session.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "ready" | "mock_mode" | "connected"
        )
    }
}

/// Payload of an `error` frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawError")]
pub struct ErrorPayload {
    /// Error description: `message`, else `detail`, else `error`.
    pub message: String,
}

#[derive(Deserialize)]
struct RawError {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    message: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    detail: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    error: Option<String>,
}

impl From<RawError> for ErrorPayload {
    fn from(raw: RawError) -> Self {
        Self {
            message: raw.message.or(raw.detail).or(raw.error).unwrap_or_default(),
        }
    }
}

/// One decoded server event.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Terminal output (also `observation`).
    #[serde(alias = "observation")]
    Log(LogPayload),
    /// Agent chat message.
    Message {
        /// Message text.
        #[serde(default, deserialize_with = "lenient::string")]
        content: String,
    },
    /// Full workspace tree, replacing the previous one.
    FileTree {
        /// The new tree.
        #[serde(default)]
        tree: FileTree,
    },
    /// Legacy flat file list update.
    FileChange(FileChangePayload),
    /// Agent action/observation event.
    AgentEvent(AgentEventPayload),
    /// Lifecycle status.
    Status(StatusPayload),
    /// Task finished.
    Complete {
        /// Optional completion note.
        #[serde(default, deserialize_with = "lenient::string")]
        message: String,
    },
    /// Backend-reported error.
    Error(ErrorPayload),
    /// Heartbeat acknowledgement (also `ack`).
    #[serde(alias = "ack")]
    Pong {},
}

/// Result of decoding one inbound text frame.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundFrame {
    /// A known event.
    Event(ServerEvent),
    /// Valid JSON that is not a known event.
    Unrecognized(Value),
    /// Not JSON at all; opaque terminal output.
    Raw(String),
}

/// Decode a text frame. Never fails.
pub fn decode_frame(text: &str) -> InboundFrame {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return InboundFrame::Raw(text.to_string());
    };
    match ServerEvent::deserialize(&value) {
        Ok(event) => InboundFrame::Event(event),
        Err(_) => InboundFrame::Unrecognized(value),
    }
}

/// Classification of an embedded agent event kind string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Agent-to-user message.
    Message,
    /// Agent reasoning.
    Thinking,
    /// Anything else.
    Other,
}

impl EventKind {
    /// Classify using the detailed `eventType`, falling back to the coarse `event`.
    #[must_use]
    pub fn classify(event_type: Option<&str>, event: Option<&str>) -> Self {
        let Some(raw) = event_type.or(event) else {
            return Self::Other;
        };
        let lowered = raw.to_ascii_lowercase();
        if lowered.contains("message") {
            Self::Message
        } else if lowered.contains("think") {
            Self::Thinking
        } else {
            Self::Other
        }
    }

    /// Whether events of this kind belong in the chat transcript.
    #[must_use]
    pub fn is_chat(self) -> bool {
        matches!(self, Self::Message | Self::Thinking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn event(text: &str) -> ServerEvent {
        match decode_frame(text) {
            InboundFrame::Event(e) => e,
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn non_json_is_raw() {
        assert_eq!(
            decode_frame("npm WARN deprecated"),
            InboundFrame::Raw("npm WARN deprecated".into())
        );
    }

    #[test]
    fn unknown_type_is_unrecognized() {
        let frame = decode_frame(r#"{"type":"telemetry","cpu":3}"#);
        assert_matches!(frame, InboundFrame::Unrecognized(v) if v["cpu"] == 3);
    }

    #[test]
    fn missing_type_is_unrecognized() {
        assert_matches!(decode_frame(r#"{"content":"hi"}"#), InboundFrame::Unrecognized(_));
    }

    #[test]
    fn json_array_is_unrecognized() {
        assert_matches!(decode_frame("[1,2]"), InboundFrame::Unrecognized(_));
    }

    #[test]
    fn observation_aliases_log() {
        let e = event(r#"{"type":"observation","content":"done","eventType":"CmdOutputObservation"}"#);
        assert_matches!(e, ServerEvent::Log(p) if p.content == "done" && !p.is_agent_message());
    }

    #[test]
    fn log_with_message_event_is_agent_message() {
        let e = event(r#"{"type":"log","content":"hi","event":"message"}"#);
        assert_matches!(e, ServerEvent::Log(p) if p.is_agent_message());
    }

    #[test]
    fn log_without_content_is_empty() {
        let e = event(r#"{"type":"log"}"#);
        assert_eq!(e, ServerEvent::Log(LogPayload::default()));
    }

    #[test]
    fn agent_event_fields() {
        let e = event(
            r#"{"type":"agent_event","event":"action","eventType":"AgentMessageAction",
                "content":"Installing deps","command":"npm install","exitCode":0}"#,
        );
        let ServerEvent::AgentEvent(p) = e else {
            panic!("expected agent_event");
        };
        assert_eq!(p.kind(), EventKind::Message);
        assert_eq!(p.command.as_deref(), Some("npm install"));
        assert_eq!(p.exit_code, Some(0));
    }

    #[test]
    fn status_with_session_id() {
        let e = event(r#"{"type":"status","status":"ready","sessionId":"s1"}"#);
        assert_matches!(e, ServerEvent::Status(p) if p.is_ready() && p.session_id.as_deref() == Some("s1"));
    }

    #[test]
    fn mock_mode_counts_as_ready() {
        let p = StatusPayload {
            status: "mock_mode".into(),
            ..StatusPayload::default()
        };
        assert!(p.is_ready());
        let p = StatusPayload {
            status: "initializing".into(),
            ..StatusPayload::default()
        };
        assert!(!p.is_ready());
    }

    #[test]
    fn error_accepts_detail_alias() {
        let e = event(r#"{"type":"error","detail":"OOM"}"#);
        assert_eq!(e, ServerEvent::Error(ErrorPayload { message: "OOM".into() }));
    }

    #[test]
    fn error_prefers_message_over_detail_and_error() {
        let e = event(r#"{"type":"error","message":"OOM","detail":"killed by kernel","error":"x"}"#);
        assert_eq!(e, ServerEvent::Error(ErrorPayload { message: "OOM".into() }));
        let e = event(r#"{"type":"error","error":"boom","detail":null}"#);
        assert_eq!(e, ServerEvent::Error(ErrorPayload { message: "boom".into() }));
    }

    #[test]
    fn status_with_both_session_id_spellings() {
        let e = event(r#"{"type":"status","status":"ready","sessionId":"s1","session_id":"s0"}"#);
        assert_matches!(e, ServerEvent::Status(p) if p.session_id.as_deref() == Some("s1"));
        let e = event(r#"{"type":"status","status":"ready","session_id":"s2"}"#);
        assert_matches!(e, ServerEvent::Status(p) if p.session_id.as_deref() == Some("s2"));
    }

    #[test]
    fn ack_and_pong_are_heartbeats() {
        assert_eq!(event(r#"{"type":"pong"}"#), ServerEvent::Pong {});
        assert_eq!(event(r#"{"type":"ack","timestamp":"now"}"#), ServerEvent::Pong {});
    }

    #[test]
    fn file_tree_without_tree_is_empty() {
        let e = event(r#"{"type":"file_tree"}"#);
        assert_matches!(e, ServerEvent::FileTree { tree } if tree.is_empty());
    }

    #[test]
    fn file_tree_with_malformed_tree_is_unrecognized() {
        assert_matches!(
            decode_frame(r#"{"type":"file_tree","tree":"nope"}"#),
            InboundFrame::Unrecognized(_)
        );
    }

    proptest::proptest! {
        #[test]
        fn decode_never_panics(text in ".{0,200}") {
            let _ = decode_frame(&text);
        }

        #[test]
        fn log_content_survives_any_scalar(n in proptest::num::i64::ANY) {
            let e = event(&format!(r#"{{"type":"log","content":{n}}}"#));
            proptest::prop_assert_eq!(e, ServerEvent::Log(LogPayload {
                content: n.to_string(),
                ..LogPayload::default()
            }));
        }
    }

    #[test]
    fn classify_prefers_event_type() {
        assert_eq!(EventKind::classify(Some("ThinkAction"), Some("message")), EventKind::Thinking);
        assert_eq!(EventKind::classify(None, Some("message")), EventKind::Message);
        assert_eq!(EventKind::classify(Some("CmdRunAction"), None), EventKind::Other);
        assert_eq!(EventKind::classify(None, None), EventKind::Other);
    }
}
