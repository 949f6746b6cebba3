//! Routes inbound frames into the session projections.
//!
//! Dispatch is a pure state transition: one frame in, the projections
//! updated in place, a [`DispatchOutcome`] describing what happened. It
//! never fails. Unparseable text becomes terminal output and unknown
//! frames are echoed to the terminal instead of being dropped.

use ucode_core::protocol::{
    AgentEventPayload, ErrorPayload, FileChangePayload, InboundFrame, LogPayload, ServerEvent, StatusPayload,
    decode_frame,
};
use ucode_core::{ConnectionStatus, FileTree, MessageKind, SessionId, SessionState};

/// Fallback chat line for a readiness status without a message.
const READY_MESSAGE: &str = "Agent is ready.";

/// What a dispatched frame did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Frame label for logging (`log`, `status`, `raw`, ...).
    pub frame: &'static str,
    /// Connection status the frame moved the session to.
    pub status: Option<ConnectionStatus>,
    /// Correlation id adopted from the frame.
    pub session_id: Option<SessionId>,
}

impl DispatchOutcome {
    fn frame(frame: &'static str) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }
}

/// Apply one inbound text frame to `state`.
pub fn dispatch(state: &mut SessionState, text: &str) -> DispatchOutcome {
    match decode_frame(text) {
        InboundFrame::Event(event) => apply_event(state, event),
        InboundFrame::Unrecognized(value) => {
            state.push_terminal(value.to_string());
            DispatchOutcome::frame("unrecognized")
        }
        InboundFrame::Raw(raw) => {
            state.push_terminal(raw);
            DispatchOutcome::frame("raw")
        }
    }
}

/// Replace the file tree wholesale and log a summary.
pub fn apply_tree(state: &mut SessionState, tree: FileTree) {
    let count = tree.item_count();
    state.file_tree = tree;
    state.push_terminal(format!("File tree updated ({count} items)"));
}

fn apply_event(state: &mut SessionState, event: ServerEvent) -> DispatchOutcome {
    match event {
        ServerEvent::Log(payload) => {
            on_log(state, payload);
            DispatchOutcome::frame("log")
        }
        ServerEvent::Message { content } => {
            state.push_chat(MessageKind::Agent, content);
            DispatchOutcome::frame("message")
        }
        ServerEvent::FileTree { tree } => {
            apply_tree(state, tree);
            DispatchOutcome::frame("file_tree")
        }
        ServerEvent::FileChange(payload) => {
            on_file_change(state, payload);
            DispatchOutcome::frame("file_change")
        }
        ServerEvent::AgentEvent(payload) => {
            on_agent_event(state, payload);
            DispatchOutcome::frame("agent_event")
        }
        ServerEvent::Status(payload) => on_status(state, payload),
        ServerEvent::Complete { message } => {
            let line = if message.is_empty() {
                "Task completed".to_string()
            } else {
                format!("Task completed: {message}")
            };
            state.push_chat(MessageKind::System, line.clone());
            state.push_terminal(line);
            DispatchOutcome::frame("complete")
        }
        ServerEvent::Error(ErrorPayload { message }) => {
            let message = if message.is_empty() {
                "Unknown error".to_string()
            } else {
                message
            };
            state.session.status = ConnectionStatus::Error;
            state.push_chat(MessageKind::System, format!("Error: {message}"));
            state.push_terminal(format!("Error: {message}"));
            state.error = Some(message);
            DispatchOutcome {
                frame: "error",
                status: Some(ConnectionStatus::Error),
                session_id: None,
            }
        }
        ServerEvent::Pong {} => DispatchOutcome::frame("pong"),
    }
}

fn on_log(state: &mut SessionState, payload: LogPayload) {
    let to_chat = payload.is_agent_message();
    if to_chat {
        state.push_chat(MessageKind::Agent, payload.content.clone());
    }
    state.push_terminal(payload.content);
}

fn on_file_change(state: &mut SessionState, payload: FileChangePayload) {
    if let Some(files) = payload.files {
        let count = files.len();
        state.replace_files(files);
        state.push_terminal(format!("File list updated ({count} files)"));
    } else if let Some(path) = payload.path {
        let _ = state.insert_file(&path);
        state.push_terminal(format!("File changed: {path}"));
    } else {
        state.push_terminal("File change reported");
    }
}

fn on_agent_event(state: &mut SessionState, payload: AgentEventPayload) {
    if payload.kind().is_chat() {
        let text = if payload.content.is_empty() {
            payload.thought.clone().unwrap_or_default()
        } else {
            payload.content.clone()
        };
        if !text.is_empty() {
            state.push_chat(MessageKind::Agent, text);
        }
    }
    if let Some(command) = &payload.command {
        state.push_terminal(format!("$ {command}"));
    }
    if !payload.content.is_empty() {
        state.push_terminal(payload.content);
    }
    if let Some(files) = payload.files {
        state.replace_files(files);
    }
}

fn on_status(state: &mut SessionState, payload: StatusPayload) -> DispatchOutcome {
    let line = match (payload.status.is_empty(), payload.message.is_empty()) {
        (false, false) => format!("[{}] {}", payload.status, payload.message),
        (false, true) => format!("[{}]", payload.status),
        (true, _) => payload.message.clone(),
    };
    if !line.is_empty() {
        state.push_terminal(line);
    }

    let mut outcome = DispatchOutcome::frame("status");
    if let Some(id) = payload.session_id.as_deref() {
        let id = SessionId::from(id);
        state.session.session_id = Some(id.clone());
        outcome.session_id = Some(id);
    }
    if payload.is_ready() {
        state.session.status = ConnectionStatus::Connected;
        let text = if payload.message.is_empty() {
            READY_MESSAGE.to_string()
        } else {
            payload.message
        };
        state.push_chat(MessageKind::System, text);
        outcome.status = Some(ConnectionStatus::Connected);
    }
    outcome
}
