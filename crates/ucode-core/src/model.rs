//! Session data model and the read-only projections published to the UI.
//!
//! All entities are owned by the session client. The UI only ever sees
//! clones of [`SessionState`]; the chat transcript and terminal log are
//! append-only and keep insertion order as display order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ids::{LogEntryId, MessageId, SessionId};

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Connection status as observed by the UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No transport, nothing pending.
    #[default]
    Idle,
    /// A transport is being opened (first attempt or reconnect).
    Connecting,
    /// The transport is open.
    Connected,
    /// Terminal failure; the user must start a new session.
    Error,
}

impl ConnectionStatus {
    /// Lowercase wire/display name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ephemeral client-held session record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Current connection status.
    pub status: ConnectionStatus,
    /// Reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,
    /// Backend correlation ID, absent until a `status` frame carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// The deferred initial task replayed in every handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_task: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Transcript and terminal
// ─────────────────────────────────────────────────────────────────────────────

/// Who authored a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Typed by the user.
    User,
    /// Produced by the agent.
    Agent,
    /// Produced by the client or backend lifecycle.
    System,
}

/// One chat transcript entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Entry ID.
    pub id: MessageId,
    /// Author kind.
    pub kind: MessageKind,
    /// Message text.
    pub content: String,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message stamped now.
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            kind,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One terminal log line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalLogEntry {
    /// Entry ID.
    pub id: LogEntryId,
    /// Line text.
    pub content: String,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
}

impl TerminalLogEntry {
    /// Create a log line stamped now.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: LogEntryId::new(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File tree
// ─────────────────────────────────────────────────────────────────────────────

/// Node kind in the workspace file tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeKind {
    /// A regular file.
    #[default]
    File,
    /// A directory.
    Dir,
}

impl NodeKind {
    /// Map a backend spelling to a kind. Unknown spellings are files.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "dir" | "folder" | "directory" => Self::Dir,
            _ => Self::File,
        }
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            Self::File => "file",
            Self::Dir => "dir",
        })
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => Self::from_wire(&s),
            _ => Self::File,
        })
    }
}

/// A node of the workspace file tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFileNode")]
pub struct FileNode {
    /// Display name.
    pub name: String,
    /// File or directory.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Absolute path inside the agent workspace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Child nodes (directories only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

/// Wire shape of a tree node. The kind arrives as `type` or `kind`, and
/// some backends send both.
#[derive(Deserialize)]
struct RawFileNode {
    #[serde(default, deserialize_with = "crate::protocol::lenient::string")]
    name: String,
    #[serde(default, rename = "type")]
    node_type: Option<NodeKind>,
    #[serde(default)]
    kind: Option<NodeKind>,
    #[serde(default, deserialize_with = "crate::protocol::lenient::opt_string")]
    path: Option<String>,
    #[serde(default)]
    children: Option<Vec<FileNode>>,
}

impl From<RawFileNode> for FileNode {
    fn from(raw: RawFileNode) -> Self {
        Self {
            name: raw.name,
            kind: raw.node_type.or(raw.kind).unwrap_or_default(),
            path: raw.path,
            children: raw.children,
        }
    }
}

impl FileNode {
    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn item_count(&self) -> usize {
        1 + self
            .children
            .as_deref()
            .map_or(0, |children| children.iter().map(FileNode::item_count).sum())
    }
}

/// The workspace file tree, replaced wholesale on every update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FileTree {
    /// Top-level nodes in backend order.
    pub nodes: Vec<FileNode>,
}

impl FileTree {
    /// Build a tree from top-level nodes.
    #[must_use]
    pub fn new(nodes: Vec<FileNode>) -> Self {
        Self { nodes }
    }

    /// Recursive node count.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.nodes.iter().map(FileNode::item_count).sum()
    }

    /// Whether the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The backend sends either a list of top-level nodes or a single root node.
impl<'de> Deserialize<'de> for FileTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Forest(Vec<FileNode>),
            Root(FileNode),
            Nothing(()),
        }

        Ok(match Shape::deserialize(deserializer)? {
            Shape::Forest(nodes) => Self { nodes },
            Shape::Root(node) => Self { nodes: vec![node] },
            Shape::Nothing(()) => Self::default(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Active file
// ─────────────────────────────────────────────────────────────────────────────

/// The file currently shown in the viewer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFile {
    /// Workspace path.
    pub path: String,
    /// File text, a cached copy while loading, or an error placeholder.
    pub content: String,
    /// Whether a read for this path is still in flight.
    pub loading: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionState
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the UI renders, published as one read-only snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Session record.
    pub session: Session,
    /// Chat transcript (append-only).
    pub chat: Vec<ChatMessage>,
    /// Terminal log (append-only).
    pub terminal: Vec<TerminalLogEntry>,
    /// Structured workspace tree from `file_tree` events.
    pub file_tree: FileTree,
    /// Legacy flat file list from `file_change` / `agent_event` payloads.
    pub files: Vec<String>,
    /// File shown in the viewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_file: Option<ActiveFile>,
    /// Last recorded error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionState {
    /// Append a chat message.
    pub fn push_chat(&mut self, kind: MessageKind, content: impl Into<String>) {
        self.chat.push(ChatMessage::new(kind, content));
    }

    /// Append a terminal log line.
    pub fn push_terminal(&mut self, content: impl Into<String>) {
        self.terminal.push(TerminalLogEntry::new(content));
    }

    /// Replace the flat file list.
    pub fn replace_files(&mut self, files: Vec<String>) {
        self.files = files;
    }

    /// Insert a path into the flat file list unless already present.
    ///
    /// Returns `true` when the path was appended.
    pub fn insert_file(&mut self, path: &str) -> bool {
        if self.files.iter().any(|p| p == path) {
            return false;
        }
        self.files.push(path.to_string());
        true
    }

    /// Current status shortcut.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.session.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FileNode {
        FileNode {
            name: name.into(),
            kind: NodeKind::File,
            path: Some(format!("/workspace/{name}")),
            children: None,
        }
    }

    fn dir(name: &str, children: Vec<FileNode>) -> FileNode {
        FileNode {
            name: name.into(),
            kind: NodeKind::Dir,
            path: Some(format!("/workspace/{name}")),
            children: Some(children),
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionStatus::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }

    #[test]
    fn node_kind_accepts_backend_spellings() {
        assert_eq!(NodeKind::from_wire("folder"), NodeKind::Dir);
        assert_eq!(NodeKind::from_wire("DIR"), NodeKind::Dir);
        assert_eq!(NodeKind::from_wire("directory"), NodeKind::Dir);
        assert_eq!(NodeKind::from_wire("file"), NodeKind::File);
        assert_eq!(NodeKind::from_wire("symlink"), NodeKind::File);
    }

    #[test]
    fn item_count_is_recursive() {
        let tree = FileTree::new(vec![
            dir("src", vec![file("main.rs"), dir("bin", vec![file("cli.rs")])]),
            file("README.md"),
        ]);
        assert_eq!(tree.item_count(), 5);
    }

    #[test]
    fn tree_deserializes_from_forest() {
        let json = serde_json::json!([
            { "name": "src", "type": "folder", "path": "/workspace/src", "children": [
                { "name": "main.py", "type": "file", "path": "/workspace/src/main.py" }
            ]},
            { "name": "README.md", "type": "file" }
        ]);
        let tree: FileTree = serde_json::from_value(json).unwrap();
        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.nodes[0].kind, NodeKind::Dir);
        assert_eq!(tree.nodes[1].path, None);
        assert_eq!(tree.item_count(), 3);
    }

    #[test]
    fn tree_deserializes_from_single_root() {
        let json = serde_json::json!({ "name": "workspace", "kind": "dir", "children": [] });
        let tree: FileTree = serde_json::from_value(json).unwrap();
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].kind, NodeKind::Dir);
    }

    #[test]
    fn node_with_type_and_kind_prefers_type() {
        let json = serde_json::json!([
            { "name": "src", "type": "folder", "kind": "file", "children": [
                { "name": "main.rs", "type": "file", "kind": "file" }
            ]}
        ]);
        let tree: FileTree = serde_json::from_value(json).unwrap();
        assert_eq!(tree.nodes[0].kind, NodeKind::Dir);
        assert_eq!(tree.item_count(), 2);
    }

    #[test]
    fn tree_deserializes_from_null() {
        let tree: FileTree = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn node_serializes_kind_as_type() {
        let json = serde_json::to_value(dir("src", vec![])).unwrap();
        assert_eq!(json["type"], "dir");
        assert_eq!(json["children"], serde_json::json!([]));
    }

    #[test]
    fn insert_file_is_set_like() {
        let mut state = SessionState::default();
        assert!(state.insert_file("a.txt"));
        assert!(state.insert_file("b.txt"));
        assert!(!state.insert_file("a.txt"));
        assert_eq!(state.files, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn push_helpers_preserve_order() {
        let mut state = SessionState::default();
        state.push_chat(MessageKind::User, "one");
        state.push_chat(MessageKind::Agent, "two");
        state.push_terminal("$ ls");
        assert_eq!(state.chat[0].content, "one");
        assert_eq!(state.chat[1].kind, MessageKind::Agent);
        assert_eq!(state.terminal[0].content, "$ ls");
    }
}
