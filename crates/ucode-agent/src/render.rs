//! Turns successive [`SessionState`] snapshots into printable lines.
//!
//! Chat and terminal are append-only, so the printer only remembers how many
//! entries it already emitted. Status, error, tree, and active file are
//! printed when they differ from the last printed value.

use ucode_core::{ActiveFile, ConnectionStatus, FileNode, FileTree, MessageKind, NodeKind, SessionState};

#[derive(Debug, Default)]
pub struct Printer {
    chat_seen: usize,
    terminal_seen: usize,
    status: ConnectionStatus,
    error: Option<String>,
    tree: FileTree,
    file: Option<ActiveFile>,
}

impl Printer {
    /// Lines for everything that changed since the previous call.
    pub fn render(&mut self, state: &SessionState) -> Vec<String> {
        let mut out = Vec::new();

        if state.status() != self.status {
            self.status = state.status();
            out.push(format!("-- {}", self.status));
        }

        // a shorter list than last time means a fresh state; start over
        if state.chat.len() < self.chat_seen {
            self.chat_seen = 0;
        }
        for msg in &state.chat[self.chat_seen..] {
            out.push(format!("{} {}", chat_prefix(msg.kind), msg.content));
        }
        self.chat_seen = state.chat.len();

        if state.terminal.len() < self.terminal_seen {
            self.terminal_seen = 0;
        }
        for entry in &state.terminal[self.terminal_seen..] {
            out.push(format!("  | {}", entry.content));
        }
        self.terminal_seen = state.terminal.len();

        if state.error != self.error {
            self.error.clone_from(&state.error);
            if let Some(error) = &self.error {
                out.push(format!("!! {error}"));
            }
        }

        if state.file_tree != self.tree {
            self.tree = state.file_tree.clone();
            out.push(format!("-- file tree ({} items)", self.tree.item_count()));
            for node in &self.tree.nodes {
                tree_lines(node, 1, &mut out);
            }
        }

        let loaded = state.active_file.as_ref().filter(|f| !f.loading && self.file.as_ref() != Some(*f));
        if let Some(file) = loaded {
            out.push(format!("-- {}", file.path));
            out.extend(file.content.lines().map(str::to_string));
            self.file = Some(file.clone());
        }

        out
    }
}

fn chat_prefix(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::User => "you>",
        MessageKind::Agent => "agent>",
        MessageKind::System => "*",
    }
}

fn tree_lines(node: &FileNode, depth: usize, out: &mut Vec<String>) {
    let mut line = format!("{}{}", "  ".repeat(depth), node.name);
    if node.kind == NodeKind::Dir {
        line.push('/');
    }
    out.push(line);
    for child in node.children.iter().flatten() {
        tree_lines(child, depth + 1, out);
    }
}
