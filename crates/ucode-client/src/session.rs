//! The agent session: one driver task owning all session state.
//!
//! Every input (user commands, transport events, timer expiries, file
//! fetch completions) is funnelled into a single channel and handled to
//! completion, one at a time, by the driver. After each input the driver
//! publishes a fresh [`SessionState`] snapshot on a `watch` channel.
//!
//! Transport and timer events carry the epoch they were issued under. The
//! epoch advances whenever a new transport is opened and on `stop`, so
//! events from a superseded connection, and reconnect timers armed before
//! a `stop`, are recognised and dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ucode_core::{ActiveFile, ClientError, ConnectionStatus, FileTree, MessageKind, SessionState};

use crate::config::SessionConfig;
use crate::dispatcher::{apply_tree, dispatch};
use crate::encoder::{encode_action, encode_handshake};
use crate::files::{FileCache, FileService, error_placeholder};
use crate::heartbeat::run_heartbeat;
use crate::reconnect::CloseDisposition;
use crate::transport::{Connector, Outbound, TransportEvent, TransportLink, connection_url};

/// Close code sent on an explicit stop.
const NORMAL_CLOSURE: u16 = 1000;

/// Shown once the reconnect budget is spent.
pub const CONNECTION_LOST: &str = "Connection lost after multiple attempts";

// ─────────────────────────────────────────────────────────────────────────────
// Public handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a running agent session.
///
/// All operations are fire-and-forget: they enqueue a command for the
/// driver and return immediately. Observe results through [`snapshot`]
/// or [`subscribe`]. Nothing here returns an error; failures show up as
/// state (status, error string, log lines).
///
/// Dropping the handle tears the session down like [`shutdown`], without
/// waiting for the driver to finish.
///
/// [`snapshot`]: AgentSession::snapshot
/// [`subscribe`]: AgentSession::subscribe
/// [`shutdown`]: AgentSession::shutdown
pub struct AgentSession {
    inputs: mpsc::UnboundedSender<Input>,
    state: watch::Receiver<SessionState>,
    driver: Mutex<Option<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

impl AgentSession {
    /// Spawn the driver on the current tokio runtime.
    pub fn spawn(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        files: Arc<dyn FileService>,
    ) -> Self {
        let (inputs, rx) = mpsc::unbounded_channel();
        let (publish, state) = watch::channel(SessionState::default());

        let driver = Driver {
            config,
            connector,
            files,
            inputs: inputs.clone(),
            publish,
            state: SessionState::default(),
            link: Link::Down,
            epoch: 0,
            outbox: Vec::new(),
            cache: FileCache::default(),
            reads_in_flight: HashSet::new(),
            cache_generation: 0,
        };
        let handle = tokio::spawn(driver.run(rx));

        Self {
            inputs,
            state,
            driver: Mutex::new(Some(handle)),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Connect (if needed) and deliver `task`.
    ///
    /// While connected, a non-empty task is sent as a new message. Otherwise
    /// the task becomes the deferred initial task of the next handshake.
    pub fn start(&self, task: Option<&str>) {
        self.command(Command::Start(task.map(str::to_owned)));
    }

    /// Send a user message, connecting first if necessary.
    ///
    /// Empty or whitespace-only text is ignored.
    pub fn send_message(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.command(Command::Send(text.to_owned()));
    }

    /// Close the transport and return to idle. Idempotent.
    pub fn stop(&self) {
        self.command(Command::Stop);
    }

    /// Show `path` in the viewer, fetching its content over the side channel.
    pub fn select_file(&self, path: &str) {
        if path.trim().is_empty() {
            return;
        }
        self.command(Command::SelectFile(path.trim().to_owned()));
    }

    /// Re-fetch the workspace tree over the side channel.
    pub fn refresh_file_tree(&self) {
        self.command(Command::RefreshTree);
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified after every processed input.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Stop the session and wait for the driver to exit.
    ///
    /// Safe to call more than once; teardown runs exactly once.
    pub async fn shutdown(&self) {
        self.tear_down();
        let handle = self.driver.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "session driver ended abnormally");
            }
        }
    }

    fn tear_down(&self) {
        if !self.torn_down.swap(true, Ordering::AcqRel) {
            let _ = self.inputs.send(Input::Command(Command::Shutdown));
        }
    }

    fn command(&self, command: Command) {
        if self.torn_down.load(Ordering::Acquire) {
            debug!(?command, "session already torn down, ignoring command");
            return;
        }
        let _ = self.inputs.send(Input::Command(command));
    }
}

impl Drop for AgentSession {
    fn drop(&mut self) {
        self.tear_down();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver inputs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Command {
    Start(Option<String>),
    Send(String),
    Stop,
    SelectFile(String),
    RefreshTree,
    Shutdown,
}

enum Input {
    Command(Command),
    Opened { epoch: u64, link: TransportLink },
    OpenFailed { epoch: u64, error: ClientError },
    Transport { epoch: u64, event: TransportEvent },
    ReconnectDue { epoch: u64 },
    FileLoaded { path: String, generation: u64, result: ucode_core::Result<String> },
    TreeLoaded { result: ucode_core::Result<FileTree> },
}

/// Transport lifecycle as the driver sees it.
enum Link {
    Down,
    Opening,
    Open {
        outgoing: mpsc::Sender<Outbound>,
        heartbeat: CancellationToken,
    },
    ReconnectPending,
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

struct Driver {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    files: Arc<dyn FileService>,
    inputs: mpsc::UnboundedSender<Input>,
    publish: watch::Sender<SessionState>,
    state: SessionState,
    link: Link,
    epoch: u64,
    /// Messages accepted while the transport was being opened.
    outbox: Vec<String>,
    cache: FileCache,
    /// Paths with a `read_file` outstanding; at most one read per path.
    reads_in_flight: HashSet<String>,
    /// Advances on `stop`; reads issued under an older generation are not cached.
    cache_generation: u64,
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Input>) {
        while let Some(input) = rx.recv().await {
            let done = self.handle(input);
            let _ = self.publish.send_replace(self.state.clone());
            if done {
                break;
            }
        }
        debug!("session driver exited");
    }

    /// Process one input. Returns `true` when the driver should exit.
    fn handle(&mut self, input: Input) -> bool {
        match input {
            Input::Command(Command::Start(task)) => {
                let task = task.filter(|t| !t.trim().is_empty());
                self.ensure_connected_then_deliver(task);
            }
            Input::Command(Command::Send(text)) => self.ensure_connected_then_deliver(Some(text)),
            Input::Command(Command::Stop) => self.stop(),
            Input::Command(Command::SelectFile(path)) => self.select_file(path),
            Input::Command(Command::RefreshTree) => self.refresh_tree(),
            Input::Command(Command::Shutdown) => {
                self.stop();
                return true;
            }
            Input::Opened { epoch, link } => self.on_opened(epoch, link),
            Input::OpenFailed { epoch, error } => self.on_open_failed(epoch, &error),
            Input::Transport { epoch, event } => self.on_transport(epoch, event),
            Input::ReconnectDue { epoch } => self.on_reconnect_due(epoch),
            Input::FileLoaded { path, generation, result } => {
                self.on_file_loaded(path, generation, result);
            }
            Input::TreeLoaded { result } => self.on_tree_loaded(result),
        }
        false
    }

    // ── Delivery ────────────────────────────────────────────────────

    /// Single entry point behind `start` and `send_message`.
    fn ensure_connected_then_deliver(&mut self, task: Option<String>) {
        match self.link {
            Link::Open { .. } => {
                if let Some(text) = task {
                    self.deliver(&text);
                }
            }
            Link::Opening | Link::ReconnectPending => {
                if let Some(text) = task {
                    self.echo_user(&text);
                    if self.state.session.active_task.is_none() {
                        self.state.session.active_task = Some(text);
                    } else {
                        self.outbox.push(text);
                    }
                }
            }
            Link::Down => {
                if let Some(text) = task {
                    self.echo_user(&text);
                    self.state.session.active_task = Some(text);
                }
                self.state.session.reconnect_attempts = 0;
                self.state.error = None;
                self.open_transport();
            }
        }
    }

    fn deliver(&mut self, text: &str) {
        match encode_action(text) {
            Ok(frame) => {
                if self.send_frame(frame) {
                    self.echo_user(text);
                }
            }
            Err(e) => {
                warn!(error = %e, "action frame not encodable");
                self.state.push_terminal(format!("Failed to send message: {e}"));
            }
        }
    }

    fn echo_user(&mut self, text: &str) {
        self.state.push_chat(MessageKind::User, text);
        self.state.push_terminal(format!("> {text}"));
    }

    /// Queue a text frame on the open link.
    fn send_frame(&mut self, frame: String) -> bool {
        let Link::Open { outgoing, .. } = &self.link else {
            return false;
        };
        match outgoing.try_send(Outbound::Text(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("outbound queue full, dropping frame");
                self.state.push_terminal("Transport busy: message not sent");
                false
            }
            // the link's Closed event is on its way
            Err(TrySendError::Closed(_)) => false,
        }
    }

    // ── Connection lifecycle ────────────────────────────────────────

    fn open_transport(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        self.link = Link::Opening;
        self.state.session.status = ConnectionStatus::Connecting;

        let url = match connection_url(&self.config.ws_url, self.config.token.as_deref()) {
            Ok(url) => url,
            Err(error) => {
                let _ = self.inputs.send(Input::OpenFailed { epoch, error });
                return;
            }
        };

        info!(epoch, attempt = self.state.session.reconnect_attempts, "opening transport");
        let connector = Arc::clone(&self.connector);
        let inputs = self.inputs.clone();
        drop(tokio::spawn(async move {
            let input = match connector.connect(&url).await {
                Ok(link) => Input::Opened { epoch, link },
                Err(error) => Input::OpenFailed { epoch, error },
            };
            let _ = inputs.send(input);
        }));
    }

    fn on_opened(&mut self, epoch: u64, link: TransportLink) {
        if epoch != self.epoch || !matches!(self.link, Link::Opening) {
            debug!(epoch, current = self.epoch, "closing superseded transport");
            let _ = link.outgoing.try_send(Outbound::Close(NORMAL_CLOSURE));
            return;
        }

        let TransportLink { outgoing, incoming } = link;
        info!(epoch, "transport open");
        self.state.session.status = ConnectionStatus::Connected;
        self.state.session.reconnect_attempts = 0;

        let heartbeat = CancellationToken::new();
        let (hb_outgoing, hb_cancel, interval) =
            (outgoing.clone(), heartbeat.clone(), self.config.heartbeat_interval);
        drop(tokio::spawn(async move {
            let result = run_heartbeat(hb_outgoing, interval, hb_cancel).await;
            debug!(epoch, ?result, "heartbeat stopped");
        }));
        drop(tokio::spawn(forward_events(epoch, incoming, self.inputs.clone())));

        self.link = Link::Open { outgoing, heartbeat };

        let task = self.state.session.active_task.clone().unwrap_or_default();
        match encode_handshake(&self.config.handshake(&task)) {
            Ok(frame) => {
                let _ = self.send_frame(frame);
            }
            Err(e) => {
                warn!(error = %e, "handshake not encodable");
                self.state.push_terminal(format!("Handshake failed: {e}"));
            }
        }

        for text in std::mem::take(&mut self.outbox) {
            match encode_action(&text) {
                Ok(frame) => {
                    let _ = self.send_frame(frame);
                }
                Err(e) => warn!(error = %e, "queued action not encodable"),
            }
        }
    }

    fn on_open_failed(&mut self, epoch: u64, error: &ClientError) {
        if epoch != self.epoch || !matches!(self.link, Link::Opening) {
            debug!(epoch, "ignoring failure of superseded open");
            return;
        }
        warn!(epoch, error = %error, "transport open failed");
        self.state.push_terminal(format!("Connection error: {error}"));
        self.on_closed(None);
    }

    fn on_transport(&mut self, epoch: u64, event: TransportEvent) {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "dropping event from superseded transport");
            return;
        }
        match event {
            TransportEvent::Text(text) => {
                let outcome = dispatch(&mut self.state, &text);
                if outcome.session_id.is_some() {
                    info!(session_id = ?outcome.session_id, "backend session assigned");
                }
                debug!(frame = outcome.frame, status = ?outcome.status, "frame dispatched");
            }
            TransportEvent::Error(error) => {
                warn!(epoch, %error, "transport error");
                self.state.push_terminal(format!("Connection error: {error}"));
            }
            TransportEvent::Closed { code, reason } => {
                info!(epoch, ?code, %reason, "transport closed");
                self.on_closed(code);
            }
        }
    }

    fn on_closed(&mut self, code: Option<u16>) {
        if let Link::Open { heartbeat, .. } = &self.link {
            heartbeat.cancel();
        }
        self.link = Link::Down;

        let policy = &self.config.reconnect;
        match policy.on_close(code, self.state.session.reconnect_attempts) {
            CloseDisposition::Terminal => {
                self.state.session.status = ConnectionStatus::Idle;
                self.outbox.clear();
                let code = code.map_or_else(String::new, |c| format!(" ({c})"));
                self.state.push_terminal(format!("Connection closed{code}"));
            }
            CloseDisposition::Retry { attempt, delay } => {
                let max = policy.max_attempts;
                self.state.session.reconnect_attempts = attempt;
                self.state.session.status = ConnectionStatus::Connecting;
                self.link = Link::ReconnectPending;
                self.state.push_terminal(format!(
                    "Connection lost. Reconnecting in {}s (attempt {attempt}/{max})",
                    delay.as_secs()
                ));
                warn!(attempt, max, ?delay, "scheduling reconnect");

                let epoch = self.epoch;
                let inputs = self.inputs.clone();
                drop(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = inputs.send(Input::ReconnectDue { epoch });
                }));
            }
            CloseDisposition::Exhausted => {
                warn!(attempts = self.state.session.reconnect_attempts, "reconnect budget exhausted");
                self.state.session.status = ConnectionStatus::Error;
                self.state.error = Some(CONNECTION_LOST.to_string());
                self.outbox.clear();
                self.state.push_chat(MessageKind::System, CONNECTION_LOST);
                self.state.push_terminal(CONNECTION_LOST);
            }
        }
    }

    fn on_reconnect_due(&mut self, epoch: u64) {
        if epoch != self.epoch || !matches!(self.link, Link::ReconnectPending) {
            debug!(epoch, current = self.epoch, "abandoning stale reconnect timer");
            return;
        }
        self.open_transport();
    }

    fn stop(&mut self) {
        let was_active = !matches!(self.link, Link::Down);
        if let Link::Open { outgoing, heartbeat } = &self.link {
            heartbeat.cancel();
            let _ = outgoing.try_send(Outbound::Close(NORMAL_CLOSURE));
        }
        self.link = Link::Down;
        self.epoch += 1;
        self.outbox.clear();
        self.cache.clear();
        self.cache_generation += 1;

        let session = &mut self.state.session;
        session.status = ConnectionStatus::Idle;
        session.reconnect_attempts = 0;
        session.active_task = None;
        session.session_id = None;
        self.state.error = None;

        if was_active {
            info!("session stopped");
            self.state.push_terminal("Session stopped");
        }
    }

    // ── Side channel ────────────────────────────────────────────────

    fn select_file(&mut self, path: String) {
        let cached = self.cache.get(&path).unwrap_or_default().to_string();
        self.state.active_file = Some(ActiveFile {
            path: path.clone(),
            content: cached,
            loading: true,
        });
        if self.reads_in_flight.contains(&path) {
            debug!(%path, "read already in flight");
            return;
        }
        self.spawn_read(path);
    }

    fn spawn_read(&mut self, path: String) {
        let _ = self.reads_in_flight.insert(path.clone());
        let files = Arc::clone(&self.files);
        let session_id = self.state.session.session_id.clone();
        let generation = self.cache_generation;
        let inputs = self.inputs.clone();
        drop(tokio::spawn(async move {
            let result = files.read_file(session_id.as_ref(), &path).await;
            let _ = inputs.send(Input::FileLoaded {
                path,
                generation,
                result,
            });
        }));
    }

    fn on_file_loaded(&mut self, path: String, generation: u64, result: ucode_core::Result<String>) {
        let _ = self.reads_in_flight.remove(&path);
        let current = self.state.active_file.as_ref().is_some_and(|f| f.path == path);

        // a read issued before a stop must not repopulate the cleared cache
        if let (Ok(content), true) = (&result, generation == self.cache_generation) {
            self.cache.insert(&path, content.clone());
        }
        if !current {
            debug!(%path, "discarding response for a file no longer viewed");
            return;
        }
        let content = match result {
            Ok(content) => content,
            Err(e) => {
                warn!(%path, error = %e, "file read failed");
                error_placeholder(&e)
            }
        };
        self.state.active_file = Some(ActiveFile {
            path,
            content,
            loading: false,
        });
    }

    fn refresh_tree(&mut self) {
        let files = Arc::clone(&self.files);
        let session_id = self.state.session.session_id.clone();
        let inputs = self.inputs.clone();
        drop(tokio::spawn(async move {
            let result = files.list_tree(session_id.as_ref()).await;
            let _ = inputs.send(Input::TreeLoaded { result });
        }));
    }

    fn on_tree_loaded(&mut self, result: ucode_core::Result<FileTree>) {
        match result {
            Ok(tree) => apply_tree(&mut self.state, tree),
            Err(e) => {
                warn!(error = %e, "file tree refresh failed");
                self.state
                    .push_terminal(format!("File tree refresh failed: {}", e.user_message()));
            }
        }
    }
}

/// Forward one link's events into the driver, tagged with its epoch.
///
/// A link whose event stream ends without a `Closed` is reported as an
/// abnormal close.
async fn forward_events(
    epoch: u64,
    mut incoming: mpsc::Receiver<TransportEvent>,
    inputs: mpsc::UnboundedSender<Input>,
) {
    while let Some(event) = incoming.recv().await {
        let closed = matches!(event, TransportEvent::Closed { .. });
        if inputs.send(Input::Transport { epoch, event }).is_err() || closed {
            return;
        }
    }
    let _ = inputs.send(Input::Transport {
        epoch,
        event: TransportEvent::Closed {
            code: None,
            reason: "transport ended without close".into(),
        },
    });
}
