//! Stdin line parsing.

/// One line typed at the prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplCommand {
    /// Blank line.
    Empty,
    /// Plain text, sent to the agent.
    Message(String),
    /// `/start [task]`
    Start(Option<String>),
    /// `/stop`
    Stop,
    /// `/open <path>`
    Open(String),
    /// `/tree`
    Tree,
    /// `/help`
    Help,
    /// `/quit` or `/exit`
    Quit,
    /// A slash command that could not be parsed; carries the message to print.
    Invalid(String),
}

pub const HELP: &str = "\
commands:
  <text>          send a message to the agent (starts a session if none is open)
  /start [task]   open a session, optionally with an initial task
  /stop           close the session
  /open <path>    show a workspace file
  /tree           refresh the workspace file tree
  /quit           tear down and exit";

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Message(line.to_string());
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "start" if arg.is_empty() => Self::Start(None),
            "start" => Self::Start(Some(arg.to_string())),
            "stop" => Self::Stop,
            "open" if arg.is_empty() => Self::Invalid("usage: /open <path>".into()),
            "open" => Self::Open(arg.to_string()),
            "tree" => Self::Tree,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Invalid(format!("unknown command: /{other} (try /help)")),
        }
    }
}
