//! # ucode-agent
//!
//! Terminal front-end for one agent session: loads settings, opens the
//! session, prints transcript and terminal output as it arrives, and maps
//! stdin lines onto session operations.

#![deny(unsafe_code)]

mod render;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use ucode_client::{AgentSession, HttpFileService, SessionConfig, WsConnector};
use ucode_core::identity::{IdentityProvider, StaticIdentity};
use ucode_core::logging::{LogFormat, init_subscriber};
use ucode_settings::UcodeSettings;

use crate::render::Printer;
use crate::repl::{HELP, ReplCommand};

/// ucode agent session client.
#[derive(Parser, Debug)]
#[command(name = "ucode-agent", about = "Drive a remote coding agent session from the terminal")]
struct Cli {
    /// Initial task; the session opens immediately when given.
    #[arg(long)]
    task: Option<String>,

    /// WebSocket endpoint of the agent backend.
    #[arg(long)]
    ws_url: Option<String>,

    /// Base URL of the file side channel.
    #[arg(long)]
    api_url: Option<String>,

    /// Repository provider token, forwarded in the handshake.
    #[arg(long, env = "UCODE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Project / workspace id.
    #[arg(long)]
    project: Option<String>,

    /// Organization id, used as the project id when `--project` is unset.
    #[arg(long)]
    org: Option<String>,

    /// Model provider (`anthropic`, `google`, ...).
    #[arg(long)]
    provider: Option<String>,

    /// Repository to clone into the agent workspace.
    #[arg(long)]
    repo: Option<String>,

    /// Branch to clone.
    #[arg(long)]
    branch: Option<String>,

    /// Settings file (defaults to `~/.ucode/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level filter (overrides settings and `UCODE_LOG_LEVEL`).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Layer command-line flags over loaded settings.
    fn apply(&self, settings: &mut UcodeSettings) {
        fn set(target: &mut String, value: Option<&String>) {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }
        set(&mut settings.endpoint.ws_url, self.ws_url.as_ref());
        set(&mut settings.endpoint.api_base_url, self.api_url.as_ref());
        set(&mut settings.agent.project_id, self.project.as_ref());
        set(&mut settings.agent.model_provider, self.provider.as_ref());
        set(&mut settings.agent.repo_url, self.repo.as_ref());
        set(&mut settings.logging.level, self.log_level.as_ref());
        if self.branch.is_some() {
            settings.agent.branch.clone_from(&self.branch);
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<UcodeSettings> {
    match path {
        Some(path) => ucode_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(ucode_settings::get_settings().clone()),
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

fn dispatch(session: &AgentSession, command: ReplCommand) {
    match command {
        ReplCommand::Empty | ReplCommand::Quit => {}
        ReplCommand::Message(text) => session.send_message(&text),
        ReplCommand::Start(task) => session.start(task.as_deref()),
        ReplCommand::Stop => session.stop(),
        ReplCommand::Open(path) => session.select_file(&path),
        ReplCommand::Tree => session.refresh_file_tree(),
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Invalid(msg) => eprintln!("{msg}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.settings.as_ref())?;
    cli.apply(&mut settings);
    init_subscriber(&settings.logging.level, settings.logging.format);

    let mut config = SessionConfig::from_settings(&settings, cli.token.clone());
    if let Some(org) = &cli.org {
        let identity = StaticIdentity::new("local", org.as_str())
            .identity()
            .await
            .context("Failed to resolve identity")?;
        config = config.with_identity(&identity);
    }

    let files = HttpFileService::new(&config.api_base_url, config.request_timeout)
        .context("Invalid file API base URL")?;
    tracing::info!(ws_url = %config.ws_url, project = %config.project_id, "starting session client");
    let session = AgentSession::spawn(config, Arc::new(WsConnector::default()), Arc::new(files));

    let mut printer = Printer::default();
    let mut updates = session.subscribe();
    if let Some(task) = cli.task.as_deref() {
        session.start(Some(task));
    } else {
        println!("type a task to start, /help for commands");
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let lines = printer.render(&updates.borrow_and_update());
                print_lines(lines);
            }
            line = stdin.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let command = ReplCommand::parse(&line);
                if command == ReplCommand::Quit {
                    break;
                }
                dispatch(&session, command);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                break;
            }
        }
    }

    session.shutdown().await;
    print_lines(printer.render(&session.snapshot()));
    Ok(())
}
