//! Operator console: routes typed lines to the game or to admin commands.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::ShellSupervisor;
use crate::display;

const HELP: &str = "commands while the game is stopped: start, exit, help";

/// Administrative command accepted while the game is stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Start,
    Exit,
    Help,
    Unknown(String),
}

impl AdminCommand {
    /// Parse a console line. Returns `None` for blank input.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.trim();
        if word.is_empty() {
            return None;
        }
        Some(match word.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "exit" | "quit" => Self::Exit,
            "help" | "?" => Self::Help,
            _ => Self::Unknown(word.to_string()),
        })
    }
}

/// What the console loop should do after handling a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    Continue,
    Exit,
}

/// Read stdin lines on a dedicated thread.
///
/// Blocking stdin reads would otherwise hold up runtime shutdown. The
/// channel closes at EOF.
#[must_use]
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("prism-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "Failed to start console reader");
    }
    rx
}

/// Handle one console line.
pub async fn handle_console_line(shell: &ShellSupervisor, line: &str) -> ConsoleAction {
    if shell.is_running() {
        if let Err(e) = shell.send_command(line.trim_end()).await {
            display::print_error(&format!("failed to send command: {e}"));
        }
        return ConsoleAction::Continue;
    }

    match AdminCommand::parse(line) {
        None => ConsoleAction::Continue,
        Some(AdminCommand::Start) => {
            display::print_notice("starting game");
            if let Err(e) = shell.start().await {
                display::print_error(&format!("failed to start game: {e}"));
            }
            ConsoleAction::Continue
        }
        Some(AdminCommand::Exit) => ConsoleAction::Exit,
        Some(AdminCommand::Help) => {
            display::print_notice(HELP);
            ConsoleAction::Continue
        }
        Some(AdminCommand::Unknown(word)) => {
            display::print_error(&format!("unknown command: {word} (type help)"));
            ConsoleAction::Continue
        }
    }
}

/// Run the console until `cancel` fires, the operator exits, or input ends.
///
/// An `exit` command cancels `cancel`.
pub async fn run_console(
    shell: Arc<ShellSupervisor>,
    cancel: CancellationToken,
    mut lines: mpsc::UnboundedReceiver<String>,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.recv() => {
                let Some(line) = line else {
                    tracing::debug!("Console input closed");
                    break;
                };
                if handle_console_line(&shell, &line).await == ConsoleAction::Exit {
                    tracing::info!("Exit requested from console");
                    cancel.cancel();
                    break;
                }
            }
        }
    }
}
