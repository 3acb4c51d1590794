//! Line handlers invoked by the background drain.

use std::sync::Weak;

use async_trait::async_trait;

use super::ShellSupervisor;
use crate::bus::LineRecord;
use crate::display;

/// A consumer of drained output lines.
///
/// Handlers are called in registration order for every line, exactly once,
/// in arrival order.
#[async_trait]
pub trait LineHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Handle one output line.
    async fn on_line(&self, line: &LineRecord);
}

/// Kills the game process when the termination sentinel shows up.
#[derive(Debug)]
pub struct SentinelHandler {
    shell: Weak<ShellSupervisor>,
    sentinel: String,
}

impl SentinelHandler {
    #[must_use]
    pub fn new(shell: Weak<ShellSupervisor>, sentinel: impl Into<String>) -> Self {
        Self {
            shell,
            sentinel: sentinel.into(),
        }
    }

    /// Whether `line` carries the termination sentinel.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        line.contains(self.sentinel.as_str())
    }
}

#[async_trait]
impl LineHandler for SentinelHandler {
    fn name(&self) -> &'static str {
        "sentinel"
    }

    async fn on_line(&self, line: &LineRecord) {
        if !self.matches(line.text()) {
            return;
        }

        let Some(shell) = self.shell.upgrade() else {
            return;
        };

        match shell.kill().await {
            Ok(killed) => {
                tracing::info!(seq = line.seq(), killed, "Game process exited");
                display::print_notice("game process exited");
            }
            Err(e) => tracing::error!(error = %e, "Failed to clean up exited game process"),
        }
    }
}
