//! Game process lifecycle, output pumping and line dispatch.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::ChildStdin;
use tokio::sync::{watch, Mutex};

use super::{
    GameProcess, GameProcessBuilder, LineHandler, SentinelHandler, SpawnError, TextCodec,
    DEFAULT_KILL_TIMEOUT, TERMINATION_SENTINEL,
};
use crate::bus::{LineBus, LineRecord};
use crate::config::ShellConfig;
use crate::display;

/// Longest command accepted by [`ShellSupervisor::send_command`], in bytes.
pub const MAX_COMMAND_LEN: usize = 4096;

/// Time allowed for one command to reach the game's stdin.
pub const COMMAND_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether the game process is currently running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

impl RunState {
    #[must_use]
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

/// Error type for shell operations.
#[derive(thiserror::Error, Debug)]
pub enum ShellError {
    /// The game process is not running.
    #[error("Game process is not running")]
    NotRunning,
    /// The game process is already running.
    #[error("Game process is already running")]
    AlreadyRunning,
    /// The command text cannot be sent as a single console line.
    #[error("Invalid command: {0}")]
    InvalidCommand(&'static str),
    /// The game did not accept input in time.
    #[error("Timed out writing to game stdin after {0:?}")]
    WriteTimeout(Duration),
    /// An encoding label could not be resolved.
    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),
    /// Failed to spawn the game process.
    #[error("Failed to spawn game process: {0}")]
    Spawn(#[from] SpawnError),
    /// I/O error talking to the game process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Owns the game process and the run flag.
///
/// Constructed behind an `Arc`; the built-in sentinel handler keeps a weak
/// reference back to the supervisor so it can kill the process once the
/// wrapper reports the game exited.
pub struct ShellSupervisor {
    config: ShellConfig,
    codec: TextCodec,
    builder: GameProcessBuilder,
    process: Mutex<Option<GameProcess>>,
    stdin: Mutex<Option<ChildStdin>>,
    state_tx: watch::Sender<RunState>,
    bus: Arc<LineBus>,
    handlers: RwLock<Vec<Arc<dyn LineHandler>>>,
}

impl fmt::Debug for ShellSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellSupervisor")
            .field("start_cmd", &self.config.start_cmd)
            .field("state", &self.state())
            .field("handlers", &self.handler_count())
            .finish_non_exhaustive()
    }
}

impl ShellSupervisor {
    /// Create a stopped supervisor publishing output to `bus`.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::UnknownEncoding` if a configured encoding label
    /// is not recognized.
    pub fn new(config: ShellConfig, bus: Arc<LineBus>) -> Result<Arc<Self>, ShellError> {
        let codec = TextCodec::new(&config.read_encoding, &config.write_encoding)?;
        let mut builder = GameProcessBuilder::new(config.start_cmd.clone());
        if let Some(ref dir) = config.working_dir {
            builder = builder.working_dir(dir);
        }
        let (state_tx, _) = watch::channel(RunState::Stopped);

        Ok(Arc::new_cyclic(|weak| {
            let sentinel: Arc<dyn LineHandler> =
                Arc::new(SentinelHandler::new(weak.clone(), TERMINATION_SENTINEL));
            Self {
                config,
                codec,
                builder,
                process: Mutex::new(None),
                stdin: Mutex::new(None),
                state_tx,
                bus,
                handlers: RwLock::new(vec![sentinel]),
            }
        }))
    }

    #[must_use]
    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<LineBus> {
        &self.bus
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state_tx.borrow()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Wait until the game process is running.
    pub async fn wait_running(&self) {
        self.wait_for_state(RunState::Running).await;
    }

    /// Wait until the game process is stopped.
    pub async fn wait_stopped(&self) {
        self.wait_for_state(RunState::Stopped).await;
    }

    async fn wait_for_state(&self, target: RunState) {
        let mut rx = self.state_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Append a handler run for every drained line, after those already registered.
    pub fn add_line_handler(&self, handler: Arc<dyn LineHandler>) {
        tracing::debug!(handler = handler.name(), "Line handler registered");
        self.handlers.write().push(handler);
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// PID of the wrapper shell, if a process handle is held.
    pub async fn pid(&self) -> Option<u32> {
        self.process.lock().await.as_ref().and_then(GameProcess::id)
    }

    /// Spawn the game process and start pumping its output into the bus.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::AlreadyRunning` if the game is running, or
    /// `ShellError::Spawn` if the process cannot be spawned.
    pub async fn start(&self) -> Result<(), ShellError> {
        let mut slot = self.process.lock().await;
        if self.is_running() {
            return Err(ShellError::AlreadyRunning);
        }
        if let Some(mut stale) = slot.take() {
            if let Err(e) = stale.kill(DEFAULT_KILL_TIMEOUT).await {
                tracing::warn!(error = %e, "Failed to reap stale game process");
            }
        }

        let mut process = GameProcess::spawn(&self.builder)?;
        let stdin = process.take_stdin().ok_or(SpawnError::MissingPipe("stdin"))?;
        let stdout = process
            .take_stdout()
            .ok_or(SpawnError::MissingPipe("stdout"))?;
        tokio::spawn(pump_stdout(
            stdout,
            Arc::clone(&self.bus),
            self.codec,
            self.config.echo_output,
        ));
        if let Some(stderr) = process.take_stderr() {
            tokio::spawn(pump_stderr(stderr, self.codec));
        }

        let pid = process.id();
        *self.stdin.lock().await = Some(stdin);
        *slot = Some(process);
        self.state_tx.send_replace(RunState::Running);
        tracing::info!(pid, command = %self.builder.wrapped_command(), "Game process started");
        Ok(())
    }

    /// Write a command line to the game's stdin.
    ///
    /// Only the stdin handle is locked, so a game that stops reading input
    /// never blocks [`ShellSupervisor::kill`].
    ///
    /// # Errors
    ///
    /// Returns `ShellError::InvalidCommand` if `command` spans several lines
    /// or exceeds [`MAX_COMMAND_LEN`], `ShellError::NotRunning` without
    /// touching the process if the game is stopped, `ShellError::WriteTimeout`
    /// if the game does not take the input within [`COMMAND_WRITE_TIMEOUT`],
    /// or `ShellError::Io` if the write fails.
    pub async fn send_command(&self, command: &str) -> Result<(), ShellError> {
        validate_command(command)?;
        if !self.is_running() {
            return Err(ShellError::NotRunning);
        }

        let mut stdin = self.stdin.lock().await;
        let pipe = stdin.as_mut().ok_or(ShellError::NotRunning)?;
        let bytes = self.codec.encode_command(command);
        let write = async {
            pipe.write_all(&bytes).await?;
            pipe.flush().await
        };
        match tokio::time::timeout(COMMAND_WRITE_TIMEOUT, write).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(command, "Game is not reading its input");
                return Err(ShellError::WriteTimeout(COMMAND_WRITE_TIMEOUT));
            }
        }
        tracing::debug!(command, "Command sent to game");
        Ok(())
    }

    /// Ask the game to shut down with the configured stop command.
    ///
    /// The run flag flips once the termination sentinel is drained.
    ///
    /// # Errors
    ///
    /// Same as [`ShellSupervisor::send_command`].
    pub async fn stop(&self) -> Result<(), ShellError> {
        tracing::info!(command = %self.config.stop_cmd, "Stopping game");
        self.send_command(&self.config.stop_cmd).await
    }

    /// Forcefully terminate the game process and mark it stopped.
    ///
    /// Returns `true` if a process handle was held and killed, `false` if
    /// there was nothing to kill.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::Io` if the kill signal cannot be delivered.
    pub async fn kill(&self) -> Result<bool, ShellError> {
        let mut slot = self.process.lock().await;
        let result = match slot.take() {
            Some(mut process) => process.kill(DEFAULT_KILL_TIMEOUT).await.map(|()| true),
            None => Ok(false),
        };
        self.state_tx.send_replace(RunState::Stopped);
        // A writer stuck on a full pipe fails once the process is gone and
        // releases the handle; the next start replaces it.
        if let Ok(mut stdin) = self.stdin.try_lock() {
            stdin.take();
        }
        result.map_err(ShellError::from)
    }

    /// Send `command`, wait `wait`, then read up to `num` buffered lines.
    ///
    /// The probe lock is held for the whole sequence so concurrent probes
    /// never see each other's responses. Lines read here are still
    /// delivered to the drain.
    ///
    /// # Errors
    ///
    /// Returns `ShellError::InvalidCommand` for a command that is not a
    /// single line, or `ShellError::NotRunning` if the game is stopped.
    pub async fn probe(
        &self,
        command: &str,
        wait: Duration,
        num: usize,
    ) -> Result<Vec<String>, ShellError> {
        validate_command(command)?;
        if !self.is_running() {
            return Err(ShellError::NotRunning);
        }

        let probe = self.bus.lock_probe().await;
        self.send_command(command).await?;
        tokio::time::sleep(wait).await;

        let lines: Vec<String> = probe
            .peek(num)
            .into_iter()
            .map(LineRecord::into_text)
            .collect();
        tracing::debug!(command, cursor = probe.cursor(), lines = lines.len(), "Probe complete");
        Ok(lines)
    }

    /// Drain the bus forever, handing each line to every handler in order.
    pub async fn dispatch_lines(&self) {
        self.dispatch_until(std::future::pending()).await;
    }

    /// Drain the bus until `stop` resolves, then hand over the lines
    /// already buffered and return.
    ///
    /// A line being handled when `stop` fires is finished first.
    pub async fn dispatch_until<F>(&self, stop: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);
        loop {
            tokio::select! {
                line = self.bus.next_line() => self.handle_line(&line).await,
                () = &mut stop => break,
            }
        }

        while let Some(line) = self.bus.try_next_line() {
            self.handle_line(&line).await;
        }
        tracing::debug!("Line dispatch stopped");
    }

    async fn handle_line(&self, line: &LineRecord) {
        let handlers: Vec<Arc<dyn LineHandler>> = self.handlers.read().clone();
        for handler in handlers {
            handler.on_line(line).await;
        }
    }
}

fn validate_command(command: &str) -> Result<(), ShellError> {
    if command.contains(['\n', '\r']) {
        return Err(ShellError::InvalidCommand("command must be a single line"));
    }
    if command.len() > MAX_COMMAND_LEN {
        return Err(ShellError::InvalidCommand("command is too long"));
    }
    Ok(())
}

async fn pump_stdout<R>(stdout: R, bus: Arc<LineBus>, codec: TextCodec, echo: bool)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = codec.decode_line(&buf);
                if echo && !line.trim().is_empty() {
                    display::print_game_line(&line);
                }
                tracing::debug!(target: "prism::game", "{line}");
                bus.push(line);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read game stdout");
                break;
            }
        }
    }

    tracing::debug!("Game stdout closed");
}

async fn pump_stderr<R>(stderr: R, codec: TextCodec)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();

    while let Ok(n) = reader.read_until(b'\n', &mut buf).await {
        if n == 0 {
            break;
        }
        let line = codec.decode_line(&buf);
        if !line.trim().is_empty() {
            tracing::warn!(target: "prism::game", "{line}");
        }
        buf.clear();
    }
}
