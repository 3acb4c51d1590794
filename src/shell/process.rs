//! Game server process spawning and control.
//!
//! The configured start command runs under a shell wrapper that prints a
//! termination sentinel after the command exits, so the output reader can
//! tell "the game exited on its own" apart from a quiet but live server.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

/// Marker line printed by the wrapper once the game process exits.
pub const TERMINATION_SENTINEL: &str = "PRISM CLOSE SIGNAL";

/// Default time to wait for the process to be reaped after a kill.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The shell used to run the start command was not found.
    #[error("Shell not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// A standard stream was not captured.
    #[error("Process {0} not available")]
    MissingPipe(&'static str),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SpawnError {
    fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Builder for the wrapped game server command.
#[derive(Debug, Clone)]
pub struct GameProcessBuilder {
    start_cmd: String,
    working_dir: Option<PathBuf>,
}

impl GameProcessBuilder {
    /// Create a builder for the given start command.
    #[must_use]
    pub fn new(start_cmd: impl Into<String>) -> Self {
        Self {
            start_cmd: start_cmd.into(),
            working_dir: None,
        }
    }

    /// Set the working directory for the game process.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn start_cmd(&self) -> &str {
        &self.start_cmd
    }

    /// The shell script actually executed: the start command followed by
    /// an unconditional echo of the sentinel.
    #[must_use]
    pub fn wrapped_command(&self) -> String {
        if cfg!(windows) {
            format!("{} & echo {TERMINATION_SENTINEL}", self.start_cmd)
        } else {
            format!("{}; echo {TERMINATION_SENTINEL}", self.start_cmd)
        }
    }

    fn build_command(&self) -> Command {
        #[cfg(unix)]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(self.wrapped_command());
            // Own process group so a kill reaches the game, not just the shell.
            cmd.process_group(0);
            cmd
        };

        #[cfg(not(unix))]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(self.wrapped_command());
            cmd
        };

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        cmd
    }
}

/// A running game server process.
///
/// The standard streams are taken out right after spawning so that writes
/// and reads never contend with `kill` for the handle.
#[derive(Debug)]
pub struct GameProcess {
    child: Child,
}

impl GameProcess {
    /// Spawn the wrapped start command.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(builder: &GameProcessBuilder) -> Result<Self, SpawnError> {
        let child = builder.build_command().spawn().map_err(SpawnError::from_io)?;
        Ok(Self { child })
    }

    /// Take ownership of the stdin handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Forcefully terminate the process and reap it.
    ///
    /// A process that is already gone is not an error. If reaping takes
    /// longer than `timeout` the process is left to `kill_on_drop`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent or waiting fails.
    pub async fn kill(&mut self, timeout: Duration) -> io::Result<()> {
        #[cfg(unix)]
        self.signal_group();

        match self.child.start_kill() {
            Ok(()) => {}
            Err(e) if is_already_gone(&e) => {
                tracing::debug!("Game process already exited");
            }
            Err(e) => return Err(e),
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(?status, "Game process reaped");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "Timed out waiting for game process to exit");
                Ok(())
            }
        }
    }

    #[cfg(unix)]
    fn signal_group(&self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            return;
        };
        let pgid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::warn!(pid, error = %e, "Failed to signal game process group"),
        }
    }
}

fn is_already_gone(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::InvalidInput {
        return true;
    }

    #[cfg(unix)]
    {
        err.raw_os_error() == Some(nix::errno::Errno::ESRCH as i32)
    }

    #[cfg(not(unix))]
    {
        false
    }
}
