//! Configuration types.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::event::EventKind;
use crate::shell::resolve_encoding;

/// Base log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[serde(alias = "debug")]
    Debug,
    #[default]
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "warn", alias = "WARNING", alias = "warning")]
    Warn,
    #[serde(alias = "error")]
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// The level `steps` notches more verbose, saturating at debug.
    #[must_use]
    pub fn raised(self, steps: u8) -> Self {
        let mut level = self;
        for _ in 0..steps {
            level = match level {
                Self::Error => Self::Warn,
                Self::Warn => Self::Info,
                Self::Info | Self::Debug => Self::Debug,
            };
        }
        level
    }
}

/// Game process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Command line that starts the game server.
    pub start_cmd: String,
    /// Command sent to the game to request a clean shutdown.
    pub stop_cmd: String,
    /// Encoding of the game's stdout.
    pub read_encoding: String,
    /// Encoding of commands written to the game's stdin.
    pub write_encoding: String,
    /// Working directory for the game process.
    pub working_dir: Option<PathBuf>,
    /// Render game output on the terminal.
    pub echo_output: bool,
    /// Start the game when prism starts.
    pub autostart: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            start_cmd: "java -Xms1G -Xmx2G -jar server.jar nogui".to_string(),
            stop_cmd: "stop".to_string(),
            read_encoding: "utf-8".to_string(),
            write_encoding: "utf-8".to_string(),
            working_dir: None,
            echo_output: true,
            autostart: true,
        }
    }
}

/// HTTP command surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
    /// Tag echoed in every response.
    pub tag: String,
    /// Allow any origin.
    pub cors_permissive: bool,
    /// Path of the game's `usercache.json`.
    pub usercache: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "127.0.0.1".to_string(),
            port: 8000,
            tag: "prism".to_string(),
            cors_permissive: false,
            usercache: PathBuf::from("usercache.json"),
        }
    }
}

/// One outbound webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Per-kind switch; kinds absent or `false` are not forwarded.
    #[serde(default)]
    pub event: HashMap<String, bool>,
}

fn default_tag() -> String {
    "prism".to_string()
}

impl WebhookConfig {
    /// Kinds switched on for this webhook.
    #[must_use]
    pub fn allowed_kinds(&self) -> HashSet<EventKind> {
        self.event
            .iter()
            .filter(|(_, enabled)| **enabled)
            .filter_map(|(name, _)| name.parse().ok())
            .collect()
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrismConfig {
    pub level: LogLevel,
    /// Also write logs to this file.
    pub log_file: Option<PathBuf>,
    pub shell: ShellConfig,
    pub api: ApiConfig,
    pub webhooks: Vec<WebhookConfig>,
}

impl PrismConfig {
    /// Check values that deserialize fine but cannot work.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shell.start_cmd.trim().is_empty() {
            return Err(ConfigError::Invalid("shell.start_cmd is empty".to_string()));
        }
        for (field, label) in [
            ("shell.read_encoding", &self.shell.read_encoding),
            ("shell.write_encoding", &self.shell.write_encoding),
        ] {
            if resolve_encoding(label).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{field}: unknown encoding {label:?}"
                )));
            }
        }
        for (index, webhook) in self.webhooks.iter().enumerate() {
            if webhook.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("webhooks[{index}].url is empty")));
            }
            for name in webhook.event.keys() {
                if let Err(e) = name.parse::<EventKind>() {
                    return Err(ConfigError::Invalid(format!("webhooks[{index}].event: {e}")));
                }
            }
        }
        Ok(())
    }
}
