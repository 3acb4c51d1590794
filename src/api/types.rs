//! Request and response types for the command API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound on lines returned by one `/cmd` call.
pub const MAX_PROBE_LINES: usize = 1000;

/// Upper bound on the `/cmd` response window, in seconds.
pub const MAX_WAIT_SECS: f64 = 60.0;

/// Response window used when `wait_time` is absent or unusable.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);

/// Envelope shared by every API response.
///
/// `status` mirrors an HTTP status code but the envelope itself is always
/// served with HTTP 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub msg: String,
    pub data: Map<String, Value>,
}

impl ApiResponse {
    /// Create a response whose `data` holds only the tag.
    #[must_use]
    pub fn new(status: u16, msg: impl Into<String>, tag: &str) -> Self {
        let mut data = Map::new();
        data.insert("tag".to_string(), Value::String(tag.to_string()));
        Self {
            status,
            msg: msg.into(),
            data,
        }
    }

    #[must_use]
    pub fn success(tag: &str) -> Self {
        Self::new(200, "success", tag)
    }

    /// Add a field to `data` (builder pattern).
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// Body of `POST /cmd`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmdRequest {
    pub cmd: Option<String>,
    /// Number of lines to read back.
    pub num: Option<i64>,
    /// Response window in seconds.
    pub wait_time: Option<f64>,
}

impl CmdRequest {
    /// Lines to read back: default 1, at least 1, capped at [`MAX_PROBE_LINES`].
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.num
            .map_or(1, |n| usize::try_from(n.max(1)).unwrap_or(MAX_PROBE_LINES))
            .min(MAX_PROBE_LINES)
    }

    /// Response window: default 1 s, negatives clamp to zero, capped at
    /// [`MAX_WAIT_SECS`].
    #[must_use]
    pub fn wait_duration(&self) -> Duration {
        self.wait_time.map_or(DEFAULT_WAIT, |secs| {
            Duration::try_from_secs_f64(secs.clamp(0.0, MAX_WAIT_SECS)).unwrap_or(DEFAULT_WAIT)
        })
    }
}

/// Body of `POST /tellraw`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TellrawRequest {
    pub message: Option<String>,
    pub selector: Option<String>,
}

impl TellrawRequest {
    /// Target selector, `@a` when absent or blank.
    #[must_use]
    pub fn selector(&self) -> &str {
        self.selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("@a")
    }
}
