//! Domain events classified from game server output.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminator for [`EventPayload`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ServerStart,
    ServerStop,
    PlayerJoin,
    PlayerQuit,
    PlayerChat,
    PlayerAdvancement,
}

impl EventKind {
    /// Every kind, in classification priority order.
    pub const ALL: [Self; 6] = [
        Self::ServerStart,
        Self::ServerStop,
        Self::PlayerJoin,
        Self::PlayerQuit,
        Self::PlayerChat,
        Self::PlayerAdvancement,
    ];

    /// Wire name of the kind, as used in configuration and payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerStart => "ServerStart",
            Self::ServerStop => "ServerStop",
            Self::PlayerJoin => "PlayerJoin",
            Self::PlayerQuit => "PlayerQuit",
            Self::PlayerChat => "PlayerChat",
            Self::PlayerAdvancement => "PlayerAdvancement",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event kind name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Kind-specific event data, tagged by `type` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    /// The server finished loading.
    ServerStart {
        /// Reported startup time in seconds.
        start_use_time: f64,
    },
    /// The server process exited.
    ServerStop,
    PlayerJoin {
        player: String,
    },
    PlayerQuit {
        player: String,
    },
    PlayerChat {
        player: String,
        message: String,
    },
    PlayerAdvancement {
        player: String,
        advancement: String,
    },
}

impl EventPayload {
    /// The discriminator of this payload.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ServerStart { .. } => EventKind::ServerStart,
            Self::ServerStop => EventKind::ServerStop,
            Self::PlayerJoin { .. } => EventKind::PlayerJoin,
            Self::PlayerQuit { .. } => EventKind::PlayerQuit,
            Self::PlayerChat { .. } => EventKind::PlayerChat,
            Self::PlayerAdvancement { .. } => EventKind::PlayerAdvancement,
        }
    }

    /// The player this event concerns, if any.
    #[must_use]
    pub fn player(&self) -> Option<&str> {
        match self {
            Self::PlayerJoin { player }
            | Self::PlayerQuit { player }
            | Self::PlayerChat { player, .. }
            | Self::PlayerAdvancement { player, .. } => Some(player),
            Self::ServerStart { .. } | Self::ServerStop => None,
        }
    }
}

/// An immutable, timestamped domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the event was classified, serialized as unix seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(payload: EventPayload) -> Self {
        Self::at(Utc::now(), payload)
    }

    /// Create an event with an explicit timestamp.
    #[must_use]
    pub fn at(time: DateTime<Utc>, payload: EventPayload) -> Self {
        Self { time, payload }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
