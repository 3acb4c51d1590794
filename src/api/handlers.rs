//! HTTP handlers for the command API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::Value;

use super::{ApiResponse, CmdRequest, TellrawRequest};
use crate::shell::{ShellError, ShellSupervisor};

/// Lines inspected when looking for the `list` reply.
const LIST_PROBE_LINES: usize = 5;

/// Response window for `list`.
const LIST_WAIT: Duration = Duration::from_secs(1);

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub shell: Arc<ShellSupervisor>,
    /// Tag echoed in every response.
    pub tag: Arc<str>,
    /// Path of the game's `usercache.json`.
    pub usercache: PathBuf,
}

impl AppState {
    #[must_use]
    pub fn new(shell: Arc<ShellSupervisor>, tag: &str, usercache: impl Into<PathBuf>) -> Self {
        Self {
            shell,
            tag: Arc::from(tag),
            usercache: usercache.into(),
        }
    }

    fn failure(&self, err: &ShellError) -> ApiResponse {
        match err {
            ShellError::NotRunning => ApiResponse::new(406, "game stop", &self.tag),
            ShellError::InvalidCommand(reason) => ApiResponse::new(400, *reason, &self.tag),
            other => {
                tracing::warn!(error = %other, "Command failed");
                ApiResponse::new(500, other.to_string(), &self.tag)
            }
        }
    }

    fn bad_request(&self, rejection: &JsonRejection) -> ApiResponse {
        tracing::debug!(error = %rejection, "Rejected request body");
        ApiResponse::new(400, "invalid json", &self.tag)
    }
}

/// Extract the player list from a `list` reply line.
///
/// `There are 2 of a max of 20 players online: Steve, Alex` yields
/// `["Steve", "Alex"]`. Returns `None` if the line is not a `list` reply.
#[must_use]
pub fn parse_player_list(line: &str) -> Option<Vec<String>> {
    let (_, players) = line.split_once("online:")?;
    let players = players.trim();
    if players.is_empty() {
        return Some(Vec::new());
    }
    Some(players.split(", ").map(|p| p.trim().to_string()).collect())
}

/// Build a `tellraw` command carrying `message` as JSON text.
#[must_use]
pub fn tellraw_command(selector: &str, message: &str) -> String {
    format!("tellraw {selector} {}", serde_json::json!({ "text": message }))
}

/// GET / - Health check.
pub async fn get_root(State(state): State<AppState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(&state.tag))
}

/// POST /cmd - Send a command and read back its response window.
pub async fn post_cmd(
    State(state): State<AppState>,
    payload: Result<Json<CmdRequest>, JsonRejection>,
) -> Json<ApiResponse> {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return Json(state.bad_request(&rejection)),
    };
    let Some(cmd) = req.cmd.as_deref() else {
        return Json(ApiResponse::new(400, "no cmd", &state.tag));
    };

    let (wait, num) = (req.wait_duration(), req.line_count());
    tracing::info!(cmd, ?wait, num, "POST /cmd");

    let response = match state.shell.probe(cmd, wait, num).await {
        Ok(lines) => ApiResponse::success(&state.tag).with("list", lines),
        Err(e) => state.failure(&e),
    };
    Json(response)
}

/// GET /list - Online players.
pub async fn get_list(State(state): State<AppState>) -> Json<ApiResponse> {
    tracing::info!("GET /list");

    let lines = match state.shell.probe("list", LIST_WAIT, LIST_PROBE_LINES).await {
        Ok(lines) => lines,
        Err(e) => return Json(state.failure(&e)),
    };

    let response = match lines.iter().find_map(|line| parse_player_list(line)) {
        Some(players) => ApiResponse::success(&state.tag)
            .with("num", players.len())
            .with("player_list", players),
        None => {
            tracing::warn!(?lines, "No player list in game output");
            ApiResponse::new(502, "no response", &state.tag)
        }
    };
    Json(response)
}

/// POST /tellraw - Broadcast a chat message.
pub async fn post_tellraw(
    State(state): State<AppState>,
    payload: Result<Json<TellrawRequest>, JsonRejection>,
) -> Json<ApiResponse> {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return Json(state.bad_request(&rejection)),
    };
    let Some(message) = req.message.as_deref() else {
        return Json(ApiResponse::new(400, "no message", &state.tag));
    };

    let command = tellraw_command(req.selector(), message);
    tracing::info!(%command, "POST /tellraw");

    let response = match state.shell.send_command(&command).await {
        Ok(()) => ApiResponse::success(&state.tag),
        Err(e) => state.failure(&e),
    };
    Json(response)
}

/// GET /usercache - Contents of the game's user cache.
pub async fn get_usercache(State(state): State<AppState>) -> Json<ApiResponse> {
    tracing::info!(path = %state.usercache.display(), "GET /usercache");

    let parsed = match tokio::fs::read_to_string(&state.usercache).await {
        Ok(content) => serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let response = match parsed {
        Ok(usercache) => ApiResponse::success(&state.tag).with("usercache", usercache),
        Err(e) => {
            tracing::warn!(path = %state.usercache.display(), error = %e, "Failed to load usercache");
            ApiResponse::new(500, "usercache unavailable", &state.tag)
        }
    };
    Json(response)
}
