//! Colored terminal output for game lines and lifecycle notices.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::event::{Event, EventPayload};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// One-line human description of an event.
#[must_use]
pub fn describe_event(event: &Event) -> String {
    match &event.payload {
        EventPayload::ServerStart { start_use_time } => {
            format!("server started in {start_use_time:.3}s")
        }
        EventPayload::ServerStop => "server stopped".to_string(),
        EventPayload::PlayerJoin { player } => format!("{player} joined"),
        EventPayload::PlayerQuit { player } => format!("{player} left"),
        EventPayload::PlayerChat { player, message } => format!("<{player}> {message}"),
        EventPayload::PlayerAdvancement {
            player,
            advancement,
        } => format!("{player} earned [{advancement}]"),
    }
}

/// Print a raw line of game output.
pub fn print_game_line(line: &str) {
    println!("{} {}", "[GAME]".green().bold(), line);
    let _ = io::stdout().flush();
}

/// Print a classified event.
pub fn print_event(event: &Event) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        format!("[{}]", event.kind()).magenta().bold(),
        describe_event(event)
    );
    let _ = io::stdout().flush();
}

/// Print a prism lifecycle notice.
pub fn print_notice(message: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[PRISM]".blue().bold(),
        message
    );
    let _ = io::stdout().flush();
}

/// Print an error for the operator.
pub fn print_error(message: &str) {
    eprintln!(
        "{} {} {}",
        timestamp().dimmed(),
        "[ERROR]".red().bold(),
        message.red()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_event() {
        let start = Event::new(EventPayload::ServerStart {
            start_use_time: 3.5,
        });
        assert_eq!(describe_event(&start), "server started in 3.500s");

        let chat = Event::new(EventPayload::PlayerChat {
            player: "Steve".to_string(),
            message: "hello world".to_string(),
        });
        assert_eq!(describe_event(&chat), "<Steve> hello world");

        let adv = Event::new(EventPayload::PlayerAdvancement {
            player: "Alex".to_string(),
            advancement: "Stone Age".to_string(),
        });
        assert_eq!(describe_event(&adv), "Alex earned [Stone Age]");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
    }
}
