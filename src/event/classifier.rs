//! Ordered rules mapping output lines to domain events.
//!
//! Rules are checked in priority order and the first rule that yields a
//! payload wins. Lines matching no rule produce nothing.

use regex::{Captures, Regex};

use super::{Event, EventKind, EventPayload};

const SERVER_START_PATTERN: &str = r#"\]: Done \((.*?)s\)! For help, type "help""#;
const PLAYER_JOIN_PATTERN: &str = r"\]: (.*?) joined the game";
const PLAYER_QUIT_PATTERN: &str = r"\]: (.*?) left the game";
const PLAYER_CHAT_PATTERN: &str = r"\]: <(.*?)> (.*)$";
const PLAYER_ADVANCEMENT_PATTERN: &str = r"\]: (.*?) has.*\[(.*?)\]";

/// Error type for classifier construction.
#[derive(thiserror::Error, Debug)]
pub enum ClassifierError {
    /// Invalid regex pattern.
    #[error("Invalid classifier pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

#[derive(Debug, Clone)]
enum Matcher {
    Pattern(Regex),
    Literal(String),
}

/// A single classification rule producing events of one kind.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    kind: EventKind,
    matcher: Matcher,
}

impl ClassifierRule {
    /// Create a rule matching a regex. Capture groups feed the payload fields
    /// in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::InvalidPattern` if the regex is invalid.
    pub fn pattern(kind: EventKind, pattern: &str) -> Result<Self, ClassifierError> {
        Ok(Self {
            kind,
            matcher: Matcher::Pattern(Regex::new(pattern)?),
        })
    }

    /// Create a rule matching a literal substring.
    #[must_use]
    pub fn literal(kind: EventKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            matcher: Matcher::Literal(text.into()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Apply the rule to a line.
    #[must_use]
    pub fn apply(&self, line: &str) -> Option<EventPayload> {
        match &self.matcher {
            Matcher::Literal(text) => {
                if line.contains(text.as_str()) {
                    build_payload(self.kind, None)
                } else {
                    None
                }
            }
            Matcher::Pattern(regex) => {
                let captures = regex.captures(line)?;
                build_payload(self.kind, Some(&captures))
            }
        }
    }
}

fn build_payload(kind: EventKind, captures: Option<&Captures<'_>>) -> Option<EventPayload> {
    let group = |index: usize| {
        captures
            .and_then(|c| c.get(index))
            .map(|m| m.as_str().to_string())
    };

    match kind {
        EventKind::ServerStart => {
            let raw = group(1)?;
            match raw.trim().parse::<f64>() {
                Ok(start_use_time) => Some(EventPayload::ServerStart { start_use_time }),
                Err(e) => {
                    tracing::debug!(value = %raw, error = %e, "Unparseable start time");
                    None
                }
            }
        }
        EventKind::ServerStop => Some(EventPayload::ServerStop),
        EventKind::PlayerJoin => Some(EventPayload::PlayerJoin { player: group(1)? }),
        EventKind::PlayerQuit => Some(EventPayload::PlayerQuit { player: group(1)? }),
        EventKind::PlayerChat => Some(EventPayload::PlayerChat {
            player: group(1)?,
            message: group(2)?,
        }),
        EventKind::PlayerAdvancement => Some(EventPayload::PlayerAdvancement {
            player: group(1)?,
            advancement: group(2)?,
        }),
    }
}

/// Stateless line-to-event classifier.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    rules: Vec<ClassifierRule>,
}

impl EventClassifier {
    /// Build the standard rule set. `sentinel` is the termination marker the
    /// supervisor appends to output when the game process exits.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::InvalidPattern` if a built-in pattern fails to compile.
    pub fn new(sentinel: &str) -> Result<Self, ClassifierError> {
        Ok(Self {
            rules: vec![
                ClassifierRule::pattern(EventKind::ServerStart, SERVER_START_PATTERN)?,
                ClassifierRule::literal(EventKind::ServerStop, sentinel),
                ClassifierRule::pattern(EventKind::PlayerJoin, PLAYER_JOIN_PATTERN)?,
                ClassifierRule::pattern(EventKind::PlayerQuit, PLAYER_QUIT_PATTERN)?,
                ClassifierRule::pattern(EventKind::PlayerChat, PLAYER_CHAT_PATTERN)?,
                ClassifierRule::pattern(EventKind::PlayerAdvancement, PLAYER_ADVANCEMENT_PATTERN)?,
            ],
        })
    }

    /// Rules in priority order.
    #[must_use]
    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Classify a line into a payload, without a timestamp.
    #[must_use]
    pub fn classify_payload(&self, line: &str) -> Option<EventPayload> {
        self.rules.iter().find_map(|rule| rule.apply(line))
    }

    /// Classify a line into an event stamped with the current time.
    #[must_use]
    pub fn classify(&self, line: &str) -> Option<Event> {
        self.classify_payload(line).map(Event::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: &str = "PRISM CLOSE SIGNAL";

    fn classifier() -> EventClassifier {
        EventClassifier::new(SENTINEL).unwrap()
    }

    #[test]
    fn test_rule_order() {
        let kinds: Vec<EventKind> = classifier().rules().iter().map(ClassifierRule::kind).collect();
        assert_eq!(kinds, EventKind::ALL.to_vec());
    }

    #[test]
    fn test_server_start() {
        let payload = classifier().classify_payload(
            r#"[12:00:00] [Server thread/INFO]: Done (3.5s)! For help, type "help""#,
        );
        assert_eq!(payload, Some(EventPayload::ServerStart { start_use_time: 3.5 }));
    }

    #[test]
    fn test_server_start_with_bad_number_is_not_an_event() {
        let payload = classifier().classify_payload(
            r#"[12:00:00] [Server thread/INFO]: Done (fast s)! For help, type "help""#,
        );
        assert_eq!(payload, None);
    }

    #[test]
    fn test_sentinel_is_server_stop() {
        assert_eq!(
            classifier().classify_payload(SENTINEL),
            Some(EventPayload::ServerStop)
        );
    }

    #[test]
    fn test_player_join_and_quit() {
        let c = classifier();
        assert_eq!(
            c.classify_payload("[12:00:00] [Server thread/INFO]: Steve joined the game"),
            Some(EventPayload::PlayerJoin {
                player: "Steve".to_string()
            })
        );
        assert_eq!(
            c.classify_payload("[12:00:00] [Server thread/INFO]: Steve left the game"),
            Some(EventPayload::PlayerQuit {
                player: "Steve".to_string()
            })
        );
    }

    #[test]
    fn test_player_chat() {
        assert_eq!(
            classifier().classify_payload("[12:00:00] [Server thread/INFO]: <Steve> hello world"),
            Some(EventPayload::PlayerChat {
                player: "Steve".to_string(),
                message: "hello world".to_string(),
            })
        );
    }

    #[test]
    fn test_player_advancement() {
        assert_eq!(
            classifier().classify_payload(
                "[12:00:00] [Server thread/INFO]: Alex has made the advancement [Stone Age]"
            ),
            Some(EventPayload::PlayerAdvancement {
                player: "Alex".to_string(),
                advancement: "Stone Age".to_string(),
            })
        );
    }

    #[test]
    fn test_first_match_wins() {
        // Join is checked before chat.
        assert_eq!(
            classifier().classify_payload("[12:00:00] [Server thread/INFO]: <Steve> I joined the game"),
            Some(EventPayload::PlayerJoin {
                player: "<Steve> I".to_string()
            })
        );
    }

    #[test]
    fn test_unmatched_line() {
        let c = classifier();
        assert_eq!(c.classify_payload("[12:00:00] [Server thread/INFO]: Preparing spawn area: 83%"), None);
        assert_eq!(c.classify_payload(""), None);
    }

    #[test]
    fn test_classify_stamps_time() {
        let event = classifier()
            .classify("[12:00:00] [Server thread/INFO]: Steve joined the game")
            .unwrap();
        assert_eq!(event.kind(), EventKind::PlayerJoin);
        assert!(event.time <= chrono::Utc::now());
    }

    #[test]
    fn test_invalid_pattern() {
        let result = ClassifierRule::pattern(EventKind::PlayerJoin, "(unclosed");
        assert!(matches!(result, Err(ClassifierError::InvalidPattern(_))));
    }
}
