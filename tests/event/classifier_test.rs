use prism::event::{EventClassifier, EventKind, EventPayload};
use prism::shell::TERMINATION_SENTINEL;

fn classifier() -> EventClassifier {
    EventClassifier::new(TERMINATION_SENTINEL).unwrap()
}

#[test]
fn test_vanilla_server_log() {
    let log = [
        "[12:00:00] [Server thread/INFO]: Starting minecraft server version 1.20.4",
        "[12:00:03] [Server thread/INFO]: Done (3.5s)! For help, type \"help\"",
        "[12:01:00] [Server thread/INFO]: Steve joined the game",
        "[12:01:05] [Server thread/INFO]: <Steve> hello world",
        "[12:02:00] [Server thread/INFO]: Steve has made the advancement [Getting Wood]",
        "[12:03:00] [Server thread/INFO]: Steve left the game",
        "[12:04:00] [Server thread/INFO]: Stopping server",
        TERMINATION_SENTINEL,
    ];

    let c = classifier();
    let kinds: Vec<EventKind> = log
        .iter()
        .filter_map(|line| c.classify(line))
        .map(|event| event.kind())
        .collect();

    assert_eq!(
        kinds,
        vec![
            EventKind::ServerStart,
            EventKind::PlayerJoin,
            EventKind::PlayerChat,
            EventKind::PlayerAdvancement,
            EventKind::PlayerQuit,
            EventKind::ServerStop,
        ]
    );
}

#[test]
fn test_chat_message_keeps_inner_brackets() {
    assert_eq!(
        classifier().classify_payload("[12:00:00] [Server thread/INFO]: <Alex> look -> <here>"),
        Some(EventPayload::PlayerChat {
            player: "Alex".to_string(),
            message: "look -> <here>".to_string(),
        })
    );
}

#[test]
fn test_lines_without_prefix_are_ignored() {
    let c = classifier();
    assert!(c.classify("Steve joined the game").is_none());
    assert!(c.classify("<Steve> hi").is_none());
}
