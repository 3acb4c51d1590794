use std::sync::Arc;
use std::time::Duration;

use prism::bus::{LineBus, LineRecord};

#[tokio::test]
async fn test_drain_sees_every_line_once_while_probing() {
    let bus = Arc::new(LineBus::new());

    let drain = {
        let bus = Arc::clone(&bus);
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while seen.len() < 200 {
                seen.push(bus.next_line().await.into_text());
            }
            seen
        })
    };

    let producer = {
        let bus = Arc::clone(&bus);
        tokio::spawn(async move {
            for i in 0..200 {
                bus.push(format!("line {i}"));
                if i % 17 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    for _ in 0..10 {
        let probe = bus.lock_probe().await;
        let first = probe.peek(5);
        let second = probe.peek(5);
        assert_eq!(first, second);
        drop(probe);
        tokio::task::yield_now().await;
    }

    producer.await.unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(5), drain)
        .await
        .unwrap()
        .unwrap();

    let expected: Vec<String> = (0..200).map(|i| format!("line {i}")).collect();
    assert_eq!(seen, expected);
    assert_eq!(bus.retained(), 0);
}

#[tokio::test]
async fn test_probe_peek_is_bounded_and_unpadded() {
    let bus = LineBus::new();
    bus.push("a");
    bus.push("b");

    let probe = bus.lock_probe().await;
    let lines: Vec<String> = probe.peek(10).into_iter().map(LineRecord::into_text).collect();
    assert_eq!(lines, vec!["a", "b"]);
    assert_eq!(probe.peek(1).len(), 1);
    assert!(probe.peek(0).is_empty());
}

#[tokio::test]
async fn test_probe_sees_lines_pushed_after_lock() {
    let bus = LineBus::new();
    let probe = bus.lock_probe().await;
    assert!(probe.peek(3).is_empty());

    bus.push("There are 0 of a max of 20 players online:");
    let lines = probe.peek(3);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].seq(), probe.cursor());
}
