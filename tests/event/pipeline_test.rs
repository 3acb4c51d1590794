use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use prism::bus::LineBus;
use prism::event::{
    run_subscriber, DeliveryError, Event, EventClassifier, EventKind, EventPayload, EventPipeline,
    EventSink, EventSubscriber,
};
use prism::shell::{LineHandler, TERMINATION_SENTINEL};

struct Collector {
    allowed: HashSet<EventKind>,
    events: Mutex<Vec<Event>>,
}

impl Collector {
    fn new(allowed: &[EventKind]) -> Self {
        Self {
            allowed: allowed.iter().copied().collect(),
            events: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EventSubscriber for Collector {
    fn name(&self) -> &str {
        "collector"
    }

    fn accepts(&self, kind: EventKind) -> bool {
        self.allowed.contains(&kind)
    }

    async fn deliver(&self, event: &Event) -> Result<(), DeliveryError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_pipeline_fans_out_to_independent_subscribers() {
    let sink = Arc::new(EventSink::new());
    let joins_only = sink.subscribe();
    let everything = sink.subscribe();
    let pipeline = EventPipeline::new(
        EventClassifier::new(TERMINATION_SENTINEL).unwrap(),
        Arc::clone(&sink),
    );

    let bus = LineBus::new();
    for line in [
        "[12:00:00] [Server thread/INFO]: <Steve> hi",
        "[12:00:01] [Server thread/INFO]: Alex joined the game",
        "[12:00:02] [Server thread/INFO]: Saving chunks",
        TERMINATION_SENTINEL,
    ] {
        bus.push(line);
    }
    while let Some(line) = bus.try_next_line() {
        pipeline.on_line(&line).await;
    }
    drop(pipeline);
    drop(sink);

    let join_collector = Collector::new(&[EventKind::PlayerJoin]);
    let all_collector = Collector::new(&EventKind::ALL);
    let (join_stats, all_stats) = tokio::join!(
        run_subscriber(&join_collector, joins_only),
        run_subscriber(&all_collector, everything),
    );

    assert_eq!(join_stats.delivered, 1);
    assert_eq!(join_stats.skipped, 2);
    assert_eq!(all_stats.delivered, 3);

    let joins = join_collector.events.lock();
    assert_eq!(
        joins[0].payload,
        EventPayload::PlayerJoin {
            player: "Alex".to_string()
        }
    );

    let kinds: Vec<EventKind> = all_collector.events.lock().iter().map(Event::kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::PlayerChat, EventKind::PlayerJoin, EventKind::ServerStop]
    );
}
