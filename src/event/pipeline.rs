//! Line handler feeding classified events into the sink.

use std::sync::Arc;

use async_trait::async_trait;

use super::{EventClassifier, EventSink};
use crate::bus::LineRecord;
use crate::display;
use crate::shell::LineHandler;

/// Classifies each drained line and publishes the resulting event.
#[derive(Debug)]
pub struct EventPipeline {
    classifier: EventClassifier,
    sink: Arc<EventSink>,
}

impl EventPipeline {
    #[must_use]
    pub fn new(classifier: EventClassifier, sink: Arc<EventSink>) -> Self {
        Self { classifier, sink }
    }
}

#[async_trait]
impl LineHandler for EventPipeline {
    fn name(&self) -> &'static str {
        "event-pipeline"
    }

    async fn on_line(&self, line: &LineRecord) {
        let Some(event) = self.classifier.classify(line.text()) else {
            return;
        };

        display::print_event(&event);
        let subscribers = self.sink.publish(event);
        tracing::debug!(seq = line.seq(), subscribers, "Event published");
    }
}
