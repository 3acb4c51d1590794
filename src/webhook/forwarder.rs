//! Event forwarding to HTTP webhooks.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::WebhookConfig;
use crate::event::{DeliveryError, Event, EventKind, EventSubscriber};

/// Connection timeout for webhook requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Overall request timeout for webhook requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from webhook setup.
#[derive(thiserror::Error, Debug)]
pub enum WebhookError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Posts allowed events to one webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookForwarder {
    url: String,
    tag: String,
    allowed: HashSet<EventKind>,
    client: Client,
}

impl WebhookForwarder {
    /// Create a forwarder for one configured webhook.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::ClientBuild` if the HTTP client cannot be built.
    pub fn new(config: &WebhookConfig) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            url: config.url.clone(),
            tag: config.tag.clone(),
            allowed: config.allowed_kinds(),
            client,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request body for `event`: the event fields merged into `data`
    /// alongside the tag.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Encode` if the event cannot be serialized.
    pub fn payload(&self, event: &Event) -> Result<Value, WebhookError> {
        let mut data = serde_json::Map::new();
        data.insert("tag".to_string(), Value::String(self.tag.clone()));
        if let Value::Object(fields) = serde_json::to_value(event)? {
            data.extend(fields);
        }

        Ok(json!({
            "status": 200,
            "msg": "event",
            "data": data,
        }))
    }
}

#[async_trait]
impl EventSubscriber for WebhookForwarder {
    fn name(&self) -> &str {
        &self.url
    }

    fn accepts(&self, kind: EventKind) -> bool {
        self.allowed.contains(&kind)
    }

    async fn deliver(&self, event: &Event) -> Result<(), DeliveryError> {
        let body = self.payload(event).map_err(|e| match e {
            WebhookError::Encode(e) => DeliveryError::Encode(e),
            other => DeliveryError::Transport(other.to_string()),
        })?;

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected(status.as_u16()));
        }

        tracing::debug!(url = %self.url, kind = %event.kind(), "Webhook delivered");
        Ok(())
    }
}
