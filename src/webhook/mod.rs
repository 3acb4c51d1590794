//! Outbound webhooks.

mod forwarder;

pub use forwarder::*;
