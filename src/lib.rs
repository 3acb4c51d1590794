//! Prism - game server supervisor with a command API and event webhooks.

pub mod api;
pub mod app;
pub mod bus;
pub mod config;
pub mod display;
pub mod event;
pub mod shell;
pub mod webhook;
