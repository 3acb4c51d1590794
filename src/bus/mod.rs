//! Shared buffer of game server output lines.

mod line_bus;

pub use line_bus::*;
