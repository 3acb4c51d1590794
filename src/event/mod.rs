//! Event classification and fan-out.

mod classifier;
mod fanout;
mod pipeline;
mod sink;
mod types;

pub use classifier::*;
pub use fanout::*;
pub use pipeline::*;
pub use sink::*;
pub use types::*;
