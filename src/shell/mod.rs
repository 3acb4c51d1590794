//! Game server process supervision.

mod codec;
mod console;
mod handler;
mod process;
mod supervisor;

pub use codec::*;
pub use console::*;
pub use handler::*;
pub use process::*;
pub use supervisor::*;
