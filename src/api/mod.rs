//! HTTP command surface over the game shell.

mod error;
mod handlers;
mod server;
mod types;

pub use error::ApiError;
pub use handlers::{
    get_list, get_root, get_usercache, parse_player_list, post_cmd, post_tellraw,
    tellraw_command, AppState,
};
pub use server::ApiServer;
pub use types::*;
