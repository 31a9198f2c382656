mod backend;
mod connection;
mod conversation;
mod error;
mod event;
mod generation;
mod model;
mod slash_commands;
mod speech;
mod storage;
mod tutorial;

pub use backend::*;
pub use connection::*;
pub use conversation::*;
pub use error::*;
pub use event::*;
pub use generation::*;
pub use model::*;
pub use slash_commands::*;
pub use speech::*;
pub use storage::*;
pub use tutorial::*;
