mod app_state;
mod connection_monitor;
mod conversations;
mod generates;
mod generation;
mod preferences;
mod voice;

pub use app_state::*;
pub use connection_monitor::*;
pub use conversations::*;
pub use generates::*;
pub use generation::*;
pub use preferences::*;
pub use voice::*;
