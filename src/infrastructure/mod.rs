pub mod backends;
pub mod players;
pub mod speech;
pub mod storage;
