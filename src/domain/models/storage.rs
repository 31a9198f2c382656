use std::sync::Arc;

use anyhow::Result;

/// String key-value store backing everything the app persists.
pub trait Storage {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

pub type SharedStorage = Arc<dyn Storage + Send + Sync>;
