use anyhow::bail;
use anyhow::Result;
use dashmap::DashMap;

use crate::domain::models::Storage;

/// In-process storage for tests. `failing` makes every save error.
#[derive(Default)]
pub struct MemoryStorage {
    pub values: DashMap<String, String>,
    pub failing: bool,
}

impl MemoryStorage {
    pub fn with(key: &str, value: &str) -> MemoryStorage {
        let storage = MemoryStorage::default();
        storage.values.insert(key.to_string(), value.to_string());
        return storage;
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        return Ok(self.values.get(key).map(|val| return val.to_string()));
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        if self.failing {
            bail!("disk full");
        }

        self.values.insert(key.to_string(), value.to_string());
        return Ok(());
    }
}
