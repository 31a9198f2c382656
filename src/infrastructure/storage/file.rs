#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

use std::fs;
use std::path;

use anyhow::Result;

use crate::domain::models::Storage;

/// Keeps every key in its own file under one directory. Writes replace the
/// whole file and block the calling thread until they are done, so a saved
/// mutation is on disk before the caller moves on.
pub struct FileStorage {
    pub dir: path::PathBuf,
}

impl Default for FileStorage {
    fn default() -> FileStorage {
        let dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ochat");

        return FileStorage::new(dir);
    }
}

impl FileStorage {
    pub fn new(dir: path::PathBuf) -> FileStorage {
        return FileStorage { dir };
    }

    fn get_file_path(&self, key: &str) -> path::PathBuf {
        return self.dir.join(key);
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let file_path = self.get_file_path(key);
        if !file_path.exists() {
            return Ok(None);
        }

        return Ok(Some(fs::read_to_string(file_path)?));
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        fs::write(self.get_file_path(key), value)?;
        tracing::debug!(key, bytes = value.len(), "saved");

        return Ok(());
    }
}
