#[cfg(test)]
#[path = "preferences_test.rs"]
mod tests;

use anyhow::Result;

use crate::domain::models::SharedStorage;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:11435";

const VISITED_KEY: &str = "VISITED";
const MODEL_KEY: &str = "OLLAMA_MODEL";
const VISION_MODEL_KEY: &str = "OLLAMA_VISION_MODEL";
const API_URL_KEY: &str = "OLLAMA_LOCAL_API";
const CURRENT_ID_KEY: &str = "CURRENT_CHAT_ID";

/// Small persisted settings, stored as strings next to the conversations.
/// Read failures fall back to the default value.
#[derive(Clone)]
pub struct Preferences {
    storage: SharedStorage,
}

impl Preferences {
    pub fn new(storage: SharedStorage) -> Preferences {
        return Preferences { storage };
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.storage.load(key) {
            Ok(Some(val)) if !val.is_empty() => return Some(val),
            Ok(_) => return None,
            Err(err) => {
                tracing::error!(key, error = ?err, "Failed to read preference");
                return None;
            }
        }
    }

    pub fn visited(&self) -> bool {
        return self.get(VISITED_KEY).as_deref() == Some("true");
    }

    pub fn set_visited(&self, visited: bool) -> Result<()> {
        return self.storage.save(VISITED_KEY, &visited.to_string());
    }

    pub fn model(&self) -> Option<String> {
        return self.get(MODEL_KEY);
    }

    pub fn set_model(&self, model: &str) -> Result<()> {
        return self.storage.save(MODEL_KEY, model);
    }

    pub fn vision_model(&self) -> Option<String> {
        return self.get(VISION_MODEL_KEY);
    }

    pub fn set_vision_model(&self, model: &str) -> Result<()> {
        return self.storage.save(VISION_MODEL_KEY, model);
    }

    pub fn api_url(&self) -> String {
        return self
            .get(API_URL_KEY)
            .unwrap_or_else(|| return DEFAULT_API_URL.to_string());
    }

    pub fn set_api_url(&self, url: &str) -> Result<()> {
        return self.storage.save(API_URL_KEY, url);
    }

    pub fn current_id(&self) -> Option<String> {
        return self.get(CURRENT_ID_KEY);
    }

    pub fn set_current_id(&self, id: &str) -> Result<()> {
        return self.storage.save(CURRENT_ID_KEY, id);
    }
}
