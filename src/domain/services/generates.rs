#[cfg(test)]
#[path = "generates_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::models::ChatError;
use crate::domain::models::Generation;
use crate::domain::models::GenerationKind;

/// Conversations with a generation in flight, with the text received so far.
/// A missing id means nothing is generating for it.
#[derive(Clone, Debug, Default)]
pub struct Generates {
    entries: Arc<DashMap<String, Generation>>,
}

impl Generates {
    /// Registers a generation for `id`. The entry lives as long as the
    /// returned guard.
    pub fn start(&self, id: &str, kind: GenerationKind) -> Result<GenerationGuard> {
        match self.entries.entry(id.to_string()) {
            Entry::Occupied(_) => {
                return Err(ChatError::AlreadyGenerating(id.to_string()).into());
            }
            Entry::Vacant(entry) => {
                entry.insert(Generation {
                    kind,
                    text: "".to_string(),
                });
            }
        }

        return Ok(GenerationGuard {
            id: id.to_string(),
            generates: self.clone(),
        });
    }

    pub fn is_generating(&self, id: &str) -> bool {
        return self.entries.contains_key(id);
    }

    pub fn get(&self, id: &str) -> Option<Generation> {
        return self.entries.get(id).map(|entry| return entry.value().clone());
    }

    pub fn text(&self, id: &str) -> Option<String> {
        return self.get(id).map(|generation| return generation.text);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }
}

#[derive(Debug)]
pub struct GenerationGuard {
    id: String,
    generates: Generates,
}

impl GenerationGuard {
    /// Replaces the accumulated text for the guarded conversation.
    pub fn publish(&self, text: &str) {
        if let Some(mut entry) = self.generates.entries.get_mut(&self.id) {
            entry.text = text.to_string();
        }
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.generates.entries.remove(&self.id);
    }
}
