#[cfg(test)]
#[path = "conversations_test.rs"]
mod tests;

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use anyhow::Result;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::domain::models::ChatError;
use crate::domain::models::Conversation;
use crate::domain::models::Conversations;
use crate::domain::models::Message;
use crate::domain::models::SharedStorage;

pub const CONVERSATIONS_KEY: &str = "conversations";
pub const MAX_ID_ATTEMPTS: usize = 100;
const SCHEMA_VERSION: u32 = 1;
const ID_LENGTH: usize = 8;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    conversations: Vec<(String, Conversation)>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredConversations {
    Versioned(Snapshot),
    /// Bare entries array written before snapshots were versioned.
    Legacy(Vec<(String, Conversation)>),
}

pub fn random_key(len: usize) -> String {
    return rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect();
}

pub fn encode_conversations(conversations: &Conversations) -> Result<String> {
    let snapshot = Snapshot {
        version: SCHEMA_VERSION,
        conversations: conversations
            .iter()
            .map(|(id, conversation)| return (id.to_string(), conversation.clone()))
            .collect(),
    };

    return Ok(serde_json::to_string(&snapshot)?);
}

pub fn decode_conversations(payload: &str) -> Result<Conversations> {
    let stored: StoredConversations = serde_json::from_str(payload)
        .map_err(|err| return ChatError::StorageLoad(err.to_string()))?;

    let entries = match stored {
        StoredConversations::Versioned(snapshot) => {
            if snapshot.version != SCHEMA_VERSION {
                return Err(ChatError::StorageLoad(format!(
                    "unsupported snapshot version {}",
                    snapshot.version
                ))
                .into());
            }
            snapshot.conversations
        }
        StoredConversations::Legacy(entries) => entries,
    };

    return Ok(entries.into_iter().collect());
}

/// Every conversation, keyed by id. Each mutation writes the whole mapping
/// back to storage before returning.
pub struct ConversationStore {
    storage: SharedStorage,
    conversations: Mutex<Conversations>,
}

impl ConversationStore {
    /// Reads the persisted conversations. Missing or unreadable data yields an
    /// empty store; the failure is only logged.
    pub fn load(storage: SharedStorage) -> ConversationStore {
        let conversations = match storage.load(CONVERSATIONS_KEY) {
            Ok(Some(payload)) => decode_conversations(&payload).unwrap_or_else(|err| {
                tracing::error!(error = ?err, "Failed to load conversations");
                return Conversations::new();
            }),
            Ok(None) => Conversations::new(),
            Err(err) => {
                tracing::error!(error = ?err, "Failed to read conversations");
                Conversations::new()
            }
        };

        return ConversationStore {
            storage,
            conversations: Mutex::new(conversations),
        };
    }

    fn lock(&self) -> MutexGuard<'_, Conversations> {
        return self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn persist(&self, conversations: &Conversations) -> Result<()> {
        let payload = encode_conversations(conversations)?;
        self.storage.save(CONVERSATIONS_KEY, &payload)?;

        return Ok(());
    }

    pub fn get(&self, id: &str) -> Option<Conversation> {
        return self.lock().get(id).cloned();
    }

    pub fn contains(&self, id: &str) -> bool {
        return self.lock().contains_key(id);
    }

    pub fn len(&self) -> usize {
        return self.lock().len();
    }

    pub fn is_empty(&self) -> bool {
        return self.lock().is_empty();
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Conversations {
        return self.lock().clone();
    }

    /// Conversations with the most recent activity first.
    pub fn list(&self) -> Vec<Conversation> {
        let mut conversations = self.lock().values().cloned().collect::<Vec<Conversation>>();
        conversations.sort_by_key(|conversation| {
            return std::cmp::Reverse(conversation.last_activity());
        });

        return conversations;
    }

    /// Replaces the conversation with `f(old)`. Unknown ids are left alone.
    pub fn update<F>(&self, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(Conversation) -> Conversation,
    {
        let mut conversations = self.lock();
        let current = match conversations.get(id) {
            Some(current) => current.clone(),
            None => return Ok(()),
        };

        conversations.insert(id.to_string(), f(current));
        return self.persist(&conversations);
    }

    pub fn append_message(&self, id: &str, message: Message) -> Result<()> {
        let mut conversations = self.lock();
        let conversation = match conversations.get_mut(id) {
            Some(conversation) => conversation,
            None => {
                tracing::error!(id, "No conversation found");
                return Ok(());
            }
        };

        conversation.chat_history.push(message);
        return self.persist(&conversations);
    }

    /// Sets the display name. An empty name clears it.
    pub fn rename(&self, id: &str, name: &str) -> Result<()> {
        let name = name.trim().to_string();
        return self.update(id, |mut conversation| {
            conversation.name = if name.is_empty() { None } else { Some(name) };
            return conversation;
        });
    }

    pub fn create(&self, model: &str) -> Result<String> {
        return self.create_with(model, || return random_key(ID_LENGTH));
    }

    /// Creates an empty conversation under the first id from `next_id` that
    /// is not taken yet.
    pub fn create_with<F>(&self, model: &str, mut next_id: F) -> Result<String>
    where
        F: FnMut() -> String,
    {
        let mut conversations = self.lock();

        let mut id = next_id();
        let mut attempts = 1;
        while conversations.contains_key(&id) {
            if attempts >= MAX_ID_ATTEMPTS {
                return Err(ChatError::TooManyRetries(attempts).into());
            }
            id = next_id();
            attempts += 1;
        }

        conversations.insert(id.to_string(), Conversation::new(&id, model));
        self.persist(&conversations)?;
        tracing::debug!(id = %id, model, "conversation created");

        return Ok(id);
    }
}
