use std::sync::Arc;

use anyhow::Result;
use chrono::TimeZone;
use chrono::Utc;
use test_utils::legacy_conversations_fixture;

use super::decode_conversations;
use super::encode_conversations;
use super::ConversationStore;
use super::CONVERSATIONS_KEY;
use super::MAX_ID_ATTEMPTS;
use crate::domain::models::ChatError;
use crate::domain::models::ContentPart;
use crate::domain::models::Conversation;
use crate::domain::models::Message;
use crate::domain::models::Who;
use crate::infrastructure::storage::memory::MemoryStorage;

fn store_with(ids: &[&str]) -> (Arc<MemoryStorage>, ConversationStore) {
    let storage = Arc::new(MemoryStorage::default());
    let store = ConversationStore::load(storage.clone());
    for id in ids {
        let id = id.to_string();
        store
            .create_with("llama3", || return id.to_string())
            .unwrap();
    }

    return (storage, store);
}

mod load {
    use super::*;

    #[test]
    fn it_starts_empty_without_data() {
        let store = ConversationStore::load(Arc::new(MemoryStorage::default()));
        assert!(store.is_empty());
    }

    #[test]
    fn it_recovers_from_corrupt_data() {
        let storage = MemoryStorage::with(CONVERSATIONS_KEY, "{\"version\":1,\"conversa");
        let store = ConversationStore::load(Arc::new(storage));
        assert!(store.is_empty());
    }

    #[test]
    fn it_reads_legacy_snapshots() {
        let storage = MemoryStorage::with(CONVERSATIONS_KEY, legacy_conversations_fixture());
        let store = ConversationStore::load(Arc::new(storage));

        assert_eq!(store.len(), 2);
        let sky = store.get("k3JdL0aZ").unwrap();
        assert_eq!(sky.context, vec![1, 2, 3]);
        assert_eq!(sky.chat_history.len(), 2);
    }

    #[test]
    fn it_rejects_unknown_versions() {
        let err = decode_conversations("{\"version\":9,\"conversations\":[]}").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::StorageLoad(_))
        ));
    }

    #[test]
    fn it_round_trips_snapshots() -> Result<()> {
        let storage = MemoryStorage::with(CONVERSATIONS_KEY, legacy_conversations_fixture());
        let store = ConversationStore::load(Arc::new(storage));
        store.append_message(
            "Qp9xT2mB",
            Message::new(
                Who::Me,
                vec![ContentPart::Image {
                    content: "what is this?".to_string(),
                    image: "data:image/png;base64,AAAA".to_string(),
                }],
            ),
        )?;

        let original = store.snapshot();
        let decoded = decode_conversations(&encode_conversations(&original)?)?;

        assert_eq!(decoded, original);
        return Ok(());
    }
}

mod update {
    use super::*;

    #[test]
    fn it_ignores_unknown_ids() -> Result<()> {
        let (storage, store) = store_with(&["aaaaaaaa"]);
        let before = storage.values.get(CONVERSATIONS_KEY).unwrap().to_string();

        store.update("missing", |mut conversation| {
            conversation.model = "changed".to_string();
            return conversation;
        })?;

        assert_eq!(store.len(), 1);
        assert!(!store.contains("missing"));
        assert_eq!(*storage.values.get(CONVERSATIONS_KEY).unwrap(), before);
        return Ok(());
    }

    #[test]
    fn it_replaces_only_the_target() -> Result<()> {
        let (storage, store) = store_with(&["aaaaaaaa", "bbbbbbbb"]);
        let untouched = store.get("bbbbbbbb").unwrap();

        store.update("aaaaaaaa", |mut conversation| {
            conversation.context = vec![9];
            return conversation;
        })?;

        assert_eq!(store.get("aaaaaaaa").unwrap().context, vec![9]);
        assert_eq!(store.get("bbbbbbbb").unwrap(), untouched);

        let persisted = decode_conversations(&storage.values.get(CONVERSATIONS_KEY).unwrap())?;
        assert_eq!(persisted, store.snapshot());
        return Ok(());
    }

    #[test]
    fn it_renames_and_clears_names() -> Result<()> {
        let (_storage, store) = store_with(&["aaaaaaaa"]);

        store.rename("aaaaaaaa", "  Trip  ")?;
        assert_eq!(store.get("aaaaaaaa").unwrap().display_name(), "Trip");

        store.rename("aaaaaaaa", "")?;
        assert_eq!(store.get("aaaaaaaa").unwrap().name, None);
        return Ok(());
    }

    #[test]
    fn it_reports_persistence_failures() {
        let storage = MemoryStorage {
            failing: true,
            ..MemoryStorage::default()
        };
        let store = ConversationStore::load(Arc::new(storage));

        assert!(store.create("llama3").is_err());
    }
}

mod append_message {
    use super::*;

    #[test]
    fn it_ignores_unknown_ids() -> Result<()> {
        let (_storage, store) = store_with(&["aaaaaaaa"]);
        let before = store.snapshot();

        store.append_message("missing", Message::text(Who::Me, "hi"))?;

        assert_eq!(store.snapshot(), before);
        return Ok(());
    }

    #[test]
    fn it_keeps_insertion_order() -> Result<()> {
        let (_storage, store) = store_with(&["aaaaaaaa"]);

        store.append_message("aaaaaaaa", Message::text(Who::Me, "one"))?;
        store.append_message("aaaaaaaa", Message::text(Who::Ollama, "two"))?;
        store.append_message("aaaaaaaa", Message::text(Who::Me, "three"))?;

        let history = store
            .get("aaaaaaaa")
            .unwrap()
            .chat_history
            .iter()
            .map(|msg| return msg.content())
            .collect::<Vec<String>>();
        assert_eq!(history, vec!["one", "two", "three"]);
        return Ok(());
    }
}

mod create {
    use super::*;

    #[test]
    fn it_creates_random_ids() -> Result<()> {
        let (_storage, store) = store_with(&[]);
        let id = store.create("llama3")?;

        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| return c.is_ascii_alphanumeric()));

        let conversation = store.get(&id).unwrap();
        assert_eq!(conversation.id, id);
        assert_eq!(conversation.model, "llama3");
        assert!(conversation.context.is_empty());
        assert!(conversation.chat_history.is_empty());
        return Ok(());
    }

    #[test]
    fn it_skips_taken_ids() -> Result<()> {
        let (_storage, store) = store_with(&["aaaaaaaa", "bbbbbbbb", "cccccccc"]);
        let mut candidates = vec!["aaaaaaaa", "bbbbbbbb", "cccccccc", "dddddddd"].into_iter();

        let id = store.create_with("llama3", || return candidates.next().unwrap().to_string())?;

        assert_eq!(id, "dddddddd");
        assert_eq!(store.len(), 4);
        return Ok(());
    }

    #[test]
    fn it_gives_up_after_too_many_collisions() {
        let (_storage, store) = store_with(&["aaaaaaaa"]);
        let mut calls = 0;

        let err = store
            .create_with("llama3", || {
                calls += 1;
                return "aaaaaaaa".to_string();
            })
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::TooManyRetries(MAX_ID_ATTEMPTS))
        ));
        assert_eq!(calls, MAX_ID_ATTEMPTS);
        assert_eq!(store.len(), 1);
    }
}

#[test]
fn it_lists_recent_activity_first() -> Result<()> {
    let (_storage, store) = store_with(&["old", "new", "busy"]);
    store.update("old", |mut conversation| {
        conversation.created_at = 1_000;
        return conversation;
    })?;
    store.update("new", |mut conversation| {
        conversation.created_at = 3_000;
        return conversation;
    })?;
    store.update("busy", |mut conversation| {
        conversation.created_at = 0;
        let mut msg = Message::text(Who::Me, "hi");
        msg.created_at = Utc.timestamp_millis_opt(5_000).unwrap();
        conversation.chat_history.push(msg);
        return conversation;
    })?;

    let ids = store
        .list()
        .iter()
        .map(|conversation: &Conversation| return conversation.id.to_string())
        .collect::<Vec<String>>();
    assert_eq!(ids, vec!["busy", "new", "old"]);

    return Ok(());
}
