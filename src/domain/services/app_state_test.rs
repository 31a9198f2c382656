use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tokio::sync::mpsc;

use super::AppState;
use crate::domain::models::ChatError;
use crate::domain::models::ConnectionState;
use crate::domain::models::Event;
use crate::domain::models::TutorialElement;
use crate::infrastructure::backends::ollama::Ollama;
use crate::infrastructure::storage::memory::MemoryStorage;

fn app_state(url: &str) -> (AppState, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = ConnectionState::default();
    let backend = Arc::new(Ollama::new(url, connection.clone()));
    let storage = Arc::new(MemoryStorage::default());

    return (AppState::new(backend, storage, connection, tx), rx);
}

fn tags_body() -> String {
    return json!({
        "models": [
            {"name": "mistral:latest", "digest": "b", "modified_at": "", "size": 4_109_865_159_u64},
            {"name": "llama2:latest", "digest": "a", "modified_at": "", "size": 3_825_819_519_u64},
        ]
    })
    .to_string();
}

mod load_models {
    use super::*;

    #[tokio::test]
    async fn it_loads_the_catalogue() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(tags_body())
            .create_async()
            .await;

        let (mut app_state, mut rx) = app_state(&server.url());
        let names = app_state
            .load_models()
            .await
            .iter()
            .map(|model| return model.name.to_string())
            .collect::<Vec<String>>();

        assert_eq!(names, vec!["llama2:latest", "mistral:latest"]);
        assert!(app_state.models_loaded);
        assert!(matches!(rx.try_recv(), Ok(Event::ModelsLoaded(models)) if models.len() == 2));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn it_falls_back_to_an_empty_catalogue() {
        let (mut app_state, mut rx) = app_state("http://127.0.0.1:1");

        assert!(app_state.load_models().await.is_empty());
        assert!(app_state.models_loaded);
        assert!(matches!(rx.try_recv(), Ok(Event::Notify(_))));
        assert!(matches!(rx.try_recv(), Ok(Event::ModelsLoaded(models)) if models.is_empty()));
    }
}

mod resolve_model {
    use super::*;

    #[tokio::test]
    async fn it_resolves_names_and_indexes() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(tags_body())
            .create_async()
            .await;

        let (mut app_state, _rx) = app_state(&server.url());
        app_state.load_models().await;

        assert_eq!(app_state.resolve_model("2")?, "mistral:latest");
        assert_eq!(app_state.resolve_model("llama2:latest")?, "llama2:latest");
        assert!(app_state.resolve_model("nope").is_err());
        assert!(app_state.resolve_model("").is_err());

        return Ok(());
    }

    #[test]
    fn it_trusts_names_before_the_catalogue_loads() -> Result<()> {
        let (app_state, _rx) = app_state("http://127.0.0.1:1");
        assert_eq!(app_state.resolve_model("phi")?, "phi");

        return Ok(());
    }
}

mod conversations {
    use super::*;

    #[test]
    fn it_requires_a_model_for_new_conversations() {
        let (app_state, _rx) = app_state("http://127.0.0.1:1");
        assert!(app_state.new_conversation().is_err());
        assert!(app_state.conversations.is_empty());
    }

    #[test]
    fn it_creates_and_remembers_the_current_conversation() -> Result<()> {
        let (app_state, _rx) = app_state("http://127.0.0.1:1");
        app_state.preferences.set_model("llama2:latest")?;

        let id = app_state.open_conversation(None)?;

        assert_eq!(id.len(), 8);
        assert_eq!(app_state.preferences.current_id(), Some(id.to_string()));
        assert_eq!(app_state.open_conversation(None)?, id);
        assert_eq!(app_state.conversations.len(), 1);

        return Ok(());
    }

    #[test]
    fn it_rejects_unknown_ids() {
        let (app_state, _rx) = app_state("http://127.0.0.1:1");
        let err = app_state.open_conversation(Some("missing")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn it_switches_the_conversation_model() -> Result<()> {
        let (app_state, _rx) = app_state("http://127.0.0.1:1");
        app_state.preferences.set_model("llama2:latest")?;
        let id = app_state.new_conversation()?;

        app_state.switch_model(&id, "mistral:latest")?;

        assert_eq!(app_state.conversations.get(&id).unwrap().model, "mistral:latest");
        return Ok(());
    }
}

mod tutorial {
    use super::*;

    #[test]
    fn it_walks_through_the_first_steps() -> Result<()> {
        let (mut app_state, _rx) = app_state("http://127.0.0.1:1");
        assert_eq!(app_state.tutorial(), TutorialElement::None);

        app_state.models_loaded = true;
        assert_eq!(app_state.tutorial(), TutorialElement::Model);

        app_state.preferences.set_model("llama2:latest")?;
        assert_eq!(app_state.tutorial(), TutorialElement::NewConversation);

        app_state.new_conversation()?;
        assert_eq!(app_state.tutorial(), TutorialElement::None);

        return Ok(());
    }
}
