#[cfg(test)]
#[path = "app_state_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use tokio::sync::mpsc;

use super::ConnectionMonitor;
use super::ConversationStore;
use super::GenerationService;
use super::Generates;
use super::Preferences;
use crate::domain::models::ChatError;
use crate::domain::models::ConnectionState;
use crate::domain::models::Event;
use crate::domain::models::Model;
use crate::domain::models::Notification;
use crate::domain::models::SharedBackend;
use crate::domain::models::SharedStorage;
use crate::domain::models::TutorialElement;

/// Everything a chat front end works against. Observers follow progress
/// through the `Event` channel.
pub struct AppState {
    pub backend: SharedBackend,
    pub connection: ConnectionState,
    pub conversations: Arc<ConversationStore>,
    pub generates: Generates,
    pub models: Vec<Model>,
    pub models_loaded: bool,
    pub preferences: Preferences,
    pub tx: mpsc::UnboundedSender<Event>,
}

impl AppState {
    pub fn new(
        backend: SharedBackend,
        storage: SharedStorage,
        connection: ConnectionState,
        tx: mpsc::UnboundedSender<Event>,
    ) -> AppState {
        return AppState {
            backend,
            connection,
            conversations: Arc::new(ConversationStore::load(storage.clone())),
            generates: Generates::default(),
            models: vec![],
            models_loaded: false,
            preferences: Preferences::new(storage),
            tx,
        };
    }

    pub fn generation(&self) -> GenerationService {
        return GenerationService::new(
            self.backend.clone(),
            self.conversations.clone(),
            self.generates.clone(),
            self.tx.clone(),
        );
    }

    pub fn monitor(&self) -> ConnectionMonitor {
        return ConnectionMonitor::new(
            self.backend.clone(),
            self.connection.clone(),
            self.tx.clone(),
        );
    }

    pub fn notify(&self, notification: Notification) {
        if self.tx.send(Event::Notify(notification)).is_err() {
            tracing::warn!("No listener for notifications");
        }
    }

    /// Refreshes the model catalogue. A failed listing leaves it empty.
    pub async fn load_models(&mut self) -> &[Model] {
        self.models = match self.backend.list_models().await {
            Ok(models) => models,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to list models");
                self.notify(Notification::error(
                    "Error",
                    "Failed to load models from the server",
                ));
                vec![]
            }
        };
        self.models_loaded = true;

        let _ = self.tx.send(Event::ModelsLoaded(self.models.clone()));
        return &self.models;
    }

    /// Resolves `/model` style input, either a model name or its 1-based
    /// position in the catalogue.
    pub fn resolve_model(&self, name_or_index: &str) -> Result<String> {
        let name_or_index = name_or_index.trim();
        if name_or_index.is_empty() {
            bail!("A model name is required");
        }

        if let Ok(idx) = name_or_index.parse::<usize>() {
            if idx >= 1 && idx <= self.models.len() {
                return Ok(self.models[idx - 1].name.to_string());
            }
        }

        if self.models_loaded
            && !self.models.is_empty()
            && !self.models.iter().any(|model| return model.name == name_or_index)
        {
            bail!(format!(
                "Model {name_or_index} doesn't exist. Use /models to view all available models."
            ));
        }

        return Ok(name_or_index.to_string());
    }

    pub fn tutorial(&self) -> TutorialElement {
        return TutorialElement::resolve(
            self.models_loaded,
            self.preferences.model().is_some(),
            self.conversations.len(),
        );
    }

    /// Starts a conversation on the default model and makes it current.
    pub fn new_conversation(&self) -> Result<String> {
        let model = match self.preferences.model() {
            Some(model) => model,
            None => bail!("No model selected. Pick one with `ochat models use <NAME>`."),
        };

        let id = self.conversations.create(&model)?;
        self.preferences.set_current_id(&id)?;
        tracing::info!(id = %id, model = %model, "Created conversation");

        return Ok(id);
    }

    /// Picks the conversation to chat in: `requested` when given, else the
    /// persisted current one, else a new one.
    pub fn open_conversation(&self, requested: Option<&str>) -> Result<String> {
        if let Some(id) = requested {
            if !self.conversations.contains(id) {
                return Err(ChatError::ConversationNotFound(id.to_string()).into());
            }
            self.preferences.set_current_id(id)?;
            return Ok(id.to_string());
        }

        if let Some(id) = self.preferences.current_id() {
            if self.conversations.contains(&id) {
                return Ok(id);
            }
        }

        return self.new_conversation();
    }

    /// Points conversation `id` at a different model.
    pub fn switch_model(&self, id: &str, model: &str) -> Result<()> {
        return self.conversations.update(id, |mut conversation| {
            conversation.model = model.to_string();
            return conversation;
        });
    }
}
