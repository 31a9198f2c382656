#[cfg(test)]
#[path = "generation_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::mpsc;

use super::ConversationStore;
use super::Generates;
use crate::domain::models::Attachment;
use crate::domain::models::ChatError;
use crate::domain::models::ContentPart;
use crate::domain::models::Conversation;
use crate::domain::models::Event;
use crate::domain::models::GenerateChunk;
use crate::domain::models::GenerateRequest;
use crate::domain::models::GenerationKind;
use crate::domain::models::Message;
use crate::domain::models::Notification;
use crate::domain::models::SharedBackend;
use crate::domain::models::Who;

/// Builds the request for a turn along with the user's own message part.
/// Image turns go to the vision model when one is set and never carry the
/// running context, since the server can't combine the two.
pub fn build_request(
    conversation: &Conversation,
    prompt: &str,
    attachment: Option<&Attachment>,
    vision_model: Option<&str>,
) -> (GenerateRequest, ContentPart, GenerationKind) {
    if let Some(attachment) = attachment {
        let req = GenerateRequest {
            model: vision_model.unwrap_or(&conversation.model).to_string(),
            prompt: prompt.to_string(),
            context: None,
            images: Some(vec![attachment.base64().to_string()]),
            stream: true,
        };
        let part = ContentPart::Image {
            content: prompt.to_string(),
            image: attachment.data_url.to_string(),
        };

        return (req, part, GenerationKind::Image);
    }

    let req = GenerateRequest {
        model: conversation.model.to_string(),
        prompt: prompt.to_string(),
        context: Some(conversation.context.clone()),
        images: None,
        stream: true,
    };
    let part = ContentPart::Text {
        content: prompt.to_string(),
    };

    return (req, part, GenerationKind::Text);
}

/// Runs prompts through the backend and records the results in the
/// conversation store.
#[derive(Clone)]
pub struct GenerationService {
    backend: SharedBackend,
    conversations: Arc<ConversationStore>,
    generates: Generates,
    tx: mpsc::UnboundedSender<Event>,
}

impl GenerationService {
    pub fn new(
        backend: SharedBackend,
        conversations: Arc<ConversationStore>,
        generates: Generates,
        tx: mpsc::UnboundedSender<Event>,
    ) -> GenerationService {
        return GenerationService {
            backend,
            conversations,
            generates,
            tx,
        };
    }

    /// Sends `prompt` for conversation `id`. The user's message is stored
    /// right away; the reply and the new context only once the stream
    /// completes. Failures are reported as a notification and returned.
    pub async fn submit(
        &self,
        id: &str,
        prompt: &str,
        attachment: Option<Attachment>,
        vision_model: Option<String>,
    ) -> Result<()> {
        if prompt.trim().is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let res = self
            .generate(id, prompt, attachment.as_ref(), vision_model.as_deref())
            .await;

        if let Err(err) = &res {
            tracing::error!(id, error = ?err, "Generation failed");
            let busy = matches!(
                err.downcast_ref::<ChatError>(),
                Some(ChatError::AlreadyGenerating(_))
            );
            if !busy {
                self.notify(Notification::error(
                    "Failed",
                    "Something went wrong sending the prompt. Check that the server is reachable.",
                ));
            }
        }

        let _ = self.tx.send(Event::GenerationFinished {
            id: id.to_string(),
            elapsed: started.elapsed(),
        });

        return res;
    }

    fn notify(&self, notification: Notification) {
        if self.tx.send(Event::Notify(notification)).is_err() {
            tracing::warn!("No listener for notifications");
        }
    }

    async fn generate(
        &self,
        id: &str,
        prompt: &str,
        attachment: Option<&Attachment>,
        vision_model: Option<&str>,
    ) -> Result<()> {
        let conversation = self
            .conversations
            .get(id)
            .ok_or_else(|| return ChatError::ConversationNotFound(id.to_string()))?;

        let (req, part, kind) = build_request(&conversation, prompt, attachment, vision_model);

        // Removed from the registry when dropped, whatever happens below.
        let guard = self.generates.start(id, kind)?;

        self.conversations
            .append_message(id, Message::new(Who::Me, vec![part]))?;

        let mut response = "".to_string();
        let done = self
            .backend
            .generate(req, &mut |chunk: GenerateChunk| {
                response.push_str(&chunk.response);
                guard.publish(&response);
                let _ = self.tx.send(Event::GenerationProgress {
                    id: id.to_string(),
                    delta: chunk.response,
                });
            })
            .await?;

        let context = done.context.ok_or(ChatError::MissingContext)?;
        self.conversations.update(id, |mut conversation| {
            if kind == GenerationKind::Text {
                conversation.extend_context(&context);
            }
            conversation
                .chat_history
                .push(Message::text(Who::Ollama, &response));
            return conversation;
        })?;

        tracing::debug!(
            id,
            eval_count = done.eval_count,
            total_duration = done.total_duration,
            "Generation complete"
        );

        return Ok(());
    }
}
