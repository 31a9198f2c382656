#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use serde_derive::Deserialize;
use serde_derive::Serialize;

pub type Conversations = BTreeMap<String, Conversation>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Who {
    Me,
    Ollama,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { content: String },
    /// `image` holds the attachment as a data URL.
    Image { content: String, image: String },
}

impl ContentPart {
    pub fn content(&self) -> &str {
        match self {
            ContentPart::Text { content } => return content,
            ContentPart::Image { content, .. } => return content,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub created_at: DateTime<Utc>,
    pub who: Who,
    pub txt: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn new(who: Who, txt: Vec<ContentPart>) -> Message {
        return Message {
            created_at: Utc::now(),
            who,
            txt,
            name: None,
        };
    }

    pub fn text(who: Who, content: &str) -> Message {
        return Message::new(
            who,
            vec![ContentPart::Text {
                content: content.to_string(),
            }],
        );
    }

    /// All text carried by the message, image parts included.
    pub fn content(&self) -> String {
        return self
            .txt
            .iter()
            .map(|part| return part.content())
            .collect::<Vec<&str>>()
            .join("\n");
    }

    pub fn has_image(&self) -> bool {
        return self
            .txt
            .iter()
            .any(|part| return matches!(part, ContentPart::Image { .. }));
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub model: String,
    /// Opaque model state returned by the server. Older snapshots call it `ctx`.
    #[serde(default, alias = "ctx")]
    pub context: Vec<i64>,
    #[serde(default)]
    pub chat_history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
}

impl Conversation {
    pub fn new(id: &str, model: &str) -> Conversation {
        return Conversation {
            id: id.to_string(),
            model: model.to_string(),
            context: vec![],
            chat_history: vec![],
            name: None,
            created_at: Utc::now().timestamp_millis(),
        };
    }

    pub fn display_name(&self) -> &str {
        if let Some(name) = &self.name {
            return name;
        }

        return &self.id;
    }

    /// Time of the last message, falling back to the creation time. Used to
    /// order conversations by recent activity.
    pub fn last_activity(&self) -> i64 {
        if let Some(msg) = self.chat_history.last() {
            return msg.created_at.timestamp_millis();
        }

        return self.created_at;
    }

    /// Appends what the server returned after a turn. Ollama hands back the
    /// full running context, so when the current context is a prefix only the
    /// new tail is appended.
    pub fn extend_context(&mut self, returned: &[i64]) {
        if returned.starts_with(&self.context) {
            let delta = &returned[self.context.len()..];
            self.context.extend_from_slice(delta);
            return;
        }

        self.context.extend_from_slice(returned);
    }

    pub fn last_reply(&self) -> Option<&Message> {
        return self
            .chat_history
            .iter()
            .rev()
            .find(|msg| return msg.who == Who::Ollama);
    }
}
