#[cfg(test)]
#[path = "generation_test.rs"]
mod tests;

use std::path::Path;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tokio::fs;

use super::ChatError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    pub stream: bool,
}

/// One decoded line of a streamed `/api/generate` response. Only the final
/// line (`done: true`) carries the context and timings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub response: String,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GenerationKind {
    Text,
    Image,
}

/// What is known about a generation while it is in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    pub kind: GenerationKind,
    pub text: String,
}

const IMAGE_EXTENSIONS: [(&str, &str); 6] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
];

/// An image attached to the next prompt, kept as a data URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub data_url: String,
}

impl Attachment {
    pub fn from_bytes(file_name: &str, bytes: &[u8]) -> Result<Attachment> {
        let lowered = file_name.to_lowercase();
        let mime = IMAGE_EXTENSIONS
            .iter()
            .find(|(ext, _)| return lowered.ends_with(&format!(".{ext}")))
            .map(|(_, mime)| return *mime);

        if let Some(mime) = mime {
            return Ok(Attachment {
                data_url: format!("data:{mime};base64,{}", b64.encode(bytes)),
            });
        }

        return Err(ChatError::InvalidAttachment("Invalid file format".to_string()).into());
    }

    pub async fn from_path(path: &Path) -> Result<Attachment> {
        let file_name = path
            .file_name()
            .map(|name| return name.to_string_lossy().to_string())
            .unwrap_or_default();

        // Check the extension before reading what could be a large file.
        Attachment::from_bytes(&file_name, &[])?;

        let bytes = fs::read(path).await?;
        return Attachment::from_bytes(&file_name, &bytes);
    }

    /// The raw base64 payload the server expects in `images`.
    pub fn base64(&self) -> &str {
        if self.data_url.starts_with("data:") {
            if let Some((_, payload)) = self.data_url.split_once(";base64,") {
                return payload;
            }
        }

        return &self.data_url;
    }
}
