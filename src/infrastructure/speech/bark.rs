#[cfg(test)]
#[path = "bark_test.rs"]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::domain::models::ChatError;
use crate::domain::models::Speech;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct BarkRequest {
    prompt: String,
    seed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct BarkResponse {
    prompt: String,
    filename: String,
}

/// Client for a Bark text-to-speech server. Audio is rendered to a file on
/// the server, downloaded, then deleted there.
pub struct Bark {
    url: String,
    client: reqwest::Client,
}

impl Bark {
    pub fn new(url: &str) -> Bark {
        return Bark {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        };
    }

    async fn render(&self, prompt: &str, seed: u32) -> Result<BarkResponse> {
        let url = format!("{}/bark", self.url);
        let res = self
            .client
            .post(&url)
            .json(&BarkRequest {
                prompt: prompt.to_string(),
                seed,
            })
            .send()
            .await
            .map_err(|err| return ChatError::VoiceFetch(err.to_string()))?;

        if res.status() != 200 {
            tracing::error!(status = res.status().as_u16(), "Bark render failed");
            return Err(ChatError::VoiceFetch(format!(
                "speech server responded with status {}",
                res.status().as_u16()
            ))
            .into());
        }

        return res
            .json::<BarkResponse>()
            .await
            .map_err(|err| return ChatError::VoiceFetch(err.to_string()).into());
    }

    async fn download(&self, filename: &str) -> Result<Vec<u8>> {
        let url = format!("{}/bark-out/{filename}", self.url);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| return ChatError::VoiceFetch(err.to_string()))?;

        if res.status() != 200 {
            tracing::error!(status = res.status().as_u16(), filename, "Bark download failed");
            return Err(ChatError::VoiceFetch(format!(
                "speech server responded with status {}",
                res.status().as_u16()
            ))
            .into());
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|err| return ChatError::VoiceFetch(err.to_string()))?;

        return Ok(bytes.to_vec());
    }

    async fn release(&self, filename: &str) {
        let url = format!("{}/bark-out/{filename}", self.url);
        match self.client.delete(&url).send().await {
            Ok(res) if res.status().is_success() => {}
            Ok(res) => {
                tracing::warn!(status = res.status().as_u16(), filename, "Failed to release speech file");
            }
            Err(err) => {
                tracing::warn!(error = ?err, filename, "Failed to release speech file");
            }
        }
    }
}

#[async_trait]
impl Speech for Bark {
    #[allow(clippy::implicit_return)]
    async fn synthesize(&self, prompt: &str, seed: u32) -> Result<Vec<u8>> {
        let rendered = self.render(prompt, seed).await?;
        let audio = self.download(&rendered.filename).await?;
        self.release(&rendered.filename).await;

        tracing::debug!(prompt = %rendered.prompt, bytes = audio.len(), "Speech fetched");
        return Ok(audio);
    }
}
