use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Speech {
    /// Synthesizes `prompt` and returns the fully fetched audio.
    async fn synthesize(&self, prompt: &str, seed: u32) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait AudioPlayer {
    /// Plays `audio` to the end. Dropping the future stops playback.
    async fn play(&self, audio: Vec<u8>) -> Result<()>;
}

pub type SharedSpeech = Arc<dyn Speech + Send + Sync>;
pub type SharedAudioPlayer = Arc<dyn AudioPlayer + Send + Sync>;
