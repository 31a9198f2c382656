use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::GenerateChunk;
use super::GenerateRequest;
use super::Model;

#[async_trait]
pub trait Backend {
    /// Liveness probe. Any 2xx from the server root counts as alive.
    async fn health_check(&self) -> Result<()>;

    /// All models installed on the server.
    async fn list_models(&self) -> Result<Vec<Model>>;

    /// Streams a generation. Every partial chunk is handed to `on_chunk` in
    /// the order it was received, and the final `done` chunk is returned.
    async fn generate<'a>(
        &self,
        req: GenerateRequest,
        on_chunk: &'a mut (dyn FnMut(GenerateChunk) + Send),
    ) -> Result<GenerateChunk>;
}

pub type SharedBackend = Arc<dyn Backend + Send + Sync>;
