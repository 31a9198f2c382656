#[cfg(test)]
#[path = "ollama_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::domain::models::Backend;
use crate::domain::models::ChatError;
use crate::domain::models::ConnectionState;
use crate::domain::models::ConnectionStatus;
use crate::domain::models::GenerateChunk;
use crate::domain::models::GenerateRequest;
use crate::domain::models::Model;
use crate::domain::models::ModelListResponse;

fn convert_err(err: reqwest::Error) -> std::io::Error {
    let err_msg = err.to_string();
    return std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg);
}

/// Decodes newline delimited chunks from `reader`. Partial lines are held
/// until the rest arrives, and every complete line is handled in receive
/// order. Returns the `done` chunk, or `None` when the stream ends first.
async fn read_chunks<R>(
    reader: R,
    on_chunk: &mut (dyn FnMut(GenerateChunk) + Send),
) -> Result<Option<GenerateChunk>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines_reader = reader.lines();
    while let Some(line) = lines_reader.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let chunk: GenerateChunk = match serde_json::from_str(&line) {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::error!(line = %line, error = ?err, "Malformed completion chunk");
                bail!(ChatError::MalformedChunk(err.to_string()));
            }
        };
        tracing::debug!(body = ?chunk, "Completion response");

        if chunk.done {
            return Ok(Some(chunk));
        }
        on_chunk(chunk);
    }

    return Ok(None);
}

pub struct Ollama {
    url: String,
    client: reqwest::Client,
    connection: ConnectionState,
}

impl Ollama {
    pub fn new(url: &str, connection: ConnectionState) -> Ollama {
        return Ollama {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            connection,
        };
    }

    fn endpoint(&self, path: &str) -> String {
        return format!(
            "{url}/{path}",
            url = self.url,
            path = path.trim_start_matches('/')
        );
    }

    /// Flags the server as unreachable and builds the error to return.
    fn fail(&self, url: &str, reason: impl ToString) -> anyhow::Error {
        let reason = reason.to_string();
        tracing::error!(url, reason = %reason, "Ollama request failed");
        self.connection.set(ConnectionStatus::Connecting);

        return ChatError::network(url, reason).into();
    }

    /// Sends a JSON request to the server. Connection failures and non-2xx
    /// responses fail with `ChatError::Network` and move the connection back
    /// to `connecting`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let url = self.endpoint(path);
        let mut req = self
            .client
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            req = req.json(&body);
        }

        let res = match req.send().await {
            Ok(res) => res,
            Err(err) => return Err(self.fail(&url, err)),
        };

        if !res.status().is_success() {
            let status = res.status().as_u16();
            return Err(self.fail(&url, format!("server responded with status {status}")));
        }

        return Ok(res);
    }
}

#[async_trait]
impl Backend for Ollama {
    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        self.request(Method::GET, "", None).await?;
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_models(&self) -> Result<Vec<Model>> {
        let res = self
            .request(Method::GET, "api/tags", None)
            .await?
            .json::<ModelListResponse>()
            .await?;

        let mut models = res.models;
        models.sort_by(|a, b| return a.name.cmp(&b.name));

        return Ok(models);
    }

    #[allow(clippy::implicit_return)]
    async fn generate<'a>(
        &self,
        req: GenerateRequest,
        on_chunk: &'a mut (dyn FnMut(GenerateChunk) + Send),
    ) -> Result<GenerateChunk> {
        let url = self.endpoint("api/generate");
        let res = self
            .request(Method::POST, "api/generate", Some(serde_json::to_value(&req)?))
            .await?;

        let stream = res.bytes_stream().map_err(convert_err);
        match read_chunks(StreamReader::new(stream), on_chunk).await {
            Ok(Some(done)) => return Ok(done),
            Ok(None) => {}
            Err(err) if matches!(err.downcast_ref::<ChatError>(), Some(ChatError::MalformedChunk(_))) => {
                return Err(err);
            }
            Err(err) => return Err(self.fail(&url, err)),
        }

        return Err(self.fail(&url, "stream closed before the final chunk"));
    }
}
