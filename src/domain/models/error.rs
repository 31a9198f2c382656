use thiserror::Error;

/// Failures the rest of the app reacts to by kind. They travel inside
/// `anyhow::Error` and are recovered with `downcast_ref::<ChatError>()`.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("server sent a chunk that could not be decoded: {0}")]
    MalformedChunk(String),

    #[error("generation completed without a context")]
    MissingContext,

    #[error("stored conversations could not be read: {0}")]
    StorageLoad(String),

    #[error("could not find a free conversation id after {0} attempts")]
    TooManyRetries(usize),

    #[error("failed to fetch speech: {0}")]
    VoiceFetch(String),

    #[error("failed to play audio: {0}")]
    VoicePlayback(String),

    #[error("no conversation found for id {0}")]
    ConversationNotFound(String),

    #[error("conversation {0} is already generating")]
    AlreadyGenerating(String),

    #[error("{0}")]
    InvalidAttachment(String),
}

impl ChatError {
    pub fn network(url: &str, reason: impl ToString) -> ChatError {
        return ChatError::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        };
    }
}
