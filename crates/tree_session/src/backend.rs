use async_trait::async_trait;
use context_tree::ChatMessage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Backend error: {0}")]
    Api(String),
}

/// The language-model side of a conversation: given the path of prior turns
/// plus the new user message, produce the reply text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> Result<String, BackendError>;
}
