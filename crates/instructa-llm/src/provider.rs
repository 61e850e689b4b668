//! LLM Provider trait

use crate::types::LlmRequest;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("empty completion")]
    EmptyCompletion,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl From<LlmError> for instructa_core::Error {
    fn from(e: LlmError) -> Self {
        instructa_core::Error::Call(e.to_string())
    }
}

/// A blocking round-trip to a chat model: ordered turns in, text out.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Text content of the single top completion.
    async fn complete(&self, request: LlmRequest) -> LlmResult<String>;
}

#[async_trait::async_trait]
impl<P: LlmProvider + ?Sized> LlmProvider for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<String> {
        (**self).complete(request).await
    }
}
