//! Reply generation

use instructa_core::config::ModelConfig;
use instructa_core::{ChatConfig, Result, Turn};
use instructa_llm::{LlmProvider, LlmRequest};
use std::sync::Arc;
use tracing::debug;

pub struct ResponseGenerator {
    provider: Arc<dyn LlmProvider>,
    settings: ModelConfig,
}

impl ResponseGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ChatConfig) -> Self {
        Self {
            provider,
            settings: config.model.clone(),
        }
    }

    /// One completion over `context`. A failed call is `Error::Call`.
    pub async fn generate(&self, context: Vec<Turn>) -> Result<String> {
        let request = LlmRequest::new(self.settings.name.clone(), context)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);
        let reply = self.provider.complete(request).await?;
        debug!("Generated {} chars with {}", reply.len(), self.settings.name);
        Ok(reply)
    }
}
