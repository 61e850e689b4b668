//! Reply validation against the active instructions
//!
//! A validator that cannot reach its model, or cannot read the answer,
//! returns [`ValidationVerdict::permissive`] so the reply still goes out.

use crate::schema::{parse_structured, VerdictResponse};
use crate::store::InstructionStore;
use instructa_core::config::{
    ValidationConfig, ACTIVE_INSTRUCTIONS_PLACEHOLDER, RESPONSE_PLACEHOLDER,
};
use instructa_core::{ChatConfig, Result, Turn, ValidationVerdict};
use instructa_llm::{LlmProvider, LlmRequest};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ResponseValidator {
    provider: Arc<dyn LlmProvider>,
    settings: ValidationConfig,
}

impl ResponseValidator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ChatConfig) -> Self {
        Self {
            provider,
            settings: config.validation.clone(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.settings.enable
    }

    pub fn max_retries(&self) -> u32 {
        self.settings.max_retries
    }

    pub fn render_prompt(&self, store: &InstructionStore, candidate: &str) -> String {
        self.settings
            .system_prompt
            .replace(ACTIVE_INSTRUCTIONS_PLACEHOLDER, &store.to_json())
            .replace(RESPONSE_PLACEHOLDER, candidate)
    }

    /// Judge `candidate`. Fails on a call or parse error.
    pub async fn check(
        &self,
        store: &InstructionStore,
        candidate: &str,
    ) -> Result<ValidationVerdict> {
        let request = LlmRequest::new(
            self.settings.model.clone(),
            vec![Turn::system(self.render_prompt(store, candidate))],
        )
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let raw = self.provider.complete(request).await?;
        let verdict: VerdictResponse = parse_structured(&raw)?;
        Ok(verdict)
    }

    pub async fn validate(&self, store: &InstructionStore, candidate: &str) -> ValidationVerdict {
        match self.check(store, candidate).await {
            Ok(verdict) => {
                debug!(
                    "Validation: valid={} violations={}",
                    verdict.valid,
                    verdict.violations.len()
                );
                verdict
            }
            Err(e) => {
                warn!("Validation unavailable, accepting reply: {}", e);
                ValidationVerdict::permissive()
            }
        }
    }
}
