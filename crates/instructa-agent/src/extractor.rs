//! Instruction extraction from the newest user turn

use crate::schema::{parse_structured, ExtractionResponse};
use crate::store::InstructionStore;
use instructa_core::config::InstructionModelConfig;
use instructa_core::{ChatConfig, InstructionDraft, Result, Turn};
use instructa_llm::{LlmProvider, LlmRequest};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct InstructionExtractor {
    provider: Arc<dyn LlmProvider>,
    settings: InstructionModelConfig,
}

impl InstructionExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ChatConfig) -> Self {
        Self {
            provider,
            settings: config.instruction_model.clone(),
        }
    }

    /// Ask the model which instructions `text` states. Fails on a call or
    /// parse error; the caller decides whether to absorb it.
    pub async fn extract(&self, text: &str) -> Result<Vec<InstructionDraft>> {
        let request = LlmRequest::new(
            self.settings.name.clone(),
            vec![Turn::system(self.settings.system_prompt.clone()), Turn::user(text)],
        )
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let raw = self.provider.complete(request).await?;
        let parsed: ExtractionResponse = parse_structured(&raw)?;
        Ok(parsed
            .instructions
            .into_iter()
            .filter(|d| !d.name.trim().is_empty())
            .collect())
    }

    /// Extract and upsert into `store`. Returns how many instructions were
    /// written; any failure skips the step and writes nothing.
    pub async fn run(&self, text: &str, store: &mut InstructionStore) -> usize {
        match self.extract(text).await {
            Ok(drafts) => {
                let count = drafts.len();
                for draft in drafts {
                    store.upsert(draft);
                }
                debug!("Extracted {} instruction(s)", count);
                count
            }
            Err(e) => {
                warn!("Instruction extraction skipped: {}", e);
                0
            }
        }
    }
}
