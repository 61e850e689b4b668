//! Conflict detection between a new user turn and the active instructions
//!
//! The check runs on the extraction model with its own prompt and sampling
//! settings. Each reported conflict is applied through
//! [`InstructionStore::replace_by_name`].

use crate::schema::{parse_structured, Conflict, ConflictResponse};
use crate::store::InstructionStore;
use instructa_core::config::{ConflictCheckConfig, EXISTING_INSTRUCTIONS_PLACEHOLDER};
use instructa_core::{ChatConfig, Result, Turn};
use instructa_llm::{LlmProvider, LlmRequest};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ConflictResolver {
    provider: Arc<dyn LlmProvider>,
    model: String,
    settings: ConflictCheckConfig,
}

impl ConflictResolver {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ChatConfig) -> Self {
        Self {
            provider,
            model: config.instruction_model.name.clone(),
            settings: config.conflict_check.clone(),
        }
    }

    pub fn render_prompt(&self, store: &InstructionStore) -> String {
        self.settings
            .system_prompt
            .replace(EXISTING_INSTRUCTIONS_PLACEHOLDER, &store.render_numbered())
    }

    /// Ask the model which active instructions `text` supersedes.
    pub async fn detect(&self, text: &str, store: &InstructionStore) -> Result<Vec<Conflict>> {
        let request = LlmRequest::new(
            self.model.clone(),
            vec![Turn::system(self.render_prompt(store)), Turn::user(text)],
        )
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let raw = self.provider.complete(request).await?;
        let parsed: ConflictResponse = parse_structured(&raw)?;
        Ok(parsed.conflicts)
    }

    /// Detect and apply conflicts. Skipped when nothing is active; a failed
    /// check leaves the store untouched. Returns the number applied.
    pub async fn run(&self, text: &str, store: &mut InstructionStore) -> usize {
        if store.is_empty() {
            return 0;
        }
        let conflicts = match self.detect(text, store).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Conflict check skipped: {}", e);
                return 0;
            }
        };

        let mut applied = 0;
        for conflict in conflicts {
            if conflict.new_instruction.name.trim().is_empty() {
                debug!("Ignoring conflict on {} with unnamed replacement", conflict.old_name);
                continue;
            }
            store.replace_by_name(&conflict.old_name, conflict.new_instruction);
            applied += 1;
        }
        applied
    }
}
