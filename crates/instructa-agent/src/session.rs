//! Chat sessions: one conversation, its instructions, and its controller

use crate::controller::{GenerationController, TurnOutcome};
use crate::message_log::MessageLog;
use crate::store::InstructionStore;
use instructa_core::{ChatConfig, Instruction, Turn};
use instructa_llm::LlmProvider;
use std::sync::Arc;
use tracing::info;

pub use instructa_core::SessionKey;

/// State a session owns exclusively. Never shared between sessions.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub messages: MessageLog,
    pub instructions: InstructionStore,
}

pub struct ChatSession {
    key: SessionKey,
    state: ConversationState,
    controller: GenerationController,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ChatConfig) -> Self {
        let key = SessionKey::new(format!("chat-{}", uuid::Uuid::new_v4()));
        Self::with_key(key, provider, config)
    }

    pub fn with_key(key: SessionKey, provider: Arc<dyn LlmProvider>, config: &ChatConfig) -> Self {
        Self {
            key,
            state: ConversationState::default(),
            controller: GenerationController::new(provider, config),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Resolve one user turn. Turns are strictly sequential per session.
    pub async fn respond(&mut self, input: &str) -> TurnOutcome {
        let outcome = self.controller.handle_turn(&mut self.state, input).await;
        info!(
            "[{}] turn finished: {:?} after {} attempt(s)",
            self.key, outcome.status, outcome.attempts
        );
        outcome
    }

    pub fn history(&self) -> &[Turn] {
        self.state.messages.turns()
    }

    pub fn active_instructions(&self) -> Vec<Instruction> {
        self.state.instructions.snapshot()
    }

    /// Forget the transcript; instructions stay active.
    pub fn reset_history(&mut self) {
        self.state.messages.clear();
    }

    pub fn clear_instructions(&mut self) {
        self.state.instructions.clear();
    }

    pub fn reset(&mut self) {
        self.reset_history();
        self.clear_instructions();
    }
}
