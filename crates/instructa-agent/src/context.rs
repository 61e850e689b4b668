//! Generation context assembly

use crate::message_log::MessageLog;
use crate::store::InstructionStore;
use instructa_core::Turn;
use tracing::debug;

/// Opens the synthetic system turn that lists active instructions.
pub const INSTRUCTION_HEADER: &str = "Instructions you must follow:";

const CHARS_PER_TOKEN: f32 = 4.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn estimate_tokens(text: &str) -> usize {
        (text.len() as f32 / CHARS_PER_TOKEN).ceil() as usize
    }

    pub fn instruction_turn(store: &InstructionStore) -> Turn {
        Turn::system(format!("{}\n{}", INSTRUCTION_HEADER, store.render_bullets()))
    }

    /// Copy of the log with the instruction turn placed just before the
    /// newest entry, or at the end of an empty log. An empty store leaves
    /// the log as is.
    pub fn build(&self, log: &MessageLog, store: &InstructionStore) -> Vec<Turn> {
        let mut turns = log.turns().to_vec();
        if !store.is_empty() {
            let at = turns.len().saturating_sub(1);
            turns.insert(at, Self::instruction_turn(store));
        }
        debug!(
            "Built context: {} turns, ~{} tokens",
            turns.len(),
            turns.iter().map(|t| Self::estimate_tokens(&t.content)).sum::<usize>()
        );
        turns
    }
}
