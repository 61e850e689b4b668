//! Active instruction set keyed by name, in insertion order.
//!
//! A name is unique after every operation. Replacing keeps the slot of the
//! instruction being replaced, so rendering order stays stable.

use chrono::Utc;
use instructa_core::{Instruction, InstructionDraft, InstructionSource};
use tracing::info;

/// What a store write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone, Default)]
pub struct InstructionStore {
    entries: Vec<Instruction>,
}

impl InstructionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user-stated instruction, replacing any entry with the same name.
    pub fn upsert(&mut self, draft: InstructionDraft) -> StoreChange {
        self.upsert_with_source(draft, InstructionSource::User)
    }

    pub fn upsert_with_source(
        &mut self,
        draft: InstructionDraft,
        source: InstructionSource,
    ) -> StoreChange {
        let instruction = draft.stamp(source, Utc::now());
        match self.position(&instruction.name) {
            Some(idx) => {
                info!("Instruction updated: {}", instruction.name);
                self.entries[idx] = instruction;
                StoreChange::Replaced
            }
            None => {
                info!("Instruction stored: {}", instruction.name);
                self.entries.push(instruction);
                StoreChange::Inserted
            }
        }
    }

    /// Overwrite the slot of `old_name` with a replacement. When `old_name`
    /// is not active the replacement is upserted instead.
    pub fn replace_by_name(&mut self, old_name: &str, draft: InstructionDraft) -> StoreChange {
        let Some(idx) = self.position(old_name) else {
            info!("Conflict target {} not active, adding {}", old_name, draft.name);
            return self.upsert_with_source(draft, InstructionSource::Replacement);
        };

        let instruction = draft.stamp(InstructionSource::Replacement, Utc::now());
        info!("Instruction replaced: {} -> {}", old_name, instruction.name);
        let new_name = instruction.name.clone();
        self.entries[idx] = instruction;

        // A rename may collide with another active entry; the replacement wins.
        let mut i = 0;
        self.entries.retain(|inst| {
            let keep = i == idx || inst.name != new_name;
            i += 1;
            keep
        });
        StoreChange::Replaced
    }

    /// Ordered copy of all active instructions.
    pub fn snapshot(&self) -> Vec<Instruction> {
        self.entries.clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, name: &str) -> Option<&Instruction> {
        self.entries.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `"1. name (description)"`, one line per instruction.
    pub fn render_numbered(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, inst)| format!("{}. {} ({})", i + 1, inst.name, inst.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `"- description"`, one line per instruction.
    pub fn render_bullets(&self) -> String {
        self.entries
            .iter()
            .map(|inst| format!("- {}", inst.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The active set as a JSON array, non-ASCII kept as is.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.entries).unwrap_or_else(|_| "[]".to_string())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|i| i.name == name)
    }
}
