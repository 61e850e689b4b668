//! Expected shapes of structured model replies, and a tolerant parser.
//!
//! Models often wrap JSON in a Markdown fence or add a sentence around it.
//! The parser tries the raw text, then a fenced block, then the outermost
//! `{...}` span. Anything still unreadable is an `Error::Parse`.

use instructa_core::{Error, InstructionDraft, Result, ValidationVerdict};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Reply of the instruction extractor. A missing `instructions` key means
/// "no instructions".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub instructions: Vec<InstructionDraft>,
}

/// Reply of the conflict check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictResponse {
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
}

/// One active instruction superseded by the new turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub old_name: String,
    pub new_instruction: InstructionDraft,
}

/// Reply of the validator: `valid` defaults to false, `violations` to empty.
pub type VerdictResponse = ValidationVerdict;

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*\n?(.*?)```").ok())
        .as_ref()
}

/// Body of the first Markdown code fence in `text`, if any.
fn fenced_body(text: &str) -> Option<&str> {
    fence_regex()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// Parse a model reply into `T`.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    let first_err = match serde_json::from_str::<T>(trimmed) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };

    if let Some(inner) = fenced_body(trimmed) {
        if let Ok(v) = serde_json::from_str::<T>(inner) {
            return Ok(v);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<T>(&trimmed[start..=end]) {
                return Ok(v);
            }
        }
    }

    Err(Error::parse(format!("{first_err} in {:?}", preview(trimmed))))
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}...")
    }
}
