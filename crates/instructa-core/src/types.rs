//! Core types for Instructa

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Session identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Message role
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One role-tagged message of the transcript. Serializes to the
/// `{role, content}` shape chat-completion APIs expect.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Where an active instruction came from.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstructionSource {
    #[default]
    User,
    Replacement,
}

/// Keys the store stamps itself; never taken from model output.
const STAMPED_KEYS: &[&str] = &["created_at", "source"];

/// An instruction as reported by the model, before the store stamps it.
///
/// Everything besides `name` and `description` is kept verbatim in
/// `parameters` (suggestions, thresholds, target language, ...).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InstructionDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

impl InstructionDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn stamp(self, source: InstructionSource, created_at: DateTime<Utc>) -> Instruction {
        let mut parameters = self.parameters;
        for key in STAMPED_KEYS {
            parameters.remove(*key);
        }
        Instruction {
            name: self.name,
            description: self.description,
            parameters,
            created_at,
            source,
        }
    }
}

/// An active behavioral constraint. At most one per `name` is active.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Instruction {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source: InstructionSource,
}

/// A single rule broken by a candidate reply.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
}

/// Judgment of a candidate reply against the active instructions.
/// `valid` defaults to `false` and `violations` to empty when the
/// validating model omits them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationVerdict {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

impl ValidationVerdict {
    /// Verdict used when validation itself could not run.
    pub fn permissive() -> Self {
        Self {
            valid: true,
            violations: Vec::new(),
        }
    }
}
