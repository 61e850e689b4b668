//! Chat orchestration configuration
//!
//! All tunable parameters in one place. Loaded from YAML once at startup and
//! handed by reference to every component; nothing reads it globally.
//! Every field has a default, so a partial file only overrides what it names.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Placeholder in `conflict_check.system_prompt` replaced by the numbered
/// list of active instructions.
pub const EXISTING_INSTRUCTIONS_PLACEHOLDER: &str = "{existing_instructions}";
/// Placeholder in `validation.system_prompt` replaced by the active
/// instruction set as JSON.
pub const ACTIVE_INSTRUCTIONS_PLACEHOLDER: &str = "{active_instructions}";
/// Placeholder in `validation.system_prompt` replaced by the candidate reply.
pub const RESPONSE_PLACEHOLDER: &str = "{response}";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Remote endpoint and outbound call limits.
    pub api: ApiConfig,
    /// Reply generation model.
    pub model: ModelConfig,
    /// Instruction extraction model (also used for the conflict check).
    pub instruction_model: InstructionModelConfig,
    /// Conflict detection between new turns and active instructions.
    pub conflict_check: ConflictCheckConfig,
    /// Reply validation and the corrective retry budget.
    pub validation: ValidationConfig,
    /// Dataset batch runs.
    pub batch: BatchConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    /// Bearer token. May be left empty and supplied from the environment.
    pub api_key: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum LLM calls in flight across all sessions.
    pub max_concurrent_requests: usize,
    /// Minimum spacing between the starts of two LLM calls.
    pub min_request_interval_ms: u64,
}

// Keeps the key out of logs.
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("timeout_secs", &self.timeout_secs)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("min_request_interval_ms", &self.min_request_interval_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstructionModelConfig {
    pub name: String,
    /// Asks for `{"instructions": [{"name", "description", ...}]}`.
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictCheckConfig {
    /// Template containing `{existing_instructions}`. Asks for
    /// `{"conflicts": [{"old_name", "new_instruction"}]}`.
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enable: bool,
    /// Corrective retries after the first attempt (0 = a single attempt).
    pub max_retries: u32,
    pub model: String,
    /// Template containing `{active_instructions}` and `{response}`. Asks
    /// for `{"valid": bool, "violations": [{"description", "suggestion"}]}`.
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Dataset records processed at the same time (1 = strictly sequential).
    pub concurrency: usize,
}

// ============================================================
// Defaults
// ============================================================

const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_EXTRACTION_PROMPT: &str = "You identify explicit behavioral instructions in the \
user's message: output language, length limits, tone, formatting, forbidden content and similar \
constraints on how the assistant must answer. Questions and requests for information are not \
instructions. Respond with a single JSON object and nothing else:\n\
{\"instructions\": [{\"name\": \"snake_case_identifier\", \"description\": \"what the assistant \
must do\", \"parameters\": {}}]}\n\
Use stable, generic names such as language_constraint, length_limit, format_requirement or \
tone_requirement. Return {\"instructions\": []} when the message contains no instruction.";

const DEFAULT_CONFLICT_PROMPT: &str = "These instructions are currently active:\n\
{existing_instructions}\n\n\
Decide whether the user's new message changes, cancels or contradicts any of them. Respond with \
a single JSON object and nothing else:\n\
{\"conflicts\": [{\"old_name\": \"name of the superseded instruction\", \"new_instruction\": \
{\"name\": \"...\", \"description\": \"...\"}}]}\n\
Reuse the old name when the new instruction governs the same concern. Return {\"conflicts\": []} \
when nothing conflicts.";

const DEFAULT_VALIDATION_PROMPT: &str = "You check whether an assistant response follows every \
active instruction.\n\n\
Active instructions (JSON):\n{active_instructions}\n\n\
Response:\n{response}\n\n\
Respond with a single JSON object and nothing else:\n\
{\"valid\": true or false, \"violations\": [{\"description\": \"what is wrong\", \"suggestion\": \
\"how to fix it\"}]}";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            timeout_secs: 120,
            max_concurrent_requests: 4,
            min_request_interval_ms: 0,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.into(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

impl Default for InstructionModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.into(),
            system_prompt: DEFAULT_EXTRACTION_PROMPT.into(),
            temperature: 0.1,
            max_tokens: 512,
        }
    }
}

impl Default for ConflictCheckConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_CONFLICT_PROMPT.into(),
            temperature: 0.1,
            max_tokens: 300,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enable: true,
            max_retries: 2,
            model: DEFAULT_MODEL.into(),
            system_prompt: DEFAULT_VALIDATION_PROMPT.into(),
            temperature: 0.0,
            max_tokens: 512,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl ChatConfig {
    /// Load and validate a YAML config file. Any failure is fatal to the
    /// caller: there is no silent fallback to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config_load(path, e.to_string()))?;
        let config = Self::parse_yaml(&content, path)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate YAML text. `origin` only labels errors.
    pub fn parse_yaml(content: &str, origin: &Path) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::config_load(origin, e.to_string()))?;
        config.validate(origin)?;
        Ok(config)
    }

    pub fn validate(&self, origin: &Path) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::config_load(origin, "api.base_url is empty"));
        }
        let models = [
            ("model.name", &self.model.name),
            ("instruction_model.name", &self.instruction_model.name),
            ("validation.model", &self.validation.model),
        ];
        for (key, value) in models {
            if value.trim().is_empty() {
                return Err(Error::config_load(origin, format!("{key} is empty")));
            }
        }
        if self.model.max_tokens == 0 {
            return Err(Error::config_load(origin, "model.max_tokens must be positive"));
        }

        let conflict_prompt = &self.conflict_check.system_prompt;
        let validation_prompt = &self.validation.system_prompt;
        let templates = [
            (
                "conflict_check.system_prompt",
                conflict_prompt,
                EXISTING_INSTRUCTIONS_PLACEHOLDER,
            ),
            (
                "validation.system_prompt",
                validation_prompt,
                ACTIVE_INSTRUCTIONS_PLACEHOLDER,
            ),
            (
                "validation.system_prompt",
                validation_prompt,
                RESPONSE_PLACEHOLDER,
            ),
        ];
        for (key, template, placeholder) in templates {
            if !template.contains(placeholder) {
                tracing::warn!("{} has no {} placeholder", key, placeholder);
            }
        }
        Ok(())
    }

    /// Replace the API key (CLI flag or environment takes precedence).
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api.api_key = api_key.into();
        self
    }

    /// Render the current config as YAML (for generating a starter file).
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap_or_default()
    }
}
