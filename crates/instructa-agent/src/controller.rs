//! Generation controller: one user turn from input to final reply
//!
//! Per turn: log the user input, run the conflict check, run extraction,
//! then drive the generate/validate loop below.
//!
//! ```text
//! Generating --(validation off | valid)--------------> Accepted
//! Generating --(invalid, retries left)---------------> FeedbackApplied --> Generating
//! Generating --(invalid, retries used up)------------> Exhausted
//! Generating --(call failed)-------------------------> return failure text
//! ```
//!
//! A failed generation call ends the turn without using a retry. Every
//! rejected candidate leaves a feedback turn in the log. An exhausted turn
//! returns its last candidate but does not log it as an assistant turn.

use crate::context::ContextBuilder;
use crate::extractor::InstructionExtractor;
use crate::generator::ResponseGenerator;
use crate::resolver::ConflictResolver;
use crate::session::ConversationState;
use crate::validator::ResponseValidator;
use instructa_core::{ChatConfig, Violation};
use instructa_llm::LlmProvider;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Opens the system turn that carries validation feedback.
pub const FEEDBACK_HEADER: &str = "Please fix the following issues:";
/// Appended to the last candidate when no attempt passed validation.
pub const EXHAUSTED_SUFFIX: &str = "\n(maximum correction attempts reached)";
/// Prefix of the reply when the generation call itself fails.
pub const GENERATION_FAILED_PREFIX: &str = "generation failed: ";

/// Terminal states carry the candidate they end with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    Generating,
    FeedbackApplied,
    Accepted(String),
    Exhausted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Accepted,
    Exhausted,
    GenerationFailed,
}

/// Final reply of a turn and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub status: TurnStatus,
    /// Generation calls made, including a failed one.
    pub attempts: u32,
}

impl TurnOutcome {
    pub fn is_accepted(&self) -> bool {
        self.status == TurnStatus::Accepted
    }
}

/// Feedback turn text for a rejected candidate.
pub fn render_feedback(violations: &[Violation]) -> String {
    let mut text = FEEDBACK_HEADER.to_string();
    for v in violations {
        let line = format!("\n- {} (suggestion: {})", v.description, v.suggestion);
        text.push_str(&line);
    }
    text
}

pub struct GenerationController {
    extractor: InstructionExtractor,
    resolver: ConflictResolver,
    context: ContextBuilder,
    generator: ResponseGenerator,
    validator: ResponseValidator,
}

impl GenerationController {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ChatConfig) -> Self {
        Self {
            extractor: InstructionExtractor::new(provider.clone(), config),
            resolver: ConflictResolver::new(provider.clone(), config),
            context: ContextBuilder::new(),
            generator: ResponseGenerator::new(provider.clone(), config),
            validator: ResponseValidator::new(provider, config),
        }
    }

    pub async fn handle_turn(&self, state: &mut ConversationState, input: &str) -> TurnOutcome {
        state.messages.push_user(input);
        self.resolver.run(input, &mut state.instructions).await;
        self.extractor.run(input, &mut state.instructions).await;

        let max_retries = self.validator.max_retries();
        let mut retry_count: u32 = 0;
        let mut attempts: u32 = 0;
        let mut phase = GenerationState::Generating;

        loop {
            phase = match phase {
                GenerationState::Generating => {
                    let context = self.context.build(&state.messages, &state.instructions);
                    attempts += 1;
                    let candidate = match self.generator.generate(context).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            warn!("Generation failed on attempt {}: {}", attempts, e);
                            return TurnOutcome {
                                reply: format!("{GENERATION_FAILED_PREFIX}{e}"),
                                status: TurnStatus::GenerationFailed,
                                attempts,
                            };
                        }
                    };

                    if !self.validator.enabled() {
                        GenerationState::Accepted(candidate)
                    } else {
                        let verdict = self
                            .validator
                            .validate(&state.instructions, &candidate)
                            .await;
                        if verdict.valid {
                            GenerationState::Accepted(candidate)
                        } else {
                            state
                                .messages
                                .push_system(render_feedback(&verdict.violations));
                            retry_count += 1;
                            if retry_count > max_retries {
                                GenerationState::Exhausted(candidate)
                            } else {
                                GenerationState::FeedbackApplied
                            }
                        }
                    }
                }
                GenerationState::FeedbackApplied => {
                    info!(
                        "Validation failed, correcting ({}/{})",
                        retry_count, max_retries
                    );
                    GenerationState::Generating
                }
                GenerationState::Accepted(reply) => {
                    state.messages.push_assistant(reply.clone());
                    return TurnOutcome {
                        reply,
                        status: TurnStatus::Accepted,
                        attempts,
                    };
                }
                GenerationState::Exhausted(last) => {
                    warn!("No valid reply after {} attempt(s)", attempts);
                    return TurnOutcome {
                        reply: format!("{last}{EXHAUSTED_SUFFIX}"),
                        status: TurnStatus::Exhausted,
                        attempts,
                    };
                }
            };
        }
    }
}
