//! Instructa LLM - Provider adapters and the chat completion call contract

pub mod limiter;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod types;

pub use limiter::RateLimitedProvider;
pub use mock::{MockBehavior, MockProvider};
pub use openai::OpenAiProvider;
pub use provider::{LlmError, LlmProvider, LlmResult};
pub use types::*;
