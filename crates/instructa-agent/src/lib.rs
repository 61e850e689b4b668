//! Instructa Agent - Instruction lifecycle and the validated generation loop

pub mod context;
pub mod controller;
pub mod extractor;
pub mod generator;
pub mod message_log;
pub mod resolver;
pub mod schema;
pub mod session;
pub mod store;
pub mod validator;

pub use context::{ContextBuilder, INSTRUCTION_HEADER};
pub use controller::{
    render_feedback, GenerationController, GenerationState, TurnOutcome, TurnStatus,
    EXHAUSTED_SUFFIX, FEEDBACK_HEADER, GENERATION_FAILED_PREFIX,
};
pub use extractor::InstructionExtractor;
pub use generator::ResponseGenerator;
pub use message_log::MessageLog;
pub use resolver::ConflictResolver;
pub use schema::{parse_structured, Conflict, ConflictResponse, ExtractionResponse, VerdictResponse};
pub use session::{ChatSession, ConversationState, SessionKey};
pub use store::{InstructionStore, StoreChange};
pub use validator::ResponseValidator;
