pub mod types;
pub mod prompt;
pub mod parser;
pub mod language;
pub mod fallback;
pub mod extraction;
pub mod flow;
pub mod responder;
pub mod gateway;
pub mod orchestrator;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use language::*;
pub use fallback::*;
pub use extraction::*;
pub use flow::*;
pub use responder::*;
pub use gateway::*;
pub use orchestrator::*;

use thiserror::Error;

use super::LlmError;
use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ConsultError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Conversation has not been started")]
    NotStarted,

    #[error("Conversation was already started")]
    AlreadyStarted,

    #[error("Conversation has already ended")]
    AlreadyEnded,
}
