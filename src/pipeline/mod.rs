pub mod consult;
pub mod ollama;

pub use ollama::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Ollama is not running at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Ollama returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Text generation capability shared by the extraction, flow and dialogue
/// engines. Implemented by [`ollama::OllamaClient`]; tests substitute mocks.
pub trait LlmClient {
    fn generate(&self, system: &str, prompt: &str, temperature: f32) -> Result<String, LlmError>;
}
