use std::path::PathBuf;

use thiserror::Error;

/// Failure of an OCR or LLM collaborator.
///
/// The pipeline never surfaces these to callers; it logs them and continues
/// with a zero-confidence stand-in so the guardrail can ask for clarification.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[cfg(feature = "gemini")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR binary not found: {0}")]
    BinaryNotFound(PathBuf),

    #[error("tesseract exited with {status}: {stderr}")]
    Engine { status: i32, stderr: String },

    #[error("no text could be recognized in the image")]
    NoText,

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("GEMINI_API_KEY is not configured")]
    MissingApiKey,

    #[error("empty input")]
    EmptyInput,

    #[error("invalid image payload: {0}")]
    InvalidPayload(String),
}
