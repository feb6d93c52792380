//! External collaborators: OCR for images and an LLM for entity extraction.

pub mod collaborator;
pub mod error;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod payload;
pub mod prompt;
pub mod response;
pub mod tesseract;
pub mod testing;

pub use collaborator::{EntityExtractor, TextRecognizer};
pub use error::CollaboratorError;
#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiExtractor};
pub use payload::{decode_image_payload, looks_like_image_payload};
pub use response::parse_llm_response;
pub use tesseract::TesseractOcr;
