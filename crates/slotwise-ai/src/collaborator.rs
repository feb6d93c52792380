//! Seams for the two external collaborators.
//!
//! Both are async and fallible. Implementations must be safe to share
//! across concurrent requests.

use async_trait::async_trait;
use slotwise_core::{ExtractedEntities, RawText};

use crate::error::CollaboratorError;

/// Recovers text from image bytes.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<RawText, CollaboratorError>;
}

/// Pulls date, time, and department phrases out of free text.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<ExtractedEntities, CollaboratorError>;
}
