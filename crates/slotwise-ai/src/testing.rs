//! Canned collaborators for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use slotwise_core::{ExtractedEntities, RawText};

use crate::collaborator::{EntityExtractor, TextRecognizer};
use crate::error::CollaboratorError;

/// Returns the same OCR result for every image, or fails every time.
#[derive(Debug, Default)]
pub struct StubRecognizer {
    result: Option<RawText>,
    calls: AtomicUsize,
}

impl StubRecognizer {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            result: Some(RawText::new(text, confidence)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextRecognizer for StubRecognizer {
    async fn recognize(&self, _image: &[u8]) -> Result<RawText, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().ok_or(CollaboratorError::NoText)
    }
}

/// Returns the same entities for every text, or fails every time.
#[derive(Debug, Default)]
pub struct StubExtractor {
    result: Option<ExtractedEntities>,
    calls: AtomicUsize,
}

impl StubExtractor {
    pub fn new(
        date_phrase: Option<&str>,
        time_phrase: Option<&str>,
        department: Option<&str>,
        confidence: f32,
    ) -> Self {
        Self {
            result: Some(ExtractedEntities {
                date_phrase: date_phrase.map(str::to_string),
                time_phrase: time_phrase.map(str::to_string),
                department: department.map(str::to_string),
                confidence,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityExtractor for StubExtractor {
    async fn extract(&self, _text: &str) -> Result<ExtractedEntities, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .ok_or_else(|| CollaboratorError::MalformedResponse("stub extractor failure".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stubs_count_calls() {
        let ocr = StubRecognizer::new("dentist", 0.9);
        let llm = StubExtractor::new(None, None, Some("dentist"), 0.7);
        ocr.recognize(b"img").await.unwrap();
        llm.extract("dentist").await.unwrap();
        llm.extract("dentist").await.unwrap();
        assert_eq!(ocr.calls(), 1);
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn failing_stubs_fail() {
        assert!(StubRecognizer::failing().recognize(b"img").await.is_err());
        assert!(StubExtractor::failing().extract("x").await.is_err());
    }
}
