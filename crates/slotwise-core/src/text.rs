//! Text intake: cleanup shared by typed input and OCR output.

use crate::confidence::text_confidence;
use crate::types::RawText;

/// Collapse whitespace runs (including newlines) to single spaces and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build [`RawText`] from typed input: cleaned, scored as typed text.
pub fn typed_text(text: &str) -> RawText {
    let cleaned = clean_text(text);
    let confidence = text_confidence(&cleaned, None);
    RawText::new(cleaned, confidence)
}

/// Build [`RawText`] from OCR output, folding the engine's own score into
/// the text-quality heuristics.
pub fn recognized_text(text: &str, engine_confidence: Option<f32>) -> RawText {
    let cleaned = clean_text(text);
    let confidence = text_confidence(&cleaned, engine_confidence);
    RawText::new(cleaned, confidence)
}
