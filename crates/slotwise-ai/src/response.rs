//! Parsing of free-form model output into [`ExtractedEntities`].
//!
//! Models wrap JSON in Markdown fences, prepend chatter, or write the string
//! `"null"` instead of `null`. All of those are accepted. Anything that is not
//! a JSON object is a [`CollaboratorError::MalformedResponse`].

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use slotwise_core::ExtractedEntities;
use slotwise_core::confidence::extraction_confidence;

use crate::error::CollaboratorError;

static FENCED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));

static FLAT_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("valid regex"));

/// Placeholder strings models emit for "not found".
const NULL_WORDS: &[&str] = &["null", "none", "n/a"];

#[derive(Deserialize)]
struct RawEntities {
    #[serde(default)]
    date_phrase: Value,
    #[serde(default)]
    time_phrase: Value,
    #[serde(default)]
    department: Value,
}

/// Parse a model reply and score it by how many entities were found.
pub fn parse_llm_response(response: &str) -> Result<ExtractedEntities, CollaboratorError> {
    let mut text = response.trim();
    if let Some(caps) = FENCED.captures(text)
        && let Some(inner) = caps.get(1)
    {
        text = inner.as_str();
    }
    if let Some(m) = FLAT_OBJECT.find(text) {
        text = m.as_str();
    }

    let raw: RawEntities = serde_json::from_str(text).map_err(|e| {
        let excerpt: String = response.chars().take(200).collect();
        CollaboratorError::MalformedResponse(format!("{e}: {excerpt}"))
    })?;

    let mut entities = ExtractedEntities {
        date_phrase: normalize_entity(&raw.date_phrase),
        time_phrase: normalize_entity(&raw.time_phrase),
        department: normalize_entity(&raw.department),
        confidence: 0.0,
    };
    entities.confidence = extraction_confidence(entities.found_count());
    Ok(entities)
}

/// Trimmed string, or `None` for non-strings, blanks, and null placeholders.
fn normalize_entity(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    if s.is_empty() || NULL_WORDS.contains(&s.to_lowercase().as_str()) {
        return None;
    }
    Some(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json() {
        let e = parse_llm_response(
            r#"{"date_phrase": "next Friday", "time_phrase": "3pm", "department": "dentist"}"#,
        )
        .unwrap();
        assert_eq!(e.date_phrase.as_deref(), Some("next Friday"));
        assert_eq!(e.time_phrase.as_deref(), Some("3pm"));
        assert_eq!(e.department.as_deref(), Some("dentist"));
        assert_eq!(e.confidence, 0.95);
    }

    #[test]
    fn fenced_json_with_chatter() {
        let reply = "Sure! Here you go:\n```json\n{\"date_phrase\": \"tomorrow\", \"time_phrase\": null, \"department\": \"ENT\"}\n```\nLet me know.";
        let e = parse_llm_response(reply).unwrap();
        assert_eq!(e.date_phrase.as_deref(), Some("tomorrow"));
        assert!(e.time_phrase.is_none());
        assert_eq!(e.confidence, 0.85);
    }

    #[test]
    fn placeholder_strings_are_absent() {
        let e = parse_llm_response(
            r#"{"date_phrase": "null", "time_phrase": " N/A ", "department": "  "}"#,
        )
        .unwrap();
        assert_eq!(e.found_count(), 0);
        assert_eq!(e.confidence, 0.40);
    }

    #[test]
    fn missing_keys_and_non_strings_are_absent() {
        let e = parse_llm_response(r#"{"date_phrase": 12, "department": "  cardiology "}"#).unwrap();
        assert!(e.date_phrase.is_none());
        assert!(e.time_phrase.is_none());
        assert_eq!(e.department.as_deref(), Some("cardiology"));
        assert_eq!(e.confidence, 0.70);
    }

    #[test]
    fn prose_is_malformed() {
        assert!(matches!(
            parse_llm_response("I could not find any appointment details."),
            Err(CollaboratorError::MalformedResponse(_))
        ));
    }
}
