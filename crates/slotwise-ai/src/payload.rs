//! Base64 image payloads, optionally wrapped in a `data:` URI.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use crate::error::CollaboratorError;

static BASE64_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]+=*$").expect("valid regex"));

/// Shortest undecorated base64 string treated as an image.
const MIN_BARE_PAYLOAD: usize = 100;

/// Strip an optional `data:<mime>;base64,` prefix and decode.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, CollaboratorError> {
    let payload = payload.trim();
    let body = match payload.split_once(',') {
        Some((head, body)) if head.starts_with("data:") => body,
        _ => payload,
    };
    let body: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if body.is_empty() {
        return Err(CollaboratorError::EmptyInput);
    }
    STANDARD
        .decode(body.as_bytes())
        .map_err(|e| CollaboratorError::InvalidPayload(e.to_string()))
}

/// Heuristic: does `content` look like an image payload rather than prose?
pub fn looks_like_image_payload(content: &str) -> bool {
    if content.starts_with("data:image/") {
        return true;
    }
    let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    cleaned.len() > MIN_BARE_PAYLOAD
        && cleaned
            .get(..MIN_BARE_PAYLOAD)
            .is_some_and(|head| BASE64_HEAD.is_match(head))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_uri() {
        let bytes = decode_image_payload("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn decodes_bare_base64_with_line_breaks() {
        let bytes = decode_image_payload("aGVs\nbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode_image_payload("not base64 at all!"),
            Err(CollaboratorError::InvalidPayload(_))
        ));
        assert!(matches!(
            decode_image_payload("data:image/png;base64,"),
            Err(CollaboratorError::EmptyInput)
        ));
    }

    #[test]
    fn detects_payloads() {
        assert!(looks_like_image_payload("data:image/jpeg;base64,/9j/4AAQ"));
        assert!(looks_like_image_payload(&"QUJD".repeat(40)));
        assert!(!looks_like_image_payload("Book dentist next Friday at 3pm"));
        assert!(!looks_like_image_payload("QUJD"));
    }
}
