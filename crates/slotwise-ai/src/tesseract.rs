//! OCR via the `tesseract` command-line engine.
//!
//! Image bytes go in on stdin and word-level TSV comes back on stdout, so no
//! temporary files are written.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use slotwise_core::RawText;
use slotwise_core::text::recognized_text;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::collaborator::TextRecognizer;
use crate::error::CollaboratorError;

pub const DEFAULT_BINARY: &str = "tesseract";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Engine score assumed when no word carries one.
const FALLBACK_ENGINE_CONFIDENCE: f32 = 0.7;

/// Column index of `conf` and `text` in tesseract's TSV output.
const CONF_COL: usize = 10;
const TEXT_COL: usize = 11;

#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    timeout_secs: u64,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY, DEFAULT_TIMEOUT_SECS)
    }
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            binary: binary.into(),
            timeout_secs,
        }
    }

    async fn run(&self, image: &[u8]) -> Result<String, CollaboratorError> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CollaboratorError::BinaryNotFound(self.binary.clone()),
                _ => CollaboratorError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(CollaboratorError::Engine {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TextRecognizer for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<RawText, CollaboratorError> {
        if image.is_empty() {
            return Err(CollaboratorError::EmptyInput);
        }

        debug!(bytes = image.len(), binary = %self.binary.display(), "running tesseract");
        let tsv = tokio::time::timeout(Duration::from_secs(self.timeout_secs), self.run(image))
            .await
            .map_err(|_| CollaboratorError::Timeout(self.timeout_secs))??;

        let (text, engine_confidence) = parse_tsv(&tsv).ok_or(CollaboratorError::NoText)?;
        let raw = recognized_text(&text, Some(engine_confidence));
        info!(
            chars = raw.text.len(),
            engine_confidence,
            confidence = raw.confidence,
            "recognized text"
        );
        Ok(raw)
    }
}

/// Join recognized words and average their confidences (scaled to `[0, 1]`).
///
/// Rows with `conf == -1` carry layout only and are skipped for scoring.
/// Returns `None` when no word was recognized.
fn parse_tsv(tsv: &str) -> Option<(String, f32)> {
    let mut words = Vec::new();
    let mut confidences = Vec::new();

    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        let Some(word) = cols.get(TEXT_COL).map(|w| w.trim()) else {
            continue;
        };
        if word.is_empty() {
            continue;
        }
        words.push(word);
        if let Some(conf) = cols.get(CONF_COL).and_then(|c| c.trim().parse::<f32>().ok())
            && conf >= 0.0
        {
            confidences.push(conf / 100.0);
        }
    }

    if words.is_empty() {
        return None;
    }
    let engine_confidence = if confidences.is_empty() {
        FALLBACK_ENGINE_CONFIDENCE
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };
    Some((words.join(" "), engine_confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn row(conf: &str, text: &str) -> String {
        format!("5\t1\t1\t1\t1\t1\t10\t10\t50\t20\t{conf}\t{text}")
    }

    #[test]
    fn averages_word_confidence() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t".to_string(),
            row("90", "Dentist"),
            row("80", "tomorrow"),
            row("70", "3pm"),
        ]
        .join("\n");
        let (text, conf) = parse_tsv(&tsv).unwrap();
        assert_eq!(text, "Dentist tomorrow 3pm");
        assert!((conf - 0.8).abs() < 1e-6);
    }

    #[test]
    fn missing_scores_fall_back() {
        let tsv = [HEADER.to_string(), row("-1", "Dentist")].join("\n");
        let (_, conf) = parse_tsv(&tsv).unwrap();
        assert_eq!(conf, FALLBACK_ENGINE_CONFIDENCE);
    }

    #[test]
    fn blank_page_has_no_text() {
        let tsv = [HEADER.to_string(), row("95", " ")].join("\n");
        assert!(parse_tsv(&tsv).is_none());
        assert!(parse_tsv("").is_none());
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let ocr = TesseractOcr::new("/nonexistent/slotwise-tesseract", 5);
        assert!(matches!(
            ocr.recognize(b"not an image").await,
            Err(CollaboratorError::BinaryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_image_is_rejected() {
        let ocr = TesseractOcr::default();
        assert!(matches!(
            ocr.recognize(&[]).await,
            Err(CollaboratorError::EmptyInput)
        ));
    }
}
