//! Confidence scoring: per-stage heuristics, threshold checks, and the
//! conservative combination used as the overall pipeline confidence.

use serde::{Deserialize, Serialize};

use crate::types::Reason;

/// Default admission thresholds per stage.
pub mod thresholds {
    /// Below this the recovered text is too noisy to extract from.
    pub const OCR_MIN: f32 = 0.5;

    /// Below this the extracted entities are not normalized at all.
    pub const EXTRACTION_MIN: f32 = 0.6;

    /// Below this a resolved date/time is not trusted.
    pub const NORMALIZATION_MIN: f32 = 0.7;
}

/// Confidence assumed for typed text, which has no recognition engine score.
pub const TYPED_TEXT_BASE: f32 = 0.8;

/// A pipeline stage that carries its own confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ocr,
    Extraction,
    Normalization,
}

impl Stage {
    /// Phrase used in clarification messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ocr => "text extraction",
            Self::Extraction => "entity extraction",
            Self::Normalization => "date/time normalization",
        }
    }

    pub fn reason(&self) -> Reason {
        match self {
            Self::Ocr => Reason::OcrConfidence,
            Self::Extraction => Reason::ExtractionConfidence,
            Self::Normalization => Reason::NormalizationConfidence,
        }
    }
}

/// Per-stage minimum confidences. A score equal to its threshold passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub ocr: f32,
    pub extraction: f32,
    pub normalization: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ocr: thresholds::OCR_MIN,
            extraction: thresholds::EXTRACTION_MIN,
            normalization: thresholds::NORMALIZATION_MIN,
        }
    }
}

impl Thresholds {
    pub fn for_stage(&self, stage: Stage) -> f32 {
        match stage {
            Stage::Ocr => self.ocr,
            Stage::Extraction => self.extraction,
            Stage::Normalization => self.normalization,
        }
    }

    pub fn admits(&self, stage: Stage, confidence: f32) -> bool {
        meets_threshold(confidence, self.for_stage(stage))
    }
}

/// The three stage confidences of one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageConfidences {
    pub ocr: f32,
    pub extraction: f32,
    pub normalization: f32,
}

impl StageConfidences {
    pub fn get(&self, stage: Stage) -> f32 {
        match stage {
            Stage::Ocr => self.ocr,
            Stage::Extraction => self.extraction,
            Stage::Normalization => self.normalization,
        }
    }
}

/// Weights for [`CombinerWeights::combine`].
///
/// ```text
/// weighted = (ocr·w_ocr + extraction·w_ext + normalization·w_norm) / (w_ocr + w_ext + w_norm)
/// overall  = floor_bias·min(ocr, extraction, normalization) + (1 − floor_bias)·weighted
/// ```
///
/// With `floor_bias` well above zero a single weak stage pulls the overall
/// score down instead of being averaged away by its peers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinerWeights {
    pub ocr: f32,
    pub extraction: f32,
    pub normalization: f32,
    pub floor_bias: f32,
}

impl Default for CombinerWeights {
    fn default() -> Self {
        Self {
            ocr: 0.25,
            extraction: 0.35,
            normalization: 0.40,
            floor_bias: 0.6,
        }
    }
}

impl CombinerWeights {
    /// Combine three stage confidences into one overall score in `[0, 1]`,
    /// rounded to two decimals.
    pub fn combine(&self, ocr: f32, extraction: f32, normalization: f32) -> f32 {
        let scores = [ocr, extraction, normalization].map(|s| s.clamp(0.0, 1.0));
        let weights = [self.ocr, self.extraction, self.normalization];

        let total_weight: f32 = weights.iter().sum();
        let weighted = if total_weight > 0.0 {
            scores.iter().zip(weights).map(|(s, w)| s * w).sum::<f32>() / total_weight
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        };
        let floor = scores.iter().copied().fold(1.0f32, f32::min);

        let bias = self.floor_bias.clamp(0.0, 1.0);
        round2((bias * floor + (1.0 - bias) * weighted).clamp(0.0, 1.0))
    }

    pub fn combine_stages(&self, confidences: &StageConfidences) -> f32 {
        self.combine(
            confidences.ocr,
            confidences.extraction,
            confidences.normalization,
        )
    }
}

pub fn meets_threshold(confidence: f32, threshold: f32) -> bool {
    confidence >= threshold
}

/// Quality estimate for recovered text.
///
/// Starts from the engine's own score (or [`TYPED_TEXT_BASE`]) and applies
/// penalties for symbol-heavy text, implausible word lengths, and very short
/// input.
pub fn text_confidence(text: &str, engine_confidence: Option<f32>) -> f32 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    let mut confidence = engine_confidence.unwrap_or(TYPED_TEXT_BASE);

    let total_chars = text.chars().count();
    let special = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    let special_ratio = special as f32 / total_chars as f32;
    if special_ratio > 0.3 {
        confidence *= 0.6;
    } else if special_ratio > 0.15 {
        confidence *= 0.8;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if !words.is_empty() {
        let letters: usize = words.iter().map(|w| w.chars().count()).sum();
        let avg_word_len = letters as f32 / words.len() as f32;
        if !(2.0..=15.0).contains(&avg_word_len) {
            confidence *= 0.7;
        }
    }

    if total_chars < 5 {
        confidence *= 0.5;
    }

    round2(confidence.clamp(0.0, 1.0))
}

/// Extraction confidence from how many of the three entities were found.
pub fn extraction_confidence(found: usize) -> f32 {
    match found {
        0 => 0.40,
        1 => 0.70,
        2 => 0.85,
        _ => 0.95,
    }
}

/// Multiplier when the date did not resolve.
pub const UNRESOLVED_DATE_FACTOR: f32 = 0.5;
/// Multiplier when the time did not resolve.
pub const UNRESOLVED_TIME_FACTOR: f32 = 0.7;

/// Normalization confidence from the certainty of each resolved field.
///
/// `None` marks a field that is absent or unresolved. The least certain
/// resolved field sets the base, each unresolved field scales it down, and
/// with neither field resolved the result is 0.0.
pub fn normalization_confidence(date: Option<f32>, time: Option<f32>) -> f32 {
    let mut confidence = match (date, time) {
        (None, None) => return 0.0,
        (Some(d), Some(t)) => d.min(t),
        (Some(c), None) | (None, Some(c)) => c,
    };
    if date.is_none() {
        confidence *= UNRESOLVED_DATE_FACTOR;
    }
    if time.is_none() {
        confidence *= UNRESOLVED_TIME_FACTOR;
    }
    round2(confidence.clamp(0.0, 1.0))
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}
