//! Request-scoped values passed between pipeline stages.
//!
//! Every stage consumes the previous stage's value by reference and builds a
//! new one; nothing here is mutated after construction.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize, Serializer};

/// Text recovered from the request by OCR or typed-text intake.
///
/// `confidence` estimates the quality of the recovered characters, not of
/// their meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawText {
    pub text: String,
    pub confidence: f32,
}

impl RawText {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Zero-confidence stand-in for a text collaborator that failed.
    pub fn unavailable() -> Self {
        Self::new(String::new(), 0.0)
    }
}

/// Entities pulled out of raw text by the extraction collaborator.
///
/// Each field is independently optional: `None` means the entity was not
/// found in the text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub date_phrase: Option<String>,
    pub time_phrase: Option<String>,
    pub department: Option<String>,
    #[serde(default)]
    pub confidence: f32,
}

impl ExtractedEntities {
    /// Zero-confidence, empty stand-in for an extraction collaborator that failed.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Number of entities that were found.
    pub fn found_count(&self) -> usize {
        [&self.date_phrase, &self.time_phrase, &self.department]
            .iter()
            .filter(|f| f.is_some())
            .count()
    }
}

/// A fully resolved appointment. Holding one implies every field resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedAppointment {
    pub department: String,
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_hhmm")]
    pub time: NaiveTime,
    #[serde(rename = "tz")]
    pub timezone: String,
}

impl NormalizedAppointment {
    /// ISO calendar date, e.g. `2026-10-23`.
    pub fn date_iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// 24-hour clock time at minute precision, e.g. `15:00`.
    pub fn time_hhmm(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

fn serialize_hhmm<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&time.format("%H:%M"))
}

/// Why a request needs clarification. Variant order is the reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Date,
    Time,
    Department,
    OcrConfidence,
    ExtractionConfidence,
    NormalizationConfidence,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::Department => "department",
            Self::OcrConfidence => "ocr_confidence",
            Self::ExtractionConfidence => "extraction_confidence",
            Self::NormalizationConfidence => "normalization_confidence",
        }
    }

    /// True for the three required appointment fields.
    pub fn is_field(&self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::Department)
    }
}

/// A non-empty, ordered set of reasons plus a human-readable sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clarification {
    missing_or_ambiguous: BTreeSet<Reason>,
    message: String,
}

impl Clarification {
    /// Returns `None` when `reasons` is empty: a clarification must name
    /// at least one concrete problem.
    pub fn new(reasons: BTreeSet<Reason>, message: impl Into<String>) -> Option<Self> {
        if reasons.is_empty() {
            return None;
        }
        Some(Self {
            missing_or_ambiguous: reasons,
            message: message.into(),
        })
    }

    pub fn reasons(&self) -> &BTreeSet<Reason> {
        &self.missing_or_ambiguous
    }

    pub fn contains(&self, reason: Reason) -> bool {
        self.missing_or_ambiguous.contains(&reason)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Final outcome of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Decision {
    Ok { appointment: NormalizedAppointment },
    NeedsClarification(Clarification),
}

impl Decision {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Ok { .. } => "ok",
            Self::NeedsClarification(_) => "needs_clarification",
        }
    }

    pub fn appointment(&self) -> Option<&NormalizedAppointment> {
        match self {
            Self::Ok { appointment } => Some(appointment),
            Self::NeedsClarification(_) => None,
        }
    }

    pub fn clarification(&self) -> Option<&Clarification> {
        match self {
            Self::Ok { .. } => None,
            Self::NeedsClarification(c) => Some(c),
        }
    }
}
