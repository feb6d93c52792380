//! Per-request orchestration.
//!
//! A request moves `Start → Extracted → Normalized → Decided`. Each stage runs
//! at most once, and a stage whose confidence falls below its threshold ends
//! the request there with a clarification naming that stage.
//!
//! Collaborator failures never reach the caller: they are logged and replaced
//! by zero-confidence input, which the guardrail then rejects.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use slotwise_ai::{EntityExtractor, TextRecognizer};
use slotwise_core::datetime::{self, FieldResolution};
use slotwise_core::text::typed_text;
use slotwise_core::{
    ConfigError, Decision, Department, ExtractedEntities, Guardrail, PipelineConfig, RawText,
    Stage, StageConfidences,
};
use tracing::{info, warn};

/// What the caller submitted.
#[derive(Debug, Clone)]
pub enum PipelineInput {
    Text(String),
    Image(Vec<u8>),
}

/// Position in the request lifecycle before the decision. The terminal
/// `Decided` state is the [`PipelineOutcome`] itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    Extracted,
    Normalized,
}

/// Date, time, and department after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalized {
    pub date: FieldResolution<NaiveDate>,
    pub time: FieldResolution<NaiveTime>,
    pub department: Department,
    pub confidence: f32,
}

/// Confidence of each stage that ran; `None` for stages never reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageReport {
    pub ocr: Option<f32>,
    pub extraction: Option<f32>,
    pub normalization: Option<f32>,
}

impl StageReport {
    /// Unreached stages count as zero.
    fn as_confidences(&self) -> StageConfidences {
        StageConfidences {
            ocr: self.ocr.unwrap_or(0.0),
            extraction: self.extraction.unwrap_or(0.0),
            normalization: self.normalization.unwrap_or(0.0),
        }
    }
}

/// Result envelope for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    #[serde(flatten)]
    pub decision: Decision,
    pub confidence: StageReport,
    pub overall_confidence: f32,
    /// Last state reached before the decision was made.
    pub decided_at: PipelineState,
}

/// Shared, immutable pipeline. Clone the `Arc` or borrow it across tasks.
pub struct Pipeline {
    config: PipelineConfig,
    guardrail: Guardrail,
    recognizer: Arc<dyn TextRecognizer>,
    extractor: Arc<dyn EntityExtractor>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        recognizer: Arc<dyn TextRecognizer>,
        extractor: Arc<dyn EntityExtractor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            guardrail: Guardrail::from_config(&config),
            config,
            recognizer,
            extractor,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Recover text: typed input is cleaned and scored, images go to OCR.
    pub async fn parse(&self, input: &PipelineInput) -> RawText {
        match input {
            PipelineInput::Text(text) => typed_text(text),
            PipelineInput::Image(bytes) => match self.recognizer.recognize(bytes).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "text recognition failed; continuing with no text");
                    RawText::unavailable()
                }
            },
        }
    }

    /// Pull entity phrases out of recovered text.
    pub async fn extract(&self, raw: &RawText) -> ExtractedEntities {
        match self.extractor.extract(&raw.text).await {
            Ok(mut entities) => {
                entities.confidence = entities.confidence.clamp(0.0, 1.0);
                entities
            }
            Err(e) => {
                warn!(error = %e, "entity extraction failed; continuing with no entities");
                ExtractedEntities::unavailable()
            }
        }
    }

    /// Resolve date and time against the configured clock and map the
    /// department onto the table.
    pub fn normalize(&self, entities: &ExtractedEntities) -> Normalized {
        self.normalize_at(entities, self.config.clock.now())
    }

    fn normalize_at(&self, entities: &ExtractedEntities, reference: DateTime<Utc>) -> Normalized {
        let resolved = datetime::resolve(
            entities.date_phrase.as_deref(),
            entities.time_phrase.as_deref(),
            reference,
            &self.config.timezone,
        );
        let department = self
            .config
            .departments
            .normalize(entities.department.as_deref());
        Normalized {
            date: resolved.date,
            time: resolved.time,
            department,
            confidence: resolved.confidence(),
        }
    }

    /// Apply the guardrail to a normalized request.
    pub fn decide(&self, normalized: &Normalized, confidences: &StageConfidences) -> Decision {
        self.guardrail.evaluate(
            &normalized.date,
            &normalized.time,
            &normalized.department,
            confidences,
        )
    }

    /// Run every stage in order, stopping at the first failed confidence gate.
    pub async fn run(&self, input: PipelineInput) -> PipelineOutcome {
        let thresholds = &self.config.thresholds;
        let mut report = StageReport::default();

        let raw = self.parse(&input).await;
        report.ocr = Some(raw.confidence);
        if !thresholds.admits(Stage::Ocr, raw.confidence) {
            warn!(confidence = raw.confidence, "text confidence below threshold");
            return self.reject(Stage::Ocr, raw.confidence, report, PipelineState::Start);
        }

        let entities = self.extract(&raw).await;
        report.extraction = Some(entities.confidence);
        info!(
            stage = "extracted",
            found = entities.found_count(),
            confidence = entities.confidence,
            "stage complete"
        );
        if !thresholds.admits(Stage::Extraction, entities.confidence) {
            warn!(confidence = entities.confidence, "extraction confidence below threshold");
            return self.reject(
                Stage::Extraction,
                entities.confidence,
                report,
                PipelineState::Extracted,
            );
        }

        let normalized = self.normalize(&entities);
        report.normalization = Some(normalized.confidence);
        info!(
            stage = "normalized",
            date = normalized.date.is_resolved(),
            time = normalized.time.is_resolved(),
            department = ?normalized.department.label(),
            confidence = normalized.confidence,
            "stage complete"
        );

        let decision = self.decide(&normalized, &report.as_confidences());
        self.finish(decision, report, PipelineState::Normalized)
    }

    fn reject(
        &self,
        stage: Stage,
        confidence: f32,
        report: StageReport,
        at: PipelineState,
    ) -> PipelineOutcome {
        let decision = self.guardrail.reject_stage(stage, confidence);
        self.finish(decision, report, at)
    }

    fn finish(
        &self,
        decision: Decision,
        report: StageReport,
        decided_at: PipelineState,
    ) -> PipelineOutcome {
        let overall_confidence = self
            .config
            .weights
            .combine_stages(&report.as_confidences());
        info!(
            stage = "decided",
            status = decision.status(),
            overall_confidence,
            decided_at = ?decided_at,
            "request decided"
        );
        PipelineOutcome {
            decision,
            confidence: report,
            overall_confidence,
            decided_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use slotwise_ai::testing::{StubExtractor, StubRecognizer};
    use slotwise_core::{FixedClock, Reason, Thresholds};

    /// Monday 2026-10-19, 10:00 in Asia/Kolkata.
    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 4, 30, 0).unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default().with_clock(FixedClock(monday()))
    }

    fn pipeline(ocr: StubRecognizer, llm: StubExtractor) -> Pipeline {
        Pipeline::new(config(), Arc::new(ocr), Arc::new(llm)).unwrap()
    }

    fn text(s: &str) -> PipelineInput {
        PipelineInput::Text(s.to_string())
    }

    fn reasons(outcome: &PipelineOutcome) -> Vec<Reason> {
        outcome
            .decision
            .clarification()
            .map(|c| c.reasons().iter().copied().collect())
            .unwrap_or_default()
    }

    fn complete_extractor() -> StubExtractor {
        StubExtractor::new(Some("next Friday"), Some("3pm"), Some("dentist"), 0.95)
    }

    #[tokio::test]
    async fn complete_request_is_booked() {
        let p = pipeline(StubRecognizer::failing(), complete_extractor());
        let outcome = p.run(text("Book dentist next Friday at 3pm")).await;

        let appt = outcome.decision.appointment().expect("expected ok");
        assert_eq!(appt.department, "Dentistry");
        assert_eq!(appt.date_iso(), "2026-10-23");
        assert_eq!(appt.time_hhmm(), "15:00");
        assert_eq!(appt.timezone, "Asia/Kolkata");

        assert_eq!(
            outcome.confidence,
            StageReport {
                ocr: Some(0.8),
                extraction: Some(0.95),
                normalization: Some(0.9),
            }
        );
        assert_eq!(outcome.overall_confidence, 0.84);
        assert_eq!(outcome.decided_at, PipelineState::Normalized);
    }

    #[tokio::test]
    async fn missing_date_and_department_are_named() {
        let p = pipeline(
            StubRecognizer::failing(),
            StubExtractor::new(None, Some("3pm"), None, 0.70),
        );
        let outcome = p.run(text("I want to come in at 3pm please")).await;
        let named = reasons(&outcome);
        assert!(named.contains(&Reason::Date));
        assert!(named.contains(&Reason::Department));
        assert!(!named.contains(&Reason::Time));
        assert_eq!(outcome.decided_at, PipelineState::Normalized);
    }

    #[tokio::test]
    async fn vague_date_is_surfaced() {
        let p = pipeline(
            StubRecognizer::failing(),
            StubExtractor::new(Some("sometime next week"), Some("3pm"), Some("dentist"), 0.95),
        );
        let outcome = p.run(text("dentist sometime next week at 3pm")).await;
        assert_eq!(
            reasons(&outcome),
            vec![Reason::Date, Reason::NormalizationConfidence]
        );
        assert!(outcome.decision.appointment().is_none());
    }

    #[tokio::test]
    async fn unresolved_phrases_score_below_resolved_ones() {
        let vague = pipeline(
            StubRecognizer::failing(),
            StubExtractor::new(Some("sometime next week"), Some("3pm"), Some("dentist"), 0.95),
        )
        .run(text("dentist sometime next week at 3pm"))
        .await;
        let booked = pipeline(StubRecognizer::failing(), complete_extractor())
            .run(text("Book dentist next Friday at 3pm"))
            .await;

        assert_eq!(vague.confidence.normalization, Some(0.5));
        // 0.6 * 0.5 + 0.4 * (0.25 * 0.8 + 0.35 * 0.95 + 0.40 * 0.5) = 0.593
        assert_eq!(vague.overall_confidence, 0.59);
        assert!(vague.overall_confidence < booked.overall_confidence);

        let gibberish = pipeline(
            StubRecognizer::failing(),
            StubExtractor::new(Some("blursday"), Some("teatime"), Some("dentist"), 0.95),
        )
        .run(text("dentist on blursday at teatime"))
        .await;
        assert_eq!(gibberish.confidence.normalization, Some(0.0));
        assert_eq!(
            reasons(&gibberish),
            vec![Reason::Date, Reason::Time, Reason::NormalizationConfidence]
        );
    }

    #[tokio::test]
    async fn low_ocr_confidence_stops_before_extraction() {
        let llm = Arc::new(complete_extractor());
        let p = Pipeline::new(
            config(),
            Arc::new(StubRecognizer::new("dentist next friday 3pm", 0.10)),
            llm.clone(),
        )
        .unwrap();

        let outcome = p.run(PipelineInput::Image(b"png".to_vec())).await;
        assert_eq!(reasons(&outcome), vec![Reason::OcrConfidence]);
        assert_eq!(
            outcome.decision.clarification().unwrap().message(),
            "Please clarify the appointment request: low text extraction confidence (0.10)."
        );
        assert_eq!(outcome.decided_at, PipelineState::Start);
        assert_eq!(outcome.confidence.extraction, None);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn low_extraction_confidence_stops_before_normalization() {
        let p = pipeline(
            StubRecognizer::failing(),
            StubExtractor::new(None, None, None, 0.40),
        );
        let outcome = p.run(text("hello there, how are you")).await;
        assert_eq!(reasons(&outcome), vec![Reason::ExtractionConfidence]);
        assert_eq!(outcome.decided_at, PipelineState::Extracted);
        assert_eq!(outcome.confidence.normalization, None);
    }

    #[tokio::test]
    async fn failed_recognizer_yields_clarification() {
        let ocr = Arc::new(StubRecognizer::failing());
        let p = Pipeline::new(config(), ocr.clone(), Arc::new(complete_extractor())).unwrap();
        let outcome = p.run(PipelineInput::Image(vec![1, 2, 3])).await;
        assert_eq!(ocr.calls(), 1);
        assert_eq!(reasons(&outcome), vec![Reason::OcrConfidence]);
        assert_eq!(outcome.confidence.ocr, Some(0.0));
        assert_eq!(outcome.overall_confidence, 0.0);
    }

    #[tokio::test]
    async fn failed_extractor_yields_clarification() {
        let p = pipeline(StubRecognizer::failing(), StubExtractor::failing());
        let outcome = p.run(text("Book dentist next Friday at 3pm")).await;
        assert_eq!(reasons(&outcome), vec![Reason::ExtractionConfidence]);
        assert_eq!(outcome.confidence.extraction, Some(0.0));
    }

    #[tokio::test]
    async fn image_text_flows_through() {
        let p = pipeline(
            StubRecognizer::new("Cardio appt tomorrow 10am", 0.9),
            StubExtractor::new(Some("tomorrow"), Some("10am"), Some("cardio"), 0.95),
        );
        let outcome = p.run(PipelineInput::Image(b"jpeg".to_vec())).await;
        let appt = outcome.decision.appointment().expect("expected ok");
        assert_eq!(appt.department, "Cardiology");
        assert_eq!(appt.date_iso(), "2026-10-20");
        assert_eq!(appt.time_hhmm(), "10:00");
    }

    #[tokio::test]
    async fn stricter_thresholds_apply() {
        let config = config().with_thresholds(Thresholds {
            ocr: 0.9,
            ..Thresholds::default()
        });
        let p = Pipeline::new(
            config,
            Arc::new(StubRecognizer::failing()),
            Arc::new(complete_extractor()),
        )
        .unwrap();
        let outcome = p.run(text("Book dentist next Friday at 3pm")).await;
        assert_eq!(reasons(&outcome), vec![Reason::OcrConfidence]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = config().with_thresholds(Thresholds {
            extraction: -0.1,
            ..Thresholds::default()
        });
        let result = Pipeline::new(
            config,
            Arc::new(StubRecognizer::failing()),
            Arc::new(StubExtractor::failing()),
        );
        assert!(matches!(result, Err(ConfigError::Threshold { .. })));
    }

    #[test]
    fn normalize_is_deterministic() {
        let p = pipeline(StubRecognizer::failing(), StubExtractor::failing());
        let entities = ExtractedEntities {
            date_phrase: Some("next Friday".into()),
            time_phrase: Some("3pm".into()),
            department: Some("eye doctor".into()),
            confidence: 0.95,
        };
        let a = p.normalize(&entities);
        let b = p.normalize(&entities);
        assert_eq!(a, b);
        assert_eq!(a.department, Department::Canonical("Ophthalmology".into()));
        assert_eq!(a.confidence, 0.9);
    }

    #[tokio::test]
    async fn envelope_serializes_flat() {
        let p = pipeline(StubRecognizer::failing(), complete_extractor());
        let outcome = p.run(text("Book dentist next Friday at 3pm")).await;
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["appointment"]["date"], "2026-10-23");
        assert_eq!(json["appointment"]["time"], "15:00");
        assert_eq!(json["appointment"]["tz"], "Asia/Kolkata");
        assert_eq!(json["decided_at"], "normalized");
    }

    #[tokio::test]
    async fn concurrent_requests_are_independent() {
        let p = Arc::new(pipeline(StubRecognizer::failing(), complete_extractor()));
        let handles = (0..8).map(|i| {
            let p = p.clone();
            tokio::spawn(async move {
                let input = if i % 2 == 0 {
                    text("Book dentist next Friday at 3pm")
                } else {
                    text("")
                };
                p.run(input).await
            })
        });
        let outcomes = futures::future::join_all(handles).await;
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let outcome = outcome.unwrap();
            assert_eq!(outcome.decision.is_ok(), i % 2 == 0);
        }
    }
}
