//! Admission policy: required fields plus per-stage confidence thresholds.
//!
//! A request is accepted only when date, time, and department are all
//! resolved and every stage confidence meets its threshold. Otherwise every
//! failing field and stage is reported together, in [`Reason`] order.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use crate::config::{PipelineConfig, TargetZone};
use crate::confidence::{Stage, StageConfidences, Thresholds};
use crate::datetime::FieldResolution;
use crate::department::Department;
use crate::types::{Clarification, Decision, NormalizedAppointment, Reason};

const MESSAGE_PREFIX: &str = "Please clarify the appointment request";

/// Applies the admission policy. Cheap to construct; holds no request state.
#[derive(Debug, Clone, Copy)]
pub struct Guardrail {
    thresholds: Thresholds,
    zone: TargetZone,
}

impl Guardrail {
    pub fn new(thresholds: Thresholds, zone: TargetZone) -> Self {
        Self { thresholds, zone }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.thresholds, config.timezone)
    }

    /// Decide between an appointment and a clarification request.
    pub fn evaluate(
        &self,
        date: &FieldResolution<NaiveDate>,
        time: &FieldResolution<NaiveTime>,
        department: &Department,
        confidences: &StageConfidences,
    ) -> Decision {
        let mut concerns: BTreeMap<Reason, String> = BTreeMap::new();

        if let Some(fragment) = field_concern(date, "date") {
            concerns.insert(Reason::Date, fragment);
        }
        if let Some(fragment) = field_concern(time, "time") {
            concerns.insert(Reason::Time, fragment);
        }
        if department.is_absent() {
            concerns.insert(Reason::Department, format!("missing {}", department_label()));
        }
        for stage in [Stage::Ocr, Stage::Extraction, Stage::Normalization] {
            let confidence = confidences.get(stage);
            if !self.thresholds.admits(stage, confidence) {
                concerns.insert(stage.reason(), confidence_fragment(stage, confidence));
            }
        }

        if concerns.is_empty()
            && let (Some(date), Some(time), Some(label)) =
                (date.value(), time.value(), department.label())
        {
            return Decision::Ok {
                appointment: NormalizedAppointment {
                    department: label.to_string(),
                    date,
                    time,
                    timezone: self.zone.name().to_string(),
                },
            };
        }
        clarify(concerns)
    }

    /// Clarification for a stage that failed its threshold before later
    /// stages ran.
    pub fn reject_stage(&self, stage: Stage, confidence: f32) -> Decision {
        let mut concerns = BTreeMap::new();
        concerns.insert(stage.reason(), confidence_fragment(stage, confidence));
        clarify(concerns)
    }
}

fn department_label() -> &'static str {
    "department/appointment type"
}

fn field_concern<T: Copy>(field: &FieldResolution<T>, label: &str) -> Option<String> {
    match field {
        FieldResolution::Resolved(_) => None,
        FieldResolution::Absent => Some(format!("missing {label}")),
        FieldResolution::Unresolved { .. } => Some(format!("unclear {label}")),
    }
}

fn confidence_fragment(stage: Stage, confidence: f32) -> String {
    format!("low {} confidence ({confidence:.2})", stage.label())
}

/// Join fragments into one sentence, in reason order.
fn clarify(concerns: BTreeMap<Reason, String>) -> Decision {
    let message = format!(
        "{MESSAGE_PREFIX}: {}.",
        concerns.values().cloned().collect::<Vec<_>>().join(", ")
    );
    let reasons = concerns.keys().copied().collect();
    // Every unresolved field and failed stage records a concern.
    let clarification =
        Clarification::new(reasons, message).expect("rejected request has at least one concern");
    Decision::NeedsClarification(clarification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::{Resolved, Unresolved};

    fn guardrail() -> Guardrail {
        Guardrail::new(Thresholds::default(), TargetZone::kolkata())
    }

    fn date() -> FieldResolution<NaiveDate> {
        FieldResolution::Resolved(Resolved {
            value: NaiveDate::from_ymd_opt(2026, 10, 23).unwrap(),
            certainty: 0.9,
            relative: true,
        })
    }

    fn time() -> FieldResolution<NaiveTime> {
        FieldResolution::Resolved(Resolved {
            value: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            certainty: 1.0,
            relative: false,
        })
    }

    fn dentistry() -> Department {
        Department::Canonical("Dentistry".into())
    }

    fn confident() -> StageConfidences {
        StageConfidences {
            ocr: 0.8,
            extraction: 0.95,
            normalization: 0.9,
        }
    }

    fn reasons(decision: &Decision) -> Vec<&'static str> {
        decision
            .clarification()
            .map(|c| c.reasons().iter().map(|r| r.as_str()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn complete_and_confident_is_ok() {
        let decision = guardrail().evaluate(&date(), &time(), &dentistry(), &confident());
        let appt = decision.appointment().expect("expected ok");
        assert_eq!(appt.department, "Dentistry");
        assert_eq!(appt.date_iso(), "2026-10-23");
        assert_eq!(appt.time_hhmm(), "15:00");
        assert_eq!(appt.timezone, "Asia/Kolkata");
    }

    #[test]
    fn unknown_department_is_accepted() {
        let decision = guardrail().evaluate(
            &date(),
            &time(),
            &Department::Unknown("Physiotherapy".into()),
            &confident(),
        );
        assert_eq!(
            decision.appointment().map(|a| a.department.as_str()),
            Some("Physiotherapy")
        );
    }

    #[test]
    fn missing_date_and_department() {
        let decision = guardrail().evaluate(
            &FieldResolution::Absent,
            &time(),
            &Department::Absent,
            &confident(),
        );
        assert_eq!(reasons(&decision), vec!["date", "department"]);
        assert_eq!(
            decision.clarification().unwrap().message(),
            "Please clarify the appointment request: missing date, missing department/appointment type."
        );
    }

    #[test]
    fn each_missing_field_is_named_alone() {
        let g = guardrail();
        let d = g.evaluate(&FieldResolution::Absent, &time(), &dentistry(), &confident());
        assert_eq!(reasons(&d), vec!["date"]);
        let d = g.evaluate(&date(), &FieldResolution::Absent, &dentistry(), &confident());
        assert_eq!(reasons(&d), vec!["time"]);
        let d = g.evaluate(&date(), &time(), &Department::Absent, &confident());
        assert_eq!(reasons(&d), vec!["department"]);
    }

    #[test]
    fn unresolved_date_is_unclear() {
        let decision = guardrail().evaluate(
            &FieldResolution::Unresolved {
                reason: Unresolved::Range,
            },
            &time(),
            &dentistry(),
            &confident(),
        );
        assert_eq!(reasons(&decision), vec!["date"]);
        assert_eq!(
            decision.clarification().unwrap().message(),
            "Please clarify the appointment request: unclear date."
        );
    }

    #[test]
    fn low_confidence_blocks_complete_request() {
        let decision = guardrail().evaluate(
            &date(),
            &time(),
            &dentistry(),
            &StageConfidences {
                ocr: 0.10,
                ..confident()
            },
        );
        assert!(!decision.is_ok());
        assert_eq!(reasons(&decision), vec!["ocr_confidence"]);
        assert_eq!(
            decision.clarification().unwrap().message(),
            "Please clarify the appointment request: low text extraction confidence (0.10)."
        );
    }

    #[test]
    fn field_and_confidence_failures_are_unioned() {
        let decision = guardrail().evaluate(
            &date(),
            &FieldResolution::Unresolved {
                reason: Unresolved::AmbiguousMeridiem,
            },
            &Department::Absent,
            &StageConfidences {
                ocr: 0.8,
                extraction: 0.55,
                normalization: 0.5,
            },
        );
        assert_eq!(
            reasons(&decision),
            vec![
                "time",
                "department",
                "extraction_confidence",
                "normalization_confidence"
            ]
        );
        assert_eq!(
            decision.clarification().unwrap().message(),
            "Please clarify the appointment request: unclear time, missing department/appointment type, \
             low entity extraction confidence (0.55), low date/time normalization confidence (0.50)."
        );
    }

    #[test]
    fn confidence_at_threshold_passes() {
        let decision = guardrail().evaluate(
            &date(),
            &time(),
            &dentistry(),
            &StageConfidences {
                ocr: 0.5,
                extraction: 0.6,
                normalization: 0.7,
            },
        );
        assert!(decision.is_ok());
    }

    #[test]
    fn reject_stage_names_only_that_stage() {
        let decision = guardrail().reject_stage(Stage::Extraction, 0.4);
        assert_eq!(reasons(&decision), vec!["extraction_confidence"]);
        assert_eq!(
            decision.clarification().unwrap().message(),
            "Please clarify the appointment request: low entity extraction confidence (0.40)."
        );
    }

    #[test]
    fn custom_thresholds_are_respected() {
        let strict = Guardrail::new(
            Thresholds {
                ocr: 0.9,
                ..Thresholds::default()
            },
            TargetZone::kolkata(),
        );
        let decision = strict.evaluate(&date(), &time(), &dentistry(), &confident());
        assert_eq!(reasons(&decision), vec!["ocr_confidence"]);
    }
}
