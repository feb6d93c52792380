//! Plain-text card for an appointment outcome.
//!
//! Sections with nothing to show are skipped, so an accepted request has no
//! clarification block and a rejected one has no appointment block.

use std::fmt::Write;

use slotwise_pipeline::{PipelineOutcome, PipelineState};

const LABEL_WIDTH: usize = 22;

/// Render an outcome as a vertical card grouped by section.
pub fn render_outcome(outcome: &PipelineOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", outcome.decision.status());

    if let Some(appt) = outcome.decision.appointment() {
        section(
            &mut out,
            "Appointment",
            &[
                ("department", appt.department.clone()),
                ("date", appt.date_iso()),
                ("time", appt.time_hhmm()),
                ("tz", appt.timezone.clone()),
            ],
        );
    }

    if let Some(c) = outcome.decision.clarification() {
        let reasons: Vec<&str> = c.reasons().iter().map(|r| r.as_str()).collect();
        section(
            &mut out,
            "Clarification",
            &[
                ("missing_or_ambiguous", reasons.join(", ")),
                ("message", c.message().to_string()),
            ],
        );
    }

    let report = &outcome.confidence;
    section(
        &mut out,
        "Confidence",
        &[
            ("ocr", score(report.ocr)),
            ("extraction", score(report.extraction)),
            ("normalization", score(report.normalization)),
            ("overall", format!("{:.2}", outcome.overall_confidence)),
            ("decided_at", state(outcome.decided_at).to_string()),
        ],
    );
    out
}

fn section(out: &mut String, header: &str, rows: &[(&str, String)]) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{header}");
    for (label, value) in rows {
        let _ = writeln!(out, "  {label:<LABEL_WIDTH$} {value}");
    }
}

fn score(value: Option<f32>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "(not reached)".to_string(),
    }
}

fn state(s: PipelineState) -> &'static str {
    match s {
        PipelineState::Start => "start",
        PipelineState::Extracted => "extracted",
        PipelineState::Normalized => "normalized",
    }
}
