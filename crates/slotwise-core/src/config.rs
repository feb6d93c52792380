//! Pipeline configuration: target timezone, reference clock, thresholds,
//! combiner weights, and the department table.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use thiserror::Error;

use crate::confidence::{CombinerWeights, Thresholds};
use crate::department::DepartmentTable;

/// Process-wide target timezone identifier.
pub const TARGET_TIMEZONE: &str = "Asia/Kolkata";

/// Asia/Kolkata observes no daylight saving, so a fixed +05:30 offset is exact.
const KOLKATA_OFFSET: FixedOffset = match FixedOffset::east_opt(5 * 3600 + 30 * 60) {
    Some(offset) => offset,
    None => panic!("invalid Asia/Kolkata offset"),
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{stage} threshold must be within [0, 1], got {value}")]
    Threshold { stage: &'static str, value: f32 },

    #[error("combiner weights must be non-negative with a positive sum")]
    Weights,

    #[error("combiner floor bias must be within [0, 1], got {0}")]
    FloorBias(f32),

    #[error("department table is empty")]
    EmptyDepartments,
}

/// The zone in which "today" and all resolved dates are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetZone {
    name: &'static str,
    offset: FixedOffset,
}

impl Default for TargetZone {
    fn default() -> Self {
        Self::kolkata()
    }
}

impl TargetZone {
    pub fn kolkata() -> Self {
        Self {
            name: TARGET_TIMEZONE,
            offset: KOLKATA_OFFSET,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date of `instant` in this zone.
    pub fn today(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}

/// Source of the reference instant against which relative phrases resolve.
pub trait ReferenceClock: fmt::Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time. Production default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ReferenceClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A pinned instant, for tests and reproducible runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl ReferenceClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Everything the pipeline reads besides the request itself.
///
/// Built once at pipeline construction and never consulted ad hoc from
/// anywhere else.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub timezone: TargetZone,
    pub clock: Arc<dyn ReferenceClock>,
    pub thresholds: Thresholds,
    pub weights: CombinerWeights,
    pub departments: DepartmentTable,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timezone: TargetZone::kolkata(),
            clock: Arc::new(SystemClock),
            thresholds: Thresholds::default(),
            weights: CombinerWeights::default(),
            departments: DepartmentTable::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_clock(mut self, clock: impl ReferenceClock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_weights(mut self, weights: CombinerWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_departments(mut self, departments: DepartmentTable) -> Self {
        self.departments = departments;
        self
    }

    /// Reject thresholds outside `[0, 1]` and degenerate weights.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        for (stage, value) in [
            ("ocr", t.ocr),
            ("extraction", t.extraction),
            ("normalization", t.normalization),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Threshold { stage, value });
            }
        }

        let w = &self.weights;
        let weights = [w.ocr, w.extraction, w.normalization];
        if weights.iter().any(|v| !v.is_finite() || *v < 0.0) || weights.iter().sum::<f32>() <= 0.0
        {
            return Err(ConfigError::Weights);
        }
        if !(0.0..=1.0).contains(&w.floor_bias) {
            return Err(ConfigError::FloorBias(w.floor_bias));
        }

        if self.departments.is_empty() {
            return Err(ConfigError::EmptyDepartments);
        }
        Ok(())
    }
}
