pub mod confidence;
pub mod config;
pub mod datetime;
pub mod department;
pub mod guardrail;
pub mod text;
pub mod types;

pub use confidence::{CombinerWeights, Stage, StageConfidences, Thresholds};
pub use config::{
    ConfigError, FixedClock, PipelineConfig, ReferenceClock, SystemClock, TargetZone,
    TARGET_TIMEZONE,
};
pub use datetime::{FieldResolution, Resolved, ResolvedDateTime, Unresolved};
pub use department::{Department, DepartmentTable};
pub use guardrail::Guardrail;
pub use types::{Clarification, Decision, ExtractedEntities, NormalizedAppointment, RawText, Reason};
