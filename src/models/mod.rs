pub mod cutoff;
pub mod master;
pub mod matching;
pub mod records;
pub mod stats_models;

pub use cutoff::{AggregationKey, CutoffRecord};
pub use master::{
    CourseDomain, CourseId, CourseLevel, FoundationData, InstitutionId, InstitutionLocation,
    ManagementKind, MasterCategory, MasterCourse, MasterInstitution, MasterQuota, MasterState,
    StateId,
};
pub use matching::{MatchResult, MatchStage, UnmatchedReason};
pub use records::{RawAdmissionRow, RawRowInput, RowValidationError};
pub use stats_models::{
    PipelineResult, PipelineStage, PipelineStats, QualityMetrics, StageTiming,
};
