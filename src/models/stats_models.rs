// src/models/stats_models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::cutoff::CutoffRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    LoadingFoundation,
    LoadingLocations,
    ImportingInstitutions,
    MatchingCounsellingData,
    Reporting,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }

    /// The stage that follows on success, `None` for terminal stages.
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Idle => Some(PipelineStage::LoadingFoundation),
            PipelineStage::LoadingFoundation => Some(PipelineStage::LoadingLocations),
            PipelineStage::LoadingLocations => Some(PipelineStage::ImportingInstitutions),
            PipelineStage::ImportingInstitutions => Some(PipelineStage::MatchingCounsellingData),
            PipelineStage::MatchingCounsellingData => Some(PipelineStage::Reporting),
            PipelineStage::Reporting => Some(PipelineStage::Done),
            PipelineStage::Done | PipelineStage::Failed => None,
        }
    }

    pub fn can_transition_to(&self, target: PipelineStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == PipelineStage::Failed || self.next() == Some(target)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::LoadingFoundation => "loading foundation data",
            PipelineStage::LoadingLocations => "loading locations",
            PipelineStage::ImportingInstitutions => "importing institutions",
            PipelineStage::MatchingCounsellingData => "matching counselling data",
            PipelineStage::Reporting => "reporting",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total_records: usize,
    pub valid_records: usize,
    pub malformed_records: usize,
    pub normalized_records: usize,
    /// Rows whose batch finished before cancellation.
    pub processed_records: usize,
    pub matched_records: usize,
    pub unmatched_records: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub average_confidence: f64,
    pub normalization_accuracy: f64,
    pub matching_accuracy: f64,
    pub cutoff_records: usize,
    /// Matched rows per emitted cutoff record.
    pub compression_ratio: f64,
    pub master_states: usize,
    pub master_institutions: usize,
    pub master_courses: usize,
    pub batch_cache_hits: usize,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
    pub unmatched: usize,
    pub needs_manual_review: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub cancelled: bool,
    pub final_stage: PipelineStage,
    pub failed_stage: Option<PipelineStage>,
    pub stage_timings: Vec<StageTiming>,
    pub stats: PipelineStats,
    pub quality_metrics: QualityMetrics,
    pub errors: Vec<String>,
    pub cutoffs: Vec<CutoffRecord>,
    /// SHA-256 over the serialized cutoff set.
    pub output_digest: String,
}
