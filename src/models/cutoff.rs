// src/models/cutoff.rs
use serde::{Deserialize, Serialize};

use crate::models::master::{CourseId, InstitutionId, StateId};
use crate::models::matching::MatchStage;

/// Grouping key for cutoff aggregation. Field order defines the output sort order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregationKey {
    pub state: StateId,
    pub institution_ref: InstitutionId,
    pub year: u16,
    pub round: String,
    pub course_ref: CourseId,
    pub quota: String,
    pub category: String,
}

/// Opening/closing rank interval for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoffRecord {
    pub key: AggregationKey,
    pub opening_rank: u32,
    pub closing_rank: u32,
    pub sample_count: usize,
    /// Minimum match confidence over the contributing rows.
    pub confidence: f64,
    /// Every contributing rank, ascending.
    pub ranks: Vec<u32>,
    pub weakest_stage: MatchStage,
}

impl CutoffRecord {
    pub fn is_single_observation(&self) -> bool {
        self.sample_count == 1
    }

    pub fn rank_spread(&self) -> u32 {
        self.closing_rank - self.opening_rank
    }
}
