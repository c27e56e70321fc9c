// src/matching/mod.rs - Hierarchical resolution of admission rows against the master index
pub mod batch;
pub mod course;
pub mod institution;
pub mod scoring;

pub use batch::{BatchOutcome, MatchedRow};
pub use course::detect_course_scope;
pub use scoring::{similarity, soft_token_dice};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::index::MasterDataIndex;
use crate::models::{MatchResult, MatchStage, RawAdmissionRow, UnmatchedReason};

/// Confidence multiplier when the winner among tied candidates was picked by id alone.
pub const AMBIGUITY_PENALTY: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub exact_threshold: f64,
    pub accept_threshold: f64,
    pub tie_epsilon: f64,
    pub cache_capacity: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 0.92,
            accept_threshold: 0.75,
            tie_epsilon: 0.005,
            cache_capacity: 256,
        }
    }
}

/// Stateless apart from the shared read-only index; cheap to clone into worker tasks.
#[derive(Debug, Clone)]
pub struct HierarchicalMatcher {
    index: Arc<MasterDataIndex>,
    config: MatcherConfig,
}

impl HierarchicalMatcher {
    pub fn new(index: Arc<MasterDataIndex>, config: MatcherConfig) -> Self {
        Self { index, config }
    }

    pub fn index(&self) -> &MasterDataIndex {
        &self.index
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Full resolution of one row. The course's stream scopes the institution search.
    /// Exact only when both institution and course are exact; confidence is the weaker
    /// of the two.
    pub fn match_row(&self, row: &RawAdmissionRow) -> MatchResult {
        let institution = self.match_institution(
            &row.state_text,
            row.location_text.as_deref(),
            &row.institution_text,
            self.course_stream(&row.course_text),
        );
        let course = self.match_course(&row.course_text);
        self.combine(row, institution, course)
    }

    pub(crate) fn combine(
        &self,
        row: &RawAdmissionRow,
        institution: MatchResult,
        course: MatchResult,
    ) -> MatchResult {
        let category = self.index.resolve_category(&row.category_text);
        let quota = self.index.resolve_quota(&row.quota_text);

        if !institution.is_matched() {
            return MatchResult {
                category,
                quota,
                ..institution
            };
        }
        if !course.is_matched() {
            return MatchResult {
                state_ref: institution.state_ref,
                institution_ref: institution.institution_ref,
                category,
                quota,
                ..MatchResult::unmatched(UnmatchedReason::CourseBelowThreshold)
            };
        }

        let match_stage = if institution.match_stage == MatchStage::Exact
            && course.match_stage == MatchStage::Exact
        {
            MatchStage::Exact
        } else {
            MatchStage::HierarchicalFuzzy
        };
        MatchResult {
            state_ref: institution.state_ref,
            institution_ref: institution.institution_ref,
            course_ref: course.course_ref,
            category,
            quota,
            confidence: institution.confidence.min(course.confidence),
            match_stage,
            unmatched_reason: None,
        }
    }
}
