// src/models/matching.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::master::{CourseId, InstitutionId, StateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStage {
    Exact,
    HierarchicalFuzzy,
    Unmatched,
}

impl MatchStage {
    /// Higher is more certain. Used to pick the weakest stage of a group.
    pub fn certainty(&self) -> u8 {
        match self {
            MatchStage::Exact => 2,
            MatchStage::HierarchicalFuzzy => 1,
            MatchStage::Unmatched => 0,
        }
    }

    pub fn weaker(self, other: MatchStage) -> MatchStage {
        if other.certainty() < self.certainty() {
            other
        } else {
            self
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStage::Exact => "exact",
            MatchStage::HierarchicalFuzzy => "hierarchical-fuzzy",
            MatchStage::Unmatched => "unmatched",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    StateUnresolved,
    NoInstitutionCandidates,
    InstitutionBelowThreshold,
    CourseBelowThreshold,
    MatchingDisabled,
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnmatchedReason::StateUnresolved => "state could not be resolved",
            UnmatchedReason::NoInstitutionCandidates => "no institution shares a significant token",
            UnmatchedReason::InstitutionBelowThreshold => "best institution score below acceptance threshold",
            UnmatchedReason::CourseBelowThreshold => "best course score below acceptance threshold",
            UnmatchedReason::MatchingDisabled => "matching disabled for this run",
        };
        f.write_str(text)
    }
}

/// Resolution of one admission row against master data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub state_ref: Option<StateId>,
    pub institution_ref: Option<InstitutionId>,
    pub course_ref: Option<CourseId>,
    /// Canonical category name, or the normalized source text when no master entry fits.
    pub category: String,
    pub quota: String,
    pub confidence: f64,
    pub match_stage: MatchStage,
    pub unmatched_reason: Option<UnmatchedReason>,
}

impl MatchResult {
    pub fn unmatched(reason: UnmatchedReason) -> Self {
        Self {
            state_ref: None,
            institution_ref: None,
            course_ref: None,
            category: String::new(),
            quota: String::new(),
            confidence: 0.0,
            match_stage: MatchStage::Unmatched,
            unmatched_reason: Some(reason),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.match_stage != MatchStage::Unmatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weaker_stage() {
        assert_eq!(MatchStage::Exact.weaker(MatchStage::HierarchicalFuzzy), MatchStage::HierarchicalFuzzy);
        assert_eq!(MatchStage::HierarchicalFuzzy.weaker(MatchStage::Exact), MatchStage::HierarchicalFuzzy);
        assert_eq!(MatchStage::Exact.weaker(MatchStage::Exact), MatchStage::Exact);
    }

    #[test]
    fn test_stage_serializes_kebab_case() {
        let json = serde_json::to_string(&MatchStage::HierarchicalFuzzy).unwrap();
        assert_eq!(json, "\"hierarchical-fuzzy\"");
    }
}
