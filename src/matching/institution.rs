// src/matching/institution.rs
use log::debug;
use std::collections::BTreeSet;

use crate::index::IndexedInstitution;
use crate::matching::scoring::similarity;
use crate::matching::{HierarchicalMatcher, AMBIGUITY_PENALTY};
use crate::models::{CourseDomain, MatchResult, MatchStage, UnmatchedReason};
use crate::normalize::{self, split_institution_text};

#[derive(Debug, Clone)]
struct ScoredCandidate<'a> {
    candidate: &'a IndexedInstitution,
    score: f64,
    exact: bool,
    location_overlap: bool,
}

/// Best of: bare name vs bare name, name+location vs name+campus, name vs name+campus.
fn score_candidate<'a>(
    candidate: &'a IndexedInstitution,
    query_name: &str,
    query_full: Option<&str>,
    overlap_tokens: &BTreeSet<String>,
) -> ScoredCandidate<'a> {
    let mut exact = query_name == candidate.normalized_name;
    let mut score = similarity(query_name, &candidate.normalized_name);

    for location in &candidate.normalized_locations {
        let candidate_full = format!("{} {}", candidate.normalized_name, location);
        if query_name == candidate_full || query_full == Some(candidate_full.as_str()) {
            exact = true;
        }
        score = score.max(similarity(query_name, &candidate_full));
        if let Some(full) = query_full {
            score = score.max(similarity(full, &candidate_full));
        }
    }
    if exact {
        score = 1.0;
    }

    ScoredCandidate {
        candidate,
        score,
        exact,
        location_overlap: candidate.shares_location(overlap_tokens),
    }
}

/// Keeps the candidates passing `keep`; an empty result falls back to all of them.
fn narrow<'a, F>(candidates: &[&'a IndexedInstitution], keep: F) -> Vec<&'a IndexedInstitution>
where
    F: Fn(&IndexedInstitution) -> bool,
{
    let kept: Vec<&'a IndexedInstitution> = candidates.iter().copied().filter(|c| keep(c)).collect();
    if kept.is_empty() {
        candidates.to_vec()
    } else {
        kept
    }
}

impl HierarchicalMatcher {
    /// Walks state → stream → location → token candidates → similarity for one
    /// institution mention. `stream` is the course domain of the row, when known.
    pub fn match_institution(
        &self,
        state_text: &str,
        location_text: Option<&str>,
        institution_text: &str,
        stream: Option<CourseDomain>,
    ) -> MatchResult {
        let state = match self.index.resolve_state(state_text) {
            Some(state) => state,
            None => return MatchResult::unmatched(UnmatchedReason::StateUnresolved),
        };
        let unmatched = |reason| MatchResult {
            state_ref: Some(state.id.clone()),
            ..MatchResult::unmatched(reason)
        };

        let normalizer = self.index.normalizer();
        let (name_part, split_location) = split_institution_text(institution_text);
        let location_raw = location_text
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .or(split_location);

        let query_name = normalizer.normalize(&name_part);
        let query_location = location_raw
            .map(|l| normalizer.normalize_location(&l, Some(&state.name)))
            .filter(|l| !l.is_empty());
        let query_full = query_location
            .as_ref()
            .map(|loc| format!("{} {}", query_name, loc));
        let location_tokens = query_location
            .as_deref()
            .map(normalize::tokens)
            .unwrap_or_default();

        // Stream and campus filters must run before the capped token ranking.
        let in_state = self.index.institutions_in_state(&state.id);
        let in_stream = narrow(&in_state, |c| c.offers(stream));
        let local = narrow(&in_stream, |c| c.shares_location(&location_tokens));
        let mut candidates = self
            .index
            .candidates_for_institution_prefix(&local, &query_name);
        if candidates.is_empty() && local.len() < in_state.len() {
            candidates = self
                .index
                .candidates_for_institution_prefix(&in_state, &query_name);
        }
        if candidates.is_empty() {
            return unmatched(UnmatchedReason::NoInstitutionCandidates);
        }

        let overlap_tokens = if location_tokens.is_empty() {
            normalize::tokens(&query_name)
        } else {
            location_tokens
        };
        let scored: Vec<ScoredCandidate> = candidates
            .iter()
            .map(|c| score_candidate(*c, &query_name, query_full.as_deref(), &overlap_tokens))
            .collect();

        let (chosen, ambiguous) = match self.break_ties(&scored) {
            Some(pick) => pick,
            None => return unmatched(UnmatchedReason::NoInstitutionCandidates),
        };
        let confidence = if ambiguous {
            chosen.score * AMBIGUITY_PENALTY
        } else {
            chosen.score
        };

        let stage = if chosen.exact && confidence >= self.config.exact_threshold {
            MatchStage::Exact
        } else if chosen.score >= self.config.accept_threshold {
            MatchStage::HierarchicalFuzzy
        } else {
            debug!(
                "Best candidate for '{}' in {} was {} at {:.3}",
                institution_text,
                state.id,
                chosen.candidate.id(),
                chosen.score
            );
            return unmatched(UnmatchedReason::InstitutionBelowThreshold);
        };

        MatchResult {
            state_ref: Some(state.id.clone()),
            institution_ref: Some(chosen.candidate.id().clone()),
            confidence,
            match_stage: stage,
            unmatched_reason: None,
            ..MatchResult::unmatched(UnmatchedReason::InstitutionBelowThreshold)
        }
    }

    /// Among candidates within `tie_epsilon` of the top score: location overlap first,
    /// then smallest id. The flag is set when only the id separated the contenders.
    fn break_ties<'s, 'a>(
        &self,
        scored: &'s [ScoredCandidate<'a>],
    ) -> Option<(&'s ScoredCandidate<'a>, bool)> {
        let top = scored.iter().map(|s| s.score).fold(f64::NEG_INFINITY, f64::max);
        let contenders: Vec<&ScoredCandidate> = scored
            .iter()
            .filter(|s| top - s.score <= self.config.tie_epsilon)
            .collect();
        if contenders.len() == 1 {
            return Some((contenders[0], false));
        }

        let local: Vec<&ScoredCandidate> = contenders
            .iter()
            .copied()
            .filter(|s| s.location_overlap)
            .collect();
        if local.len() == 1 {
            return Some((local[0], false));
        }
        let pool = if local.is_empty() { contenders } else { local };
        pool.into_iter()
            .min_by(|a, b| a.candidate.id().cmp(b.candidate.id()))
            .map(|pick| (pick, true))
    }
}
