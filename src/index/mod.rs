// src/index/mod.rs - Immutable lookup structures over the master data
//!
//! The index is built once per load and never mutated afterwards. Every narrowing
//! operation returns a subset of its input, so the matcher can only shrink the
//! candidate set as it walks state → institution → course.

pub mod state_codes;
#[cfg(test)]
pub(crate) mod test_support;

use log::{debug, info};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use strsim::jaro_winkler;
use thiserror::Error;

use crate::models::{
    CourseDomain, CourseLevel, FoundationData, InstitutionId, MasterCategory, MasterCourse,
    MasterInstitution, MasterQuota, MasterState, StateId,
};
use crate::normalize::{self, NameNormalizer};

pub const STATE_FUZZY_THRESHOLD: f64 = 0.90;
pub const MAX_FUZZY_CANDIDATES: usize = 25;
/// Tokens of at least this many characters also match on a shared prefix of this length.
pub const PREFIX_LENGTH: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexBuildError {
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },
    #[error("institution '{institution}' references unknown state '{state}'")]
    UnknownState { institution: String, state: String },
    #[error("{kind} '{id}' has an empty name")]
    EmptyName { kind: &'static str, id: String },
}

#[derive(Debug, Clone)]
pub struct IndexedInstitution {
    pub institution: MasterInstitution,
    pub normalized_name: String,
    pub name_tokens: BTreeSet<String>,
    pub normalized_locations: Vec<String>,
    pub location_tokens: BTreeSet<String>,
}

impl IndexedInstitution {
    pub fn id(&self) -> &InstitutionId {
        &self.institution.id
    }

    pub fn shares_location(&self, query_tokens: &BTreeSet<String>) -> bool {
        !query_tokens.is_disjoint(&self.location_tokens)
    }

    pub fn offers(&self, stream: Option<CourseDomain>) -> bool {
        self.institution.offers(stream)
    }
}

#[derive(Debug, Clone)]
pub struct IndexedCourse {
    pub course: MasterCourse,
    pub normalized_name: String,
    pub normalized_code: String,
}

#[derive(Debug, Clone)]
struct CanonicalLabel {
    name: String,
    forms: HashSet<String>,
}

#[derive(Debug)]
pub struct MasterDataIndex {
    normalizer: NameNormalizer,
    states: Vec<MasterState>,
    state_names: Vec<String>,
    state_lookup: HashMap<String, usize>,
    institutions: Vec<IndexedInstitution>,
    institutions_by_state: HashMap<StateId, Vec<usize>>,
    institution_positions: HashMap<InstitutionId, usize>,
    token_idf: HashMap<String, f64>,
    unseen_token_idf: f64,
    courses: Vec<IndexedCourse>,
    categories: Vec<CanonicalLabel>,
    quotas: Vec<CanonicalLabel>,
}

impl MasterDataIndex {
    pub fn build(
        foundation: &FoundationData,
        institutions: &[MasterInstitution],
        normalizer: NameNormalizer,
    ) -> Result<Self, IndexBuildError> {
        let mut state_lookup = HashMap::new();
        let mut state_names = Vec::with_capacity(foundation.states.len());
        let mut state_positions: HashMap<StateId, usize> = HashMap::new();
        for (pos, state) in foundation.states.iter().enumerate() {
            if state_positions.insert(state.id.clone(), pos).is_some() {
                return Err(IndexBuildError::DuplicateId {
                    kind: "state",
                    id: state.id.to_string(),
                });
            }
            let name = normalizer.normalize(&state.name);
            if name.is_empty() {
                return Err(IndexBuildError::EmptyName {
                    kind: "state",
                    id: state.id.to_string(),
                });
            }
            state_lookup.entry(name.clone()).or_insert(pos);
            let code = normalizer.normalize(&state.code);
            if !code.is_empty() {
                state_lookup.entry(code).or_insert(pos);
            }
            state_names.push(name);
        }

        let mut indexed = Vec::with_capacity(institutions.len());
        let mut institution_positions = HashMap::new();
        let mut token_frequency: HashMap<String, usize> = HashMap::new();
        for inst in institutions {
            let state_pos = match state_positions.get(&inst.state_id) {
                Some(pos) => *pos,
                None => {
                    return Err(IndexBuildError::UnknownState {
                        institution: inst.id.to_string(),
                        state: inst.state_id.to_string(),
                    })
                }
            };
            if institution_positions.insert(inst.id.clone(), indexed.len()).is_some() {
                return Err(IndexBuildError::DuplicateId {
                    kind: "institution",
                    id: inst.id.to_string(),
                });
            }
            let normalized_name = normalizer.normalize(&inst.name);
            if normalized_name.is_empty() {
                return Err(IndexBuildError::EmptyName {
                    kind: "institution",
                    id: inst.id.to_string(),
                });
            }
            let name_tokens = normalize::tokens(&normalized_name);
            for token in &name_tokens {
                *token_frequency.entry(token.clone()).or_insert(0) += 1;
            }

            let state_name = &foundation.states[state_pos].name;
            let normalized_locations: Vec<String> = inst
                .locations
                .iter()
                .map(|loc| normalizer.normalize_location(loc, Some(state_name)))
                .filter(|loc| !loc.is_empty())
                .collect();
            let location_tokens = normalized_locations
                .iter()
                .flat_map(|loc| normalize::tokens(loc))
                .collect();

            indexed.push(IndexedInstitution {
                institution: inst.clone(),
                normalized_name,
                name_tokens,
                normalized_locations,
                location_tokens,
            });
        }

        let total_docs = indexed.len().max(1) as f64;
        let token_idf = token_frequency
            .into_iter()
            .map(|(token, freq)| (token, (total_docs / (freq as f64 + 1.0)).ln_1p()))
            .collect();

        let mut institutions_by_state: HashMap<StateId, Vec<usize>> = HashMap::new();
        for (pos, inst) in indexed.iter().enumerate() {
            institutions_by_state
                .entry(inst.institution.state_id.clone())
                .or_default()
                .push(pos);
        }
        for positions in institutions_by_state.values_mut() {
            positions.sort_by(|a, b| indexed[*a].id().cmp(indexed[*b].id()));
        }

        let mut course_ids = HashSet::new();
        let mut courses = Vec::with_capacity(foundation.courses.len());
        for course in &foundation.courses {
            if !course_ids.insert(course.id.clone()) {
                return Err(IndexBuildError::DuplicateId {
                    kind: "course",
                    id: course.id.to_string(),
                });
            }
            let normalized_name = normalizer.normalize(&course.name);
            if normalized_name.is_empty() {
                return Err(IndexBuildError::EmptyName {
                    kind: "course",
                    id: course.id.to_string(),
                });
            }
            courses.push(IndexedCourse {
                course: course.clone(),
                normalized_name,
                normalized_code: normalizer.normalize(&course.code),
            });
        }

        let categories = build_labels(
            "category",
            foundation
                .categories
                .iter()
                .map(|c: &MasterCategory| (c.id.as_str(), c.name.as_str(), c.aliases.as_slice())),
            &normalizer,
        )?;
        let quotas = build_labels(
            "quota",
            foundation
                .quotas
                .iter()
                .map(|q: &MasterQuota| (q.id.as_str(), q.name.as_str(), q.aliases.as_slice())),
            &normalizer,
        )?;

        info!(
            "Built master data index: {} states, {} institutions, {} courses, {} categories, {} quotas",
            foundation.states.len(),
            indexed.len(),
            courses.len(),
            categories.len(),
            quotas.len()
        );

        Ok(Self {
            normalizer,
            states: foundation.states.clone(),
            state_names,
            state_lookup,
            institutions: indexed,
            institutions_by_state,
            institution_positions,
            token_idf,
            unseen_token_idf: total_docs.ln_1p(),
            courses,
            categories,
            quotas,
        })
    }

    /// The normalizer used for master names. Queries must go through the same one.
    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn institution_count(&self) -> usize {
        self.institutions.len()
    }

    pub fn course_count(&self) -> usize {
        self.courses.len()
    }

    pub fn institution(&self, id: &InstitutionId) -> Option<&IndexedInstitution> {
        self.institution_positions
            .get(id)
            .map(|pos| &self.institutions[*pos])
    }

    /// Name or code, then known variants, then address text containing a state name,
    /// then a Jaro-Winkler fallback.
    pub fn resolve_state(&self, text: &str) -> Option<&MasterState> {
        let normalized = self.normalizer.normalize(text);
        if normalized.is_empty() {
            return None;
        }
        if let Some(pos) = self.lookup_state(&normalized) {
            return Some(&self.states[pos]);
        }

        let stripped: Vec<&str> = normalized
            .split_whitespace()
            .filter(|t| !(t.len() == 6 && t.chars().all(|c| c.is_ascii_digit())))
            .collect();
        let stripped_text = stripped.join(" ");
        if stripped_text != normalized {
            if let Some(pos) = self.lookup_state(&stripped_text) {
                return Some(&self.states[pos]);
            }
        }

        let mut contained: Option<(usize, usize)> = None;
        for (pos, name) in self.state_names.iter().enumerate() {
            let name_tokens: Vec<&str> = name.split_whitespace().collect();
            let longer = contained.map_or(true, |(len, _)| name_tokens.len() > len);
            if longer && contains_sequence(&stripped, &name_tokens) {
                contained = Some((name_tokens.len(), pos));
            }
        }
        if let Some((_, pos)) = contained {
            debug!("State '{}' resolved by contained name '{}'", text, self.state_names[pos]);
            return Some(&self.states[pos]);
        }

        if stripped_text.chars().count() < PREFIX_LENGTH {
            return None;
        }
        let mut best: Option<(f64, usize)> = None;
        for (pos, name) in self.state_names.iter().enumerate() {
            let score = jaro_winkler(&stripped_text, name);
            if score < STATE_FUZZY_THRESHOLD {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_score, best_pos)) => {
                    score > best_score
                        || (score == best_score && self.states[pos].id < self.states[best_pos].id)
                }
            };
            if better {
                best = Some((score, pos));
            }
        }
        best.map(|(score, pos)| {
            debug!("State '{}' fuzzy-resolved to '{}' ({:.3})", text, self.state_names[pos], score);
            &self.states[pos]
        })
    }

    fn lookup_state(&self, normalized: &str) -> Option<usize> {
        if let Some(pos) = self.state_lookup.get(normalized) {
            return Some(*pos);
        }
        state_codes::canonical_state_name(normalized)
            .and_then(|canonical| self.state_lookup.get(&self.normalizer.normalize(canonical)))
            .copied()
    }

    /// Institutions of the resolved state, ordered by id. Empty when the state does not resolve.
    pub fn candidates_for_state(&self, state_text: &str) -> Vec<&IndexedInstitution> {
        match self.resolve_state(state_text) {
            Some(state) => self.institutions_in_state(&state.id),
            None => Vec::new(),
        }
    }

    pub fn institutions_in_state(&self, state_id: &StateId) -> Vec<&IndexedInstitution> {
        self.institutions_by_state
            .get(state_id)
            .map(|positions| positions.iter().map(|pos| &self.institutions[*pos]).collect())
            .unwrap_or_default()
    }

    /// Keeps candidates that share a significant token with the (normalized) query,
    /// ranked by IDF-weighted overlap and capped at `MAX_FUZZY_CANDIDATES`.
    pub fn candidates_for_institution_prefix<'a>(
        &self,
        candidates: &[&'a IndexedInstitution],
        normalized_query: &str,
    ) -> Vec<&'a IndexedInstitution> {
        let query_tokens = normalize::tokens(normalized_query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &'a IndexedInstitution)> = candidates
            .iter()
            .filter_map(|candidate| {
                let weight: f64 = query_tokens
                    .iter()
                    .map(|q| {
                        candidate
                            .name_tokens
                            .iter()
                            .chain(candidate.location_tokens.iter())
                            .filter(|t| tokens_related(q, t))
                            .map(|t| self.idf(t))
                            .fold(0.0, f64::max)
                    })
                    .sum();
                if weight > 0.0 {
                    Some((weight, *candidate))
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id().cmp(b.1.id()))
        });
        scored.truncate(MAX_FUZZY_CANDIDATES);
        scored.into_iter().map(|(_, c)| c).collect()
    }

    fn idf(&self, token: &str) -> f64 {
        self.token_idf
            .get(token)
            .copied()
            .unwrap_or(self.unseen_token_idf)
    }

    /// Courses matching level and domain, falling back to level only, then to all courses.
    pub fn courses_for_scope(
        &self,
        level: Option<CourseLevel>,
        domain: Option<CourseDomain>,
    ) -> Vec<&IndexedCourse> {
        let by_both: Vec<&IndexedCourse> = self
            .courses
            .iter()
            .filter(|c| {
                level.map_or(true, |l| c.course.level == l)
                    && domain.map_or(true, |d| c.course.domain == d)
            })
            .collect();
        if !by_both.is_empty() {
            return by_both;
        }
        let by_level: Vec<&IndexedCourse> = self
            .courses
            .iter()
            .filter(|c| level.map_or(true, |l| c.course.level == l))
            .collect();
        if !by_level.is_empty() {
            return by_level;
        }
        self.courses.iter().collect()
    }

    pub fn resolve_category(&self, text: &str) -> String {
        self.resolve_label(&self.categories, text)
    }

    pub fn resolve_quota(&self, text: &str) -> String {
        self.resolve_label(&self.quotas, text)
    }

    fn resolve_label(&self, labels: &[CanonicalLabel], text: &str) -> String {
        let normalized = self.normalizer.normalize(text);
        labels
            .iter()
            .find(|label| label.forms.contains(&normalized))
            .map(|label| label.name.clone())
            .unwrap_or(normalized)
    }
}

fn build_labels<'a, I>(
    kind: &'static str,
    entries: I,
    normalizer: &NameNormalizer,
) -> Result<Vec<CanonicalLabel>, IndexBuildError>
where
    I: Iterator<Item = (&'a str, &'a str, &'a [String])>,
{
    let mut ids = HashSet::new();
    let mut labels = Vec::new();
    for (id, name, aliases) in entries {
        if !ids.insert(id) {
            return Err(IndexBuildError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
        let canonical = name.trim();
        if canonical.is_empty() {
            return Err(IndexBuildError::EmptyName {
                kind,
                id: id.to_string(),
            });
        }
        let forms = std::iter::once(canonical)
            .chain(aliases.iter().map(String::as_str))
            .map(|form| normalizer.normalize(form))
            .filter(|form| !form.is_empty())
            .collect();
        labels.push(CanonicalLabel {
            name: canonical.to_string(),
            forms,
        });
    }
    Ok(labels)
}

fn tokens_related(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    a.chars().count() >= PREFIX_LENGTH
        && b.chars().count() >= PREFIX_LENGTH
        && a.chars().take(PREFIX_LENGTH).eq(b.chars().take(PREFIX_LENGTH))
}

fn contains_sequence(haystack: &[&str], needle: &[&str]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}

/// Shared, swappable reference to the current index. Readers take a snapshot and keep
/// using it even if a reload happens meanwhile.
#[derive(Debug, Clone, Default)]
pub struct IndexHandle {
    current: Arc<RwLock<Option<Arc<MasterDataIndex>>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a fresh index and swaps it in. On error the previous index stays current.
    pub fn load(
        &self,
        foundation: &FoundationData,
        institutions: &[MasterInstitution],
        normalizer: NameNormalizer,
    ) -> Result<Arc<MasterDataIndex>, IndexBuildError> {
        let index = Arc::new(MasterDataIndex::build(foundation, institutions, normalizer)?);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::clone(&index));
        Ok(index)
    }

    pub fn snapshot(&self) -> Option<Arc<MasterDataIndex>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::collections::HashSet;

    fn ids(list: &[&IndexedInstitution]) -> Vec<String> {
        list.iter().map(|i| i.id().to_string()).collect()
    }

    #[test]
    fn test_build_rejects_duplicate_ids() {
        let mut institutions = sample_institutions();
        institutions.push(institution("AP01", "Another College", "AP", &[]));
        let err = MasterDataIndex::build(&sample_foundation(), &institutions, NameNormalizer::default())
            .unwrap_err();
        assert_eq!(
            err,
            IndexBuildError::DuplicateId {
                kind: "institution",
                id: "AP01".to_string()
            }
        );
    }

    #[test]
    fn test_build_rejects_unknown_state() {
        let institutions = vec![institution("X1", "Some College", "ZZ", &[])];
        let err = MasterDataIndex::build(&sample_foundation(), &institutions, NameNormalizer::default())
            .unwrap_err();
        assert!(matches!(err, IndexBuildError::UnknownState { .. }));
    }

    #[test]
    fn test_resolve_state_variants() {
        let index = sample_index();
        let resolve = |text: &str| index.resolve_state(text).map(|s| s.id.to_string());
        assert_eq!(resolve("AP"), Some("AP".to_string()));
        assert_eq!(resolve("andhra   pradesh"), Some("AP".to_string()));
        assert_eq!(resolve("Andhra"), Some("AP".to_string()));
        assert_eq!(resolve("TG"), Some("TS".to_string()));
        assert_eq!(resolve("ANDHRA PRADESH - 522503"), Some("AP".to_string()));
        assert_eq!(resolve("NELLORE, ANDHRA PRADESH"), Some("AP".to_string()));
        assert_eq!(resolve("Andra Pradesh"), Some("AP".to_string()));
        assert_eq!(resolve("ZZ-UNKNOWN"), None);
        assert_eq!(resolve(""), None);
        // Known variant whose canonical state is not loaded.
        assert_eq!(resolve("ORISSA"), None);
    }

    #[test]
    fn test_candidates_for_unresolved_state_are_empty() {
        let index = sample_index();
        assert!(index.candidates_for_state("ZZ-UNKNOWN").is_empty());
        assert_eq!(
            ids(&index.candidates_for_state("AP")),
            vec!["AP01", "AP02", "AP03", "AP04", "AP05"]
        );
    }

    #[test]
    fn test_narrowing_is_monotonic() {
        let index = sample_index();
        let state = index.candidates_for_state("ANDHRA PRADESH");
        let state_ids: HashSet<String> = ids(&state).into_iter().collect();
        for query in [
            "GOVERNMENT MEDICAL COLLEGE",
            "GOVERMENT MEDICL COLLEGE",
            "ALL INDIA INSTITUTE OF MEDICAL SCIENCES",
            "NELLORE",
            "UNRELATED WORDS HERE",
        ] {
            let narrowed = index.candidates_for_institution_prefix(&state, query);
            assert!(narrowed.len() <= state.len());
            assert!(ids(&narrowed).iter().all(|id| state_ids.contains(id)), "query {}", query);
            assert!(narrowed.len() <= MAX_FUZZY_CANDIDATES);
        }

        let all_courses = index.courses_for_scope(None, None).len();
        for level in [None, Some(CourseLevel::Undergraduate), Some(CourseLevel::Postgraduate)] {
            for domain in [None, Some(CourseDomain::Dental), Some(CourseDomain::Ayush)] {
                assert!(index.courses_for_scope(level, domain).len() <= all_courses);
            }
        }
    }

    #[test]
    fn test_prefix_candidates_tolerate_typos_and_rank_rare_tokens() {
        let index = sample_index();
        let state = index.candidates_for_state("AP");
        let narrowed = index.candidates_for_institution_prefix(&state, "GOVERMENT DENTAL COLLEGE");
        assert_eq!(narrowed[0].id().as_str(), "AP04");
        let none = index.candidates_for_institution_prefix(&state, "ZEBRA QUARTZ");
        assert!(none.is_empty());
    }

    #[test]
    fn test_courses_for_scope_fallback() {
        let index = sample_index();
        let pg_dental = index.courses_for_scope(Some(CourseLevel::Postgraduate), Some(CourseDomain::Dental));
        assert_eq!(pg_dental.len(), 1);
        assert_eq!(pg_dental[0].course.id.as_str(), "MDS-ORTHO");

        let pg_ayush = index.courses_for_scope(Some(CourseLevel::Postgraduate), Some(CourseDomain::Ayush));
        assert!(pg_ayush.iter().all(|c| c.course.level == CourseLevel::Postgraduate));
        assert_eq!(pg_ayush.len(), 4);
    }

    #[test]
    fn test_resolve_category_and_quota() {
        let index = sample_index();
        assert_eq!(index.resolve_category("Gen"), "GENERAL");
        assert_eq!(index.resolve_category("UR"), "GENERAL");
        assert_eq!(index.resolve_category("obc"), "OBC");
        assert_eq!(index.resolve_category("Sports Quota"), "SPORTS QUOTA");
        assert_eq!(index.resolve_quota("AIQ"), "ALL INDIA");
        assert_eq!(index.resolve_quota("State Quota"), "STATE");
    }

    #[test]
    fn test_handle_swaps_atomically() {
        let handle = IndexHandle::new();
        assert!(handle.snapshot().is_none());

        let first = handle
            .load(&sample_foundation(), &sample_institutions(), NameNormalizer::default())
            .unwrap();
        let held = handle.snapshot().unwrap();
        assert_eq!(held.institution_count(), first.institution_count());

        let fewer: Vec<_> = sample_institutions().into_iter().take(2).collect();
        handle
            .load(&sample_foundation(), &fewer, NameNormalizer::default())
            .unwrap();
        assert_eq!(handle.snapshot().unwrap().institution_count(), 2);
        assert_eq!(held.institution_count(), sample_institutions().len());

        let bad = vec![institution("X1", "College", "ZZ", &[])];
        assert!(handle.load(&sample_foundation(), &bad, NameNormalizer::default()).is_err());
        assert_eq!(handle.snapshot().unwrap().institution_count(), 2);
    }
}
