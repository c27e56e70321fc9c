// src/matching/course.rs
use crate::index::IndexedCourse;
use crate::matching::scoring::similarity;
use crate::matching::{HierarchicalMatcher, AMBIGUITY_PENALTY};
use crate::models::{CourseDomain, CourseLevel, MatchResult, MatchStage, UnmatchedReason};

const AYUSH_DEGREES: [&str; 5] = ["BAMS", "BHMS", "BUMS", "BSMS", "BNYS"];

/// Degree prefix of a normalized course name, mapped to (level, domain).
pub fn detect_course_scope(normalized: &str) -> (Option<CourseLevel>, Option<CourseDomain>) {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let first = match tokens.first() {
        Some(t) => *t,
        None => return (None, None),
    };
    let has_nursing = tokens.contains(&"NURSING");

    // "M.Ch." normalizes to "M CH"
    if first == "M" && tokens.get(1) == Some(&"CH") {
        return (Some(CourseLevel::Postgraduate), Some(CourseDomain::Medical));
    }

    match first {
        "MBBS" => (Some(CourseLevel::Undergraduate), Some(CourseDomain::Medical)),
        "BDS" => (Some(CourseLevel::Undergraduate), Some(CourseDomain::Dental)),
        t if AYUSH_DEGREES.contains(&t) => (Some(CourseLevel::Undergraduate), Some(CourseDomain::Ayush)),
        "BSC" if has_nursing => (Some(CourseLevel::Undergraduate), Some(CourseDomain::Nursing)),
        "MSC" if has_nursing => (Some(CourseLevel::Postgraduate), Some(CourseDomain::Nursing)),
        "MDS" => (Some(CourseLevel::Postgraduate), Some(CourseDomain::Dental)),
        "MD" | "MS" | "DM" | "MCH" => (Some(CourseLevel::Postgraduate), Some(CourseDomain::Medical)),
        "DNB" | "DRNB" => (Some(CourseLevel::Postgraduate), Some(CourseDomain::Dnb)),
        "DIPLOMA" | "DIP" | "PG" => (Some(CourseLevel::Postgraduate), None),
        _ => (None, None),
    }
}

impl HierarchicalMatcher {
    /// Domain implied by the degree prefix of a course mention, if any.
    pub fn course_stream(&self, course_text: &str) -> Option<CourseDomain> {
        detect_course_scope(&self.index.normalizer().normalize(course_text)).1
    }

    /// Resolves a course name against the courses of its detected level and domain.
    pub fn match_course(&self, course_text: &str) -> MatchResult {
        let normalized = self.index.normalizer().normalize(course_text);
        if normalized.is_empty() {
            return MatchResult::unmatched(UnmatchedReason::CourseBelowThreshold);
        }
        let (level, domain) = detect_course_scope(&normalized);
        let scope = self.index.courses_for_scope(level, domain);

        let mut scored: Vec<(f64, bool, &IndexedCourse)> = scope
            .into_iter()
            .map(|course| {
                let exact = normalized == course.normalized_name || normalized == course.normalized_code;
                let score = if exact {
                    1.0
                } else {
                    similarity(&normalized, &course.normalized_name)
                        .max(similarity(&normalized, &course.normalized_code))
                };
                (score, exact, course)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.2.course.id.cmp(&b.2.course.id))
        });

        let (top_score, exact, best) = match scored.first() {
            Some(first) => *first,
            None => return MatchResult::unmatched(UnmatchedReason::CourseBelowThreshold),
        };
        let tied = scored
            .iter()
            .filter(|(score, _, _)| top_score - score <= self.config.tie_epsilon)
            .count();
        let confidence = if tied > 1 { top_score * AMBIGUITY_PENALTY } else { top_score };

        let stage = if exact && confidence >= self.config.exact_threshold {
            MatchStage::Exact
        } else if top_score >= self.config.accept_threshold {
            MatchStage::HierarchicalFuzzy
        } else {
            return MatchResult::unmatched(UnmatchedReason::CourseBelowThreshold);
        };

        MatchResult {
            course_ref: Some(best.course.id.clone()),
            confidence,
            match_stage: stage,
            unmatched_reason: None,
            ..MatchResult::unmatched(UnmatchedReason::CourseBelowThreshold)
        }
    }
}
