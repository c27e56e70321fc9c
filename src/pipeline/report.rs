// src/pipeline/report.rs - Run statistics, quality buckets and the output digest
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::matching::MatchedRow;
use crate::models::{CutoffRecord, MatchStage, PipelineStats, QualityMetrics};
use crate::utils::config::QualityThresholds;

/// Buckets every processed row by confidence. Unmatched rows count only as unmatched;
/// manual review covers low confidence plus unmatched.
pub fn quality_metrics<'a, I>(rows: I, thresholds: &QualityThresholds) -> QualityMetrics
where
    I: IntoIterator<Item = &'a MatchedRow>,
{
    let mut metrics = QualityMetrics::default();
    for matched in rows {
        let result = &matched.result;
        if !result.is_matched() {
            metrics.unmatched += 1;
        } else if result.confidence >= thresholds.high {
            metrics.high_confidence += 1;
        } else if result.confidence >= thresholds.medium {
            metrics.medium_confidence += 1;
        } else {
            metrics.low_confidence += 1;
        }
    }
    metrics.needs_manual_review = metrics.low_confidence + metrics.unmatched;
    metrics
}

/// Fills the matching counters of `stats` from the processed rows and the emitted cutoffs.
pub fn record_matching_stats(stats: &mut PipelineStats, rows: &[MatchedRow], cutoffs: &[CutoffRecord]) {
    stats.processed_records = rows.len();
    stats.matched_records = 0;
    stats.exact_matches = 0;
    stats.fuzzy_matches = 0;
    let mut confidence_sum = 0.0;
    for matched in rows {
        match matched.result.match_stage {
            MatchStage::Exact => stats.exact_matches += 1,
            MatchStage::HierarchicalFuzzy => stats.fuzzy_matches += 1,
            MatchStage::Unmatched => continue,
        }
        stats.matched_records += 1;
        confidence_sum += matched.result.confidence;
    }
    stats.unmatched_records = stats.processed_records - stats.matched_records;
    stats.average_confidence = ratio_f64(confidence_sum, stats.matched_records);
    stats.matching_accuracy = ratio(stats.matched_records, stats.processed_records);
    stats.normalization_accuracy = ratio(stats.normalized_records, stats.valid_records);
    stats.cutoff_records = cutoffs.len();
    stats.compression_ratio = ratio(stats.matched_records, cutoffs.len());
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    ratio_f64(numerator as f64, denominator)
}

fn ratio_f64(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

/// Hex SHA-256 over the JSON form of the cutoff set. Cutoffs are key-sorted, so equal
/// inputs give equal digests.
pub fn output_digest(cutoffs: &[CutoffRecord]) -> Result<String> {
    let serialized = serde_json::to_vec(cutoffs).context("Failed to serialize cutoff records")?;
    let mut hasher = Sha256::new();
    hasher.update(&serialized);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AggregationKey, CourseId, InstitutionId, MatchResult, RawAdmissionRow, StateId,
        UnmatchedReason,
    };

    fn row(confidence: f64, stage: MatchStage) -> MatchedRow {
        let mut result = MatchResult::unmatched(UnmatchedReason::StateUnresolved);
        if stage != MatchStage::Unmatched {
            result.unmatched_reason = None;
            result.confidence = confidence;
        }
        result.match_stage = stage;
        MatchedRow {
            row: RawAdmissionRow {
                source_index: 0,
                state_text: "AP".to_string(),
                institution_text: "GMC".to_string(),
                location_text: None,
                course_text: "MBBS".to_string(),
                category_text: "GEN".to_string(),
                quota_text: "AIQ".to_string(),
                round_text: "1".to_string(),
                year: 2024,
                rank: 1,
            },
            result,
        }
    }

    fn cutoff(institution: &str, opening: u32, closing: u32) -> CutoffRecord {
        CutoffRecord {
            key: AggregationKey {
                state: StateId::from("AP"),
                institution_ref: InstitutionId::from(institution),
                year: 2024,
                round: "1".to_string(),
                course_ref: CourseId::from("MBBS"),
                quota: "ALL INDIA".to_string(),
                category: "GENERAL".to_string(),
            },
            opening_rank: opening,
            closing_rank: closing,
            sample_count: 2,
            confidence: 1.0,
            ranks: vec![opening, closing],
            weakest_stage: MatchStage::Exact,
        }
    }

    #[test]
    fn test_quality_buckets_use_thresholds() {
        let rows = vec![
            row(1.0, MatchStage::Exact),
            row(0.9, MatchStage::HierarchicalFuzzy),
            row(0.89, MatchStage::HierarchicalFuzzy),
            row(0.7, MatchStage::HierarchicalFuzzy),
            row(0.69, MatchStage::HierarchicalFuzzy),
            row(0.0, MatchStage::Unmatched),
        ];
        let metrics = quality_metrics(&rows, &QualityThresholds::default());
        assert_eq!(metrics.high_confidence, 2);
        assert_eq!(metrics.medium_confidence, 2);
        assert_eq!(metrics.low_confidence, 1);
        assert_eq!(metrics.unmatched, 1);
        assert_eq!(metrics.needs_manual_review, 2);

        let strict = QualityThresholds { high: 0.95, medium: 0.8 };
        let metrics = quality_metrics(&rows, &strict);
        assert_eq!(metrics.high_confidence, 1);
        assert_eq!(metrics.medium_confidence, 2);
        assert_eq!(metrics.low_confidence, 2);
    }

    #[test]
    fn test_matching_stats() {
        let rows = vec![
            row(1.0, MatchStage::Exact),
            row(0.8, MatchStage::HierarchicalFuzzy),
            row(0.0, MatchStage::Unmatched),
            row(0.0, MatchStage::Unmatched),
        ];
        let mut stats = PipelineStats {
            valid_records: 4,
            normalized_records: 4,
            ..PipelineStats::default()
        };
        record_matching_stats(&mut stats, &rows, &[cutoff("AP01", 1, 2)]);
        assert_eq!(stats.processed_records, 4);
        assert_eq!(stats.matched_records, 2);
        assert_eq!(stats.unmatched_records, 2);
        assert_eq!(stats.exact_matches, 1);
        assert_eq!(stats.fuzzy_matches, 1);
        assert!((stats.average_confidence - 0.9).abs() < 1e-9);
        assert_eq!(stats.matching_accuracy, 0.5);
        assert_eq!(stats.normalization_accuracy, 1.0);
        assert_eq!(stats.compression_ratio, 2.0);
    }

    #[test]
    fn test_empty_run_has_zero_ratios() {
        let mut stats = PipelineStats::default();
        record_matching_stats(&mut stats, &[], &[]);
        assert_eq!(stats.average_confidence, 0.0);
        assert_eq!(stats.matching_accuracy, 0.0);
        assert_eq!(stats.compression_ratio, 0.0);
    }

    #[test]
    fn test_digest_is_stable_and_content_sensitive() {
        let a = vec![cutoff("AP01", 1200, 1500), cutoff("AP02", 10, 20)];
        let digest = output_digest(&a).unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, output_digest(&a.clone()).unwrap());

        let mut b = a.clone();
        b[0].closing_rank = 1501;
        assert_ne!(digest, output_digest(&b).unwrap());
        assert_ne!(digest, output_digest(&[]).unwrap());
    }
}
