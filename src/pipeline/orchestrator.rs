// src/pipeline/orchestrator.rs - Stage sequencing for one ingestion run
use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use std::sync::Arc;
use std::time::Instant;

use crate::aggregation::aggregate;
use crate::index::IndexHandle;
use crate::matching::{BatchOutcome, HierarchicalMatcher, MatchedRow};
use crate::models::{
    MatchResult, PipelineResult, PipelineStage, RawAdmissionRow, StageTiming, UnmatchedReason,
};
use crate::normalize::NameNormalizer;
use crate::pipeline::report::{output_digest, quality_metrics, record_matching_stats};
use crate::pipeline::source::PipelineSource;
use crate::utils::cancellation::CancellationToken;
use crate::utils::config::PipelineConfig;
use crate::utils::instantiate_run::{create_initial_pipeline_run, new_run_id};
use crate::utils::progress_bars::logging::StageLogger;
use crate::utils::progress_bars::progress_callback::{ProgressEvent, SharedObserver};

/// Mutable state of a run in progress.
struct RunContext {
    result: PipelineResult,
    stage_started: Instant,
}

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    observer: SharedObserver,
    index: IndexHandle,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig, observer: SharedObserver) -> Self {
        Self {
            config,
            observer,
            index: IndexHandle::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The index built by the most recent run that got past institution import.
    pub fn index_handle(&self) -> &IndexHandle {
        &self.index
    }

    /// Runs every stage in order. Row-level problems end up in `errors`; a failing stage
    /// moves the run to `Failed` and the partial result is still returned.
    pub async fn run(&self, source: &dyn PipelineSource, cancel: &CancellationToken) -> PipelineResult {
        let run_started = Instant::now();
        let run_id = new_run_id();
        let mut ctx = RunContext {
            result: create_initial_pipeline_run(&run_id, Utc::now()),
            stage_started: Instant::now(),
        };
        StageLogger::new(PipelineStage::Idle).log_start(&run_id);
        info!("Reading pipeline input from {}", source.describe());
        self.config.log_config();

        let outcome = match self.config.validate() {
            Ok(()) => self.execute(&mut ctx, source, cancel).await,
            Err(e) => Err(e.context("Invalid pipeline configuration")),
        };
        if let Err(e) = outcome {
            self.fail(&mut ctx, e);
        }

        let mut result = ctx.result;
        result.stats.elapsed_seconds = run_started.elapsed().as_secs_f64();
        result.success = result.final_stage == PipelineStage::Done && !result.cancelled;
        result
    }

    async fn execute(
        &self,
        ctx: &mut RunContext,
        source: &dyn PipelineSource,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // Foundation: states, courses, categories, quotas
        let logger = self.enter(ctx, PipelineStage::LoadingFoundation)?;
        let foundation = source
            .load_foundation()
            .context("Failed to load foundation data")?;
        ctx.result.stats.master_states = foundation.states.len();
        ctx.result.stats.master_courses = foundation.courses.len();
        logger.log_data_loaded(foundation.states.len(), "state");
        logger.log_data_loaded(foundation.courses.len(), "course");
        logger.log_data_loaded(foundation.categories.len() + foundation.quotas.len(), "category/quota");
        self.complete(ctx, PipelineStage::LoadingFoundation);

        let logger = self.enter(ctx, PipelineStage::LoadingLocations)?;
        let locations = source
            .load_locations()
            .context("Failed to load institution locations")?;
        logger.log_data_loaded(locations.len(), "location");
        self.complete(ctx, PipelineStage::LoadingLocations);

        let logger = self.enter(ctx, PipelineStage::ImportingInstitutions)?;
        let mut institutions = source
            .load_institutions()
            .context("Failed to load institutions")?;
        for institution in institutions.iter_mut() {
            institution.attach_locations(&locations);
        }
        let orphaned = locations
            .iter()
            .filter(|loc| !institutions.iter().any(|i| i.id == loc.institution_id))
            .count();
        logger.log_data_quality_issue("locations for unknown institutions", orphaned);
        let normalizer = if self.config.normalization_enabled {
            NameNormalizer::default()
        } else {
            logger.log_warning("Name normalization disabled; comparing case-folded text only");
            NameNormalizer::basic()
        };
        let index = self
            .index
            .load(&foundation, &institutions, normalizer)
            .context("Failed to build master data index")?;
        ctx.result.stats.master_states = index.state_count();
        ctx.result.stats.master_institutions = index.institution_count();
        ctx.result.stats.master_courses = index.course_count();
        logger.log_data_loaded(index.institution_count(), "institution");
        self.complete(ctx, PipelineStage::ImportingInstitutions);

        let logger = self.enter(ctx, PipelineStage::MatchingCounsellingData)?;
        let inputs = source
            .load_counselling_rows()
            .context("Failed to load counselling rows")?;
        ctx.result.stats.total_records = inputs.len();
        logger.log_data_loaded(inputs.len(), "counselling row");

        let mut row_errors: Vec<(usize, String)> = Vec::new();
        let mut rows = Vec::with_capacity(inputs.len());
        for (idx, input) in inputs.iter().enumerate() {
            match RawAdmissionRow::from_input(idx, input) {
                Ok(row) => rows.push(row),
                Err(e) => row_errors.push((idx, format!("row {}: skipped, {}", idx, e))),
            }
        }
        ctx.result.stats.valid_records = rows.len();
        ctx.result.stats.malformed_records = row_errors.len();
        logger.log_data_quality_issue("malformed rows", row_errors.len());

        let normalizer = index.normalizer();
        ctx.result.stats.normalized_records = rows
            .iter()
            .filter(|row| {
                !normalizer.normalize(&row.institution_text).is_empty()
                    && !normalizer.normalize(&row.course_text).is_empty()
            })
            .count();

        let total_valid = rows.len();
        let outcome = if self.config.matching_enabled {
            logger.log_batch_processing_start(total_valid, self.config.batch_size, self.config.workers);
            let matcher = HierarchicalMatcher::new(Arc::clone(&index), self.config.matcher);
            matcher
                .process_batch(
                    rows,
                    self.config.batch_size,
                    self.config.workers,
                    Arc::clone(&self.observer),
                    cancel,
                )
                .await
        } else {
            logger.log_warning("Matching disabled; every valid row is reported unmatched");
            disabled_outcome(rows)
        };
        logger.log_cache_results(outcome.cache_hits, outcome.processed() * 2);

        for matched in &outcome.rows {
            match matched.result.unmatched_reason {
                Some(UnmatchedReason::MatchingDisabled) | None => {}
                Some(reason) => row_errors.push((
                    matched.row.source_index,
                    format!(
                        "row {}: unmatched, {} (state '{}', institution '{}', course '{}')",
                        matched.row.source_index,
                        reason,
                        matched.row.state_text,
                        matched.row.institution_text,
                        matched.row.course_text
                    ),
                )),
            }
        }
        row_errors.sort_by_key(|(idx, _)| *idx);
        ctx.result
            .errors
            .extend(row_errors.into_iter().map(|(_, message)| message));

        ctx.result.cancelled = outcome.cancelled;
        ctx.result.stats.batch_cache_hits = outcome.cache_hits;
        if outcome.failed_batches > 0 {
            ctx.result.errors.push(format!(
                "{} matching batches failed; their rows were not processed",
                outcome.failed_batches
            ));
        }
        if outcome.cancelled {
            ctx.result.errors.push(format!(
                "run cancelled: {} of {} rows were not processed",
                outcome.unprocessed.len(),
                total_valid
            ));
        }

        let aggregation = aggregate(&outcome.rows);
        record_matching_stats(&mut ctx.result.stats, &outcome.rows, &aggregation.records);
        ctx.result.cutoffs = aggregation.records;
        self.complete(ctx, PipelineStage::MatchingCounsellingData);

        let logger = self.enter(ctx, PipelineStage::Reporting)?;
        ctx.result.quality_metrics = quality_metrics(&outcome.rows, &self.config.quality);
        ctx.result.output_digest = output_digest(&ctx.result.cutoffs)?;
        logger.log_data_quality_issue(
            "rows needing manual review",
            ctx.result.quality_metrics.needs_manual_review,
        );
        logger.log_completion(
            ctx.result.stats.matched_records,
            ctx.result.stats.unmatched_records,
            ctx.result.stats.average_confidence,
            ctx.result.stats.cutoff_records,
        );
        self.complete(ctx, PipelineStage::Reporting);

        self.transition(ctx, PipelineStage::Done)?;
        Ok(())
    }

    fn transition(&self, ctx: &mut RunContext, target: PipelineStage) -> Result<()> {
        let current = ctx.result.final_stage;
        if !current.can_transition_to(target) {
            bail!("Invalid stage transition from {} to {}", current, target);
        }
        ctx.result.final_stage = target;
        Ok(())
    }

    fn enter(&self, ctx: &mut RunContext, stage: PipelineStage) -> Result<StageLogger> {
        self.transition(ctx, stage)?;
        ctx.stage_started = Instant::now();
        self.observer.on_event(&ProgressEvent::StageStarted { stage });
        Ok(StageLogger::new(stage))
    }

    fn complete(&self, ctx: &mut RunContext, stage: PipelineStage) {
        let seconds = ctx.stage_started.elapsed().as_secs_f64();
        ctx.result.stage_timings.push(StageTiming { stage, seconds });
        self.observer
            .on_event(&ProgressEvent::StageCompleted { stage, seconds });
    }

    fn fail(&self, ctx: &mut RunContext, error: anyhow::Error) {
        let stage = ctx.result.final_stage;
        let message = format!("{:#}", error);
        if stage != PipelineStage::Idle {
            ctx.result.stage_timings.push(StageTiming {
                stage,
                seconds: ctx.stage_started.elapsed().as_secs_f64(),
            });
        }
        if let Err(e) = self.transition(ctx, PipelineStage::Failed) {
            ctx.result.errors.push(format!("{:#}", e));
        }
        ctx.result.failed_stage = Some(stage);
        ctx.result.errors.push(message.clone());
        self.observer.on_event(&ProgressEvent::Failed {
            stage,
            message,
        });
    }
}

fn disabled_outcome(rows: Vec<RawAdmissionRow>) -> BatchOutcome {
    BatchOutcome {
        rows: rows
            .into_iter()
            .map(|row| MatchedRow {
                row,
                result: MatchResult::unmatched(UnmatchedReason::MatchingDisabled),
            })
            .collect(),
        ..BatchOutcome::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::{sample_foundation, sample_institutions};
    use crate::models::{InstitutionId, InstitutionLocation, RawRowInput};
    use crate::pipeline::source::InMemorySource;
    use crate::utils::progress_bars::progress_callback::{ChannelObserver, NoopObserver};
    use serde_json::json;

    fn input(state: &str, institution: &str, course: &str, rank: serde_json::Value) -> RawRowInput {
        RawRowInput {
            state: Some(state.to_string()),
            institution: Some(institution.to_string()),
            location: None,
            course: Some(course.to_string()),
            category: Some("GEN".to_string()),
            quota: Some("AIQ".to_string()),
            round: Some("Round 1".to_string()),
            year: Some(json!(2024)),
            rank: Some(rank),
        }
    }

    fn source(rows: Vec<RawRowInput>) -> InMemorySource {
        InMemorySource::new(sample_foundation(), sample_institutions(), rows)
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            batch_size: 2,
            workers: 2,
            ..PipelineConfig::default()
        }
    }

    fn orchestrator() -> PipelineOrchestrator {
        PipelineOrchestrator::new(config(), Arc::new(NoopObserver))
    }

    #[tokio::test]
    async fn test_successful_run_walks_every_stage() {
        let (observer, mut rx) = ChannelObserver::new();
        let orchestrator = PipelineOrchestrator::new(config(), Arc::new(observer));
        let rows = vec![
            input("AP", "GOVT. MED. COL., NELLORE", "MBBS", json!(1500)),
            input("AP", "GOVT. MED. COL., NELLORE", "MBBS", json!("1,200")),
        ];
        let result = orchestrator.run(&source(rows), &CancellationToken::new()).await;

        assert!(result.success, "errors: {:?}", result.errors);
        assert_eq!(result.final_stage, PipelineStage::Done);
        assert!(result.failed_stage.is_none());
        assert_eq!(result.cutoffs.len(), 1);
        assert_eq!(result.cutoffs[0].opening_rank, 1200);
        assert_eq!(result.cutoffs[0].closing_rank, 1500);
        assert_eq!(result.stats.total_records, 2);
        assert_eq!(result.stats.matched_records, 2);
        assert_eq!(result.stats.master_institutions, 7);
        assert_eq!(result.stats.compression_ratio, 2.0);
        assert_eq!(result.output_digest.len(), 64);
        assert!(orchestrator.index_handle().snapshot().is_some());

        let timed: Vec<PipelineStage> = result.stage_timings.iter().map(|t| t.stage).collect();
        assert_eq!(
            timed,
            vec![
                PipelineStage::LoadingFoundation,
                PipelineStage::LoadingLocations,
                PipelineStage::ImportingInstitutions,
                PipelineStage::MatchingCounsellingData,
                PipelineStage::Reporting,
            ]
        );

        let mut started = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::StageStarted { stage } = event {
                started.push(stage);
            }
        }
        assert_eq!(started, timed);
    }

    #[tokio::test]
    async fn test_row_errors_are_in_row_order() {
        let mut missing_course = input("AP", "AIIMS", "MBBS", json!(5));
        missing_course.course = None;
        let rows = vec![
            input("ZZ-UNKNOWN", "Some College", "MBBS", json!(10)),
            input("AP", "AIIMS, MANGALAGIRI", "MBBS", json!("abc")),
            missing_course,
            input("AP", "AIIMS, MANGALAGIRI", "MBBS", json!(0)),
            input("KA", "Bangalore Medical College", "MBBS", json!(7)),
        ];
        let result = orchestrator().run(&source(rows), &CancellationToken::new()).await;

        assert!(result.success);
        assert_eq!(result.stats.malformed_records, 3);
        assert_eq!(result.stats.valid_records, 2);
        assert_eq!(result.errors.len(), 5);
        for (i, error) in result.errors.iter().enumerate() {
            assert!(error.starts_with(&format!("row {}:", i)), "{}", error);
        }
        assert!(result.errors[0].contains("unmatched"));
        assert!(result.errors[1].contains("not numeric"));
        assert!(result.errors[2].contains("course"));
        assert!(result.errors[3].contains("positive"));
        assert!(result.cutoffs.is_empty());
        assert_eq!(result.quality_metrics.unmatched, 2);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_loading() {
        let mut bad = config();
        bad.batch_size = 0;
        let orchestrator = PipelineOrchestrator::new(bad, Arc::new(NoopObserver));
        let result = orchestrator.run(&source(Vec::new()), &CancellationToken::new()).await;
        assert!(!result.success);
        assert_eq!(result.final_stage, PipelineStage::Failed);
        assert_eq!(result.failed_stage, Some(PipelineStage::Idle));
        assert!(result.errors[0].contains("Invalid pipeline configuration"));
        assert!(result.stage_timings.is_empty());
    }

    #[tokio::test]
    async fn test_index_build_failure_keeps_partial_stats() {
        let mut institutions = sample_institutions();
        institutions[0].state_id = "ZZ".into();
        let src = InMemorySource::new(sample_foundation(), institutions, Vec::new());
        let result = orchestrator().run(&src, &CancellationToken::new()).await;

        assert!(!result.success);
        assert_eq!(result.final_stage, PipelineStage::Failed);
        assert_eq!(result.failed_stage, Some(PipelineStage::ImportingInstitutions));
        assert_eq!(result.stats.master_states, 3);
        assert_eq!(result.stats.master_courses, 6);
        assert_eq!(result.stats.master_institutions, 0);
        assert!(result.errors.last().unwrap().contains("Failed to build master data index"));
        assert_eq!(result.stage_timings.len(), 3);
    }

    #[tokio::test]
    async fn test_locations_feed_the_index() {
        let mut institutions = sample_institutions();
        for institution in institutions.iter_mut() {
            institution.locations.clear();
        }
        let locations = vec![
            InstitutionLocation {
                institution_id: InstitutionId::from("AP02"),
                location: "Anantapur".to_string(),
            },
            InstitutionLocation {
                institution_id: InstitutionId::from("NOPE"),
                location: "Nowhere".to_string(),
            },
        ];
        let src = InMemorySource::new(sample_foundation(), institutions, Vec::new())
            .with_locations(locations);
        let orchestrator = orchestrator();
        let result = orchestrator.run(&src, &CancellationToken::new()).await;
        assert!(result.success);
        let index = orchestrator.index_handle().snapshot().unwrap();
        let ap02 = index.institution(&InstitutionId::from("AP02")).unwrap();
        assert!(ap02.institution.locations.contains("Anantapur"));
    }

    #[tokio::test]
    async fn test_matching_disabled_reports_everything_unmatched() {
        let mut cfg = config();
        cfg.matching_enabled = false;
        let orchestrator = PipelineOrchestrator::new(cfg, Arc::new(NoopObserver));
        let rows = vec![input("AP", "AIIMS, MANGALAGIRI", "MBBS", json!(1))];
        let result = orchestrator.run(&source(rows), &CancellationToken::new()).await;
        assert!(result.success);
        assert_eq!(result.stats.unmatched_records, 1);
        assert!(result.cutoffs.is_empty());
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_keeps_partial_report() {
        let rows = (0..10)
            .map(|i| input("AP", "AIIMS, MANGALAGIRI", "MBBS", json!(100 + i)))
            .collect();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = orchestrator().run(&source(rows), &cancel).await;
        assert!(result.cancelled);
        assert!(!result.success);
        assert_eq!(result.final_stage, PipelineStage::Done);
        assert_eq!(result.stats.processed_records, 0);
        assert!(result.errors.last().unwrap().contains("10 of 10 rows"));
    }
}
