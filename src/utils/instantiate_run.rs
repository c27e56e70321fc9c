// src/utils/instantiate_run.rs
use chrono::{DateTime, Utc};
use log::info;
use uuid::Uuid;

use crate::models::{PipelineResult, PipelineStage, PipelineStats, QualityMetrics};

pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// An empty result in `Idle`; the orchestrator fills it in as stages complete.
pub fn create_initial_pipeline_run(run_id: &str, started_at: DateTime<Utc>) -> PipelineResult {
    info!("Created pipeline run record with ID: {}", run_id);

    PipelineResult {
        run_id: run_id.to_string(),
        started_at,
        success: false,
        cancelled: false,
        final_stage: PipelineStage::Idle,
        failed_stage: None,
        stage_timings: Vec::new(),
        stats: PipelineStats::default(),
        quality_metrics: QualityMetrics::default(),
        errors: Vec::new(),
        cutoffs: Vec::new(),
        output_digest: String::new(),
    }
}
