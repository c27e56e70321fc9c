// src/utils/progress_bars/logging.rs - Tagged log lines for pipeline stages
use log::{error, info, warn};
use std::time::Instant;

use crate::models::PipelineStage;

#[derive(Debug, Clone)]
pub struct StageLogger {
    tag: &'static str,
    emoji: &'static str,
    start_time: Instant,
}

impl StageLogger {
    pub fn new(stage: PipelineStage) -> Self {
        let (tag, emoji) = match stage {
            PipelineStage::LoadingFoundation => ("FOUNDATION", "🏛️"),
            PipelineStage::LoadingLocations => ("LOCATIONS", "📍"),
            PipelineStage::ImportingInstitutions => ("INSTITUTIONS", "🏥"),
            PipelineStage::MatchingCounsellingData => ("MATCHING", "🎓"),
            PipelineStage::Reporting => ("REPORT", "📊"),
            PipelineStage::Idle | PipelineStage::Done | PipelineStage::Failed => ("PIPELINE", "🚀"),
        };
        Self {
            tag,
            emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, run_id: &str) {
        info!(
            "[{}] {} 🚀 Starting {} (run ID: {})",
            self.tag,
            self.emoji,
            self.tag.to_lowercase(),
            run_id
        );
    }

    pub fn log_phase(&self, phase: &str, details: &str) {
        info!(
            "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
            self.tag,
            self.emoji,
            phase,
            details,
            self.start_time.elapsed().as_secs_f32()
        );
    }

    pub fn log_data_loaded(&self, count: usize, data_type: &str) {
        info!(
            "[{}] {} 📊 Loaded {} {} records",
            self.tag, self.emoji, count, data_type
        );
    }

    pub fn log_batch_processing_start(&self, total_rows: usize, batch_size: usize, workers: usize) {
        let batch_count = (total_rows + batch_size - 1) / batch_size.max(1);
        info!(
            "[{}] {} ⚙️  Processing {} rows in {} batches (batch size: {}, workers: {})",
            self.tag, self.emoji, total_rows, batch_count, batch_size, workers
        );
    }

    pub fn log_progress_update(&self, current: usize, total: usize, additional_info: Option<&str>) {
        // Every 5000 rows, every 10%, and at the end
        let should_log = current % 5000 == 0
            || current == total
            || (total >= 100 && current % (total / 10) == 0);

        if should_log && current > 0 {
            let percent = (current as f64 / total as f64) * 100.0;
            let msg = if let Some(info) = additional_info {
                format!("Progress: {}/{} ({:.1}%) - {}", current, total, percent, info)
            } else {
                format!("Progress: {}/{} ({:.1}%)", current, total, percent)
            };
            info!("[{}] {} 📊 {}", self.tag, self.emoji, msg);
        }
    }

    pub fn log_cache_results(&self, cache_hits: usize, lookups: usize) {
        if lookups > 0 {
            let hit_rate = (cache_hits as f64 / lookups as f64) * 100.0;
            info!(
                "[{}] {} 💾 Batch cache: {} hits over {} lookups ({:.1}% hit rate)",
                self.tag, self.emoji, cache_hits, lookups, hit_rate
            );
        }
    }

    pub fn log_completion(&self, matched: usize, unmatched: usize, avg_confidence: f64, cutoffs: usize) {
        let duration = self.start_time.elapsed();
        info!(
            "[{}] {} 🎉 COMPLETED: {} cutoff records in {:.2?}",
            self.tag, self.emoji, cutoffs, duration
        );
        info!(
            "[{}] {} 📊 Results: {} rows matched, {} unmatched, avg confidence: {:.3}",
            self.tag, self.emoji, matched, unmatched, avg_confidence
        );
    }

    pub fn log_data_quality_issue(&self, issue_type: &str, count: usize) {
        if count > 0 {
            warn!(
                "[{}] {} ⚠️  Data quality: {} instances of {}",
                self.tag, self.emoji, count, issue_type
            );
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.tag, self.emoji, message);
    }

    pub fn log_error(&self, message: &str) {
        error!("[{}] {} ❌ {}", self.tag, self.emoji, message);
    }
}
