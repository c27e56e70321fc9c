// src/main.rs
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use counselling_lib::pipeline::{JsonDirectorySource, PipelineOrchestrator};
use counselling_lib::utils::cancellation::CancellationToken;
use counselling_lib::utils::config::{PipelineConfig, ProgressOutput};
use counselling_lib::utils::env::load_env;
use counselling_lib::utils::get_memory_usage;
use counselling_lib::utils::progress_bars::progress_callback::{
    CompositeObserver, ProgressBarObserver, SharedObserver,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct PipelineArgs {
    /// Directory holding states.json, courses.json, institutions.json, counselling.json, ...
    #[arg(long)]
    data_dir: PathBuf,

    /// Where to write the run report (JSON)
    #[arg(long, default_value = "pipeline_report.json")]
    report: PathBuf,

    /// Override PIPELINE_BATCH_SIZE
    #[arg(long)]
    batch_size: Option<usize>,

    /// Override PIPELINE_WORKERS
    #[arg(long)]
    workers: Option<usize>,

    /// Report every valid row as unmatched without running the matcher
    #[arg(long)]
    skip_matching: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting counselling data ingestion pipeline");
    load_env();
    let args = PipelineArgs::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.skip_matching {
        config.matching_enabled = false;
    }

    let progress = ProgressOutput::from_env();
    info!(
        "Progress output: bar={}, batch lines={}, memory={}",
        progress.bar, progress.batch_lines, progress.memory
    );
    let multi_progress = progress.multi_progress();
    let mut observers: Vec<SharedObserver> = vec![Arc::new(progress.logging_observer())];
    if let Some(bar) = ProgressBarObserver::new(&progress, multi_progress.as_ref()) {
        observers.push(Arc::new(bar));
    }
    let observer: SharedObserver = Arc::new(CompositeObserver::new(observers));

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received; finishing in-flight batches and stopping");
            ctrl_c_token.cancel();
        }
    });

    let source = JsonDirectorySource::new(args.data_dir.clone());
    let orchestrator = PipelineOrchestrator::new(config, observer);
    let result = orchestrator.run(&source, &cancel).await;

    let report = serde_json::to_string_pretty(&result).context("Failed to serialize run report")?;
    fs::write(&args.report, report)
        .with_context(|| format!("Failed to write report to {}", args.report.display()))?;

    info!(
        "Run {} finished at stage '{}' in {:.2}s: {} cutoff records, {} errors (report: {})",
        result.run_id,
        result.final_stage,
        result.stats.elapsed_seconds,
        result.cutoffs.len(),
        result.errors.len(),
        args.report.display()
    );
    if progress.memory {
        info!("Final memory usage: {} MB", get_memory_usage());
    }

    if result.cancelled {
        bail!("Pipeline run {} was cancelled", result.run_id);
    }
    if !result.success {
        bail!(
            "Pipeline run {} failed during {}",
            result.run_id,
            result
                .failed_stage
                .map(|stage| stage.to_string())
                .unwrap_or_else(|| "an unknown stage".to_string())
        );
    }
    Ok(())
}
