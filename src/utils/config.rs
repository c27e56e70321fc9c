// src/utils/config.rs - Run configuration read from the environment
use anyhow::{bail, Result};
use indicatif::MultiProgress;
use log::info;
use serde::{Deserialize, Serialize};
use std::env;

use crate::matching::MatcherConfig;
use crate::utils::progress_bars::progress_callback::LoggingObserver;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Confidence at or above this is "high".
    pub high: f64,
    /// Confidence at or above this (and below `high`) is "medium".
    pub medium: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            high: 0.9,
            medium: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub workers: usize,
    pub normalization_enabled: bool,
    pub matching_enabled: bool,
    pub matcher: MatcherConfig,
    pub quality: QualityThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            workers: num_cpus::get(),
            normalization_enabled: true,
            matching_enabled: true,
            matcher: MatcherConfig::default(),
            quality: QualityThresholds::default(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    /// Unparseable values fall back to defaults; `validate` catches inconsistent ones.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_or("PIPELINE_BATCH_SIZE", defaults.batch_size),
            workers: env_or("PIPELINE_WORKERS", defaults.workers),
            normalization_enabled: env_or(
                "PIPELINE_NORMALIZATION_ENABLED",
                defaults.normalization_enabled,
            ),
            matching_enabled: env_or("PIPELINE_MATCHING_ENABLED", defaults.matching_enabled),
            matcher: MatcherConfig {
                exact_threshold: env_or("MATCH_EXACT_THRESHOLD", defaults.matcher.exact_threshold),
                accept_threshold: env_or("MATCH_ACCEPT_THRESHOLD", defaults.matcher.accept_threshold),
                tie_epsilon: env_or("MATCH_TIE_EPSILON", defaults.matcher.tie_epsilon),
                cache_capacity: env_or("BATCH_CACHE_CAPACITY", defaults.matcher.cache_capacity),
            },
            quality: QualityThresholds {
                high: env_or("QUALITY_HIGH_THRESHOLD", defaults.quality.high),
                medium: env_or("QUALITY_MEDIUM_THRESHOLD", defaults.quality.medium),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        if self.workers == 0 {
            bail!("worker count must be at least 1");
        }
        let m = &self.matcher;
        for (name, value) in [
            ("exact threshold", m.exact_threshold),
            ("accept threshold", m.accept_threshold),
            ("high quality threshold", self.quality.high),
            ("medium quality threshold", self.quality.medium),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be within [0, 1], got {}", name, value);
            }
        }
        if m.accept_threshold > m.exact_threshold {
            bail!(
                "accept threshold {} exceeds exact threshold {}",
                m.accept_threshold,
                m.exact_threshold
            );
        }
        if !(0.0..0.5).contains(&m.tie_epsilon) {
            bail!("tie epsilon must be within [0, 0.5), got {}", m.tie_epsilon);
        }
        if self.quality.medium > self.quality.high {
            bail!(
                "medium quality threshold {} exceeds high threshold {}",
                self.quality.medium,
                self.quality.high
            );
        }
        Ok(())
    }

    pub fn log_config(&self) {
        info!(
            "Pipeline config: batch_size={}, workers={}, normalization={}, matching={}",
            self.batch_size, self.workers, self.normalization_enabled, self.matching_enabled
        );
        info!(
            "Matcher thresholds: exact>={:.2}, accept>={:.2}, tie epsilon={}, cache={}; quality high>={:.2}, medium>={:.2}",
            self.matcher.exact_threshold,
            self.matcher.accept_threshold,
            self.matcher.tie_epsilon,
            self.matcher.cache_capacity,
            self.quality.high,
            self.quality.medium
        );
    }
}

/// Terminal output of the CLI while a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressOutput {
    /// Show the indicatif bar.
    pub bar: bool,
    /// Log a line per completed matching batch, on top of the stage lines.
    pub batch_lines: bool,
    /// Add memory usage to the bar and the final summary.
    pub memory: bool,
}

impl Default for ProgressOutput {
    fn default() -> Self {
        Self {
            bar: true,
            batch_lines: true,
            memory: true,
        }
    }
}

impl ProgressOutput {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bar: env_or("PIPELINE_PROGRESS_BAR", defaults.bar),
            batch_lines: env_or("PIPELINE_PROGRESS_BATCH_LINES", defaults.batch_lines),
            memory: env_or("PIPELINE_PROGRESS_MEMORY", defaults.memory),
        }
    }

    pub fn multi_progress(&self) -> Option<MultiProgress> {
        self.bar.then(MultiProgress::new)
    }

    pub fn logging_observer(&self) -> LoggingObserver {
        LoggingObserver::new(self.batch_lines)
    }
}
