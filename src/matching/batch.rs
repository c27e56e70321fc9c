// src/matching/batch.rs - Batch-parallel row matching
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::matching::HierarchicalMatcher;
use crate::models::{CourseDomain, MatchResult, RawAdmissionRow};
use crate::utils::cancellation::CancellationToken;
use crate::utils::progress_bars::progress_callback::{ProgressEvent, SharedObserver};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRow {
    pub row: RawAdmissionRow,
    pub result: MatchResult,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Rows of every completed batch, in input order.
    pub rows: Vec<MatchedRow>,
    /// Source indices of rows that were never matched (cancelled or failed batches).
    pub unprocessed: Vec<usize>,
    pub cancelled: bool,
    pub failed_batches: usize,
    pub cache_hits: usize,
}

impl BatchOutcome {
    pub fn processed(&self) -> usize {
        self.rows.len()
    }
}

struct BatchResult {
    rows: Vec<MatchedRow>,
    cache_hits: usize,
}

enum BatchRun {
    Done(BatchResult),
    /// Not dispatched because the run was cancelled first.
    Skipped(Vec<usize>),
    Failed(Vec<usize>, tokio::task::JoinError),
}

/// Counts completed rows and notifies under one lock so observers see `done` grow monotonically.
struct ProgressTracker {
    done: Mutex<(usize, usize)>,
    total: usize,
    observer: SharedObserver,
}

impl ProgressTracker {
    fn record(&self, rows: &[MatchedRow]) {
        let matched = rows.iter().filter(|r| r.result.is_matched()).count();
        let mut guard = self.done.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.0 += rows.len();
        guard.1 += matched;
        self.observer.on_event(&ProgressEvent::BatchCompleted {
            done: guard.0,
            total: self.total,
            matched: guard.1,
        });
    }
}

type InstitutionKey = (String, Option<String>, String, Option<CourseDomain>);

impl HierarchicalMatcher {
    /// Matches rows sequentially with caches that live only for this batch.
    fn match_rows(&self, rows: Vec<RawAdmissionRow>) -> BatchResult {
        let capacity = NonZeroUsize::new(self.config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let mut institutions: LruCache<InstitutionKey, MatchResult> = LruCache::new(capacity);
        let mut courses: LruCache<String, MatchResult> = LruCache::new(capacity);
        let mut cache_hits = 0;

        let mut matched = Vec::with_capacity(rows.len());
        for row in rows {
            let stream = self.course_stream(&row.course_text);
            let key = (
                row.state_text.clone(),
                row.location_text.clone(),
                row.institution_text.clone(),
                stream,
            );
            let institution = match institutions.get(&key) {
                Some(hit) => {
                    cache_hits += 1;
                    hit.clone()
                }
                None => {
                    let fresh = self.match_institution(
                        &row.state_text,
                        row.location_text.as_deref(),
                        &row.institution_text,
                        stream,
                    );
                    institutions.put(key, fresh.clone());
                    fresh
                }
            };
            let course = match courses.get(&row.course_text) {
                Some(hit) => {
                    cache_hits += 1;
                    hit.clone()
                }
                None => {
                    let fresh = self.match_course(&row.course_text);
                    courses.put(row.course_text.clone(), fresh.clone());
                    fresh
                }
            };
            let result = self.combine(&row, institution, course);
            matched.push(MatchedRow { row, result });
        }
        BatchResult {
            rows: matched,
            cache_hits,
        }
    }

    /// Splits rows into `batch_size` batches and keeps up to `workers` of them running on
    /// blocking threads. Cancellation is checked as each batch is dispatched; batches already
    /// running finish. Completed rows come back in input order.
    pub async fn process_batch(
        &self,
        rows: Vec<RawAdmissionRow>,
        batch_size: usize,
        workers: usize,
        observer: SharedObserver,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let batch_size = batch_size.max(1);
        let workers = workers.max(1);
        let total = rows.len();

        let mut batches: Vec<Vec<RawAdmissionRow>> = Vec::with_capacity(total / batch_size + 1);
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            batches.push(rows.by_ref().take(batch_size).collect());
        }
        debug!(
            "Dispatching {} rows in {} batches of up to {} ({} workers)",
            total,
            batches.len(),
            batch_size,
            workers
        );

        let tracker = Arc::new(ProgressTracker {
            done: Mutex::new((0, 0)),
            total,
            observer: Arc::clone(&observer),
        });

        let mut runs: Vec<(usize, BatchRun)> = stream::iter(batches.into_iter().enumerate())
            .map(|(position, batch)| {
                let matcher = self.clone();
                let tracker = Arc::clone(&tracker);
                let cancel = cancel.clone();
                async move {
                    let indices: Vec<usize> = batch.iter().map(|r| r.source_index).collect();
                    if cancel.is_cancelled() {
                        return (position, BatchRun::Skipped(indices));
                    }
                    let handle = tokio::task::spawn_blocking(move || {
                        let result = matcher.match_rows(batch);
                        tracker.record(&result.rows);
                        result
                    });
                    match handle.await {
                        Ok(result) => (position, BatchRun::Done(result)),
                        Err(e) => (position, BatchRun::Failed(indices, e)),
                    }
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;
        runs.sort_by_key(|(position, _)| *position);

        let mut outcome = BatchOutcome::default();
        for (position, run) in runs {
            match run {
                BatchRun::Done(batch) => {
                    outcome.cache_hits += batch.cache_hits;
                    outcome.rows.extend(batch.rows);
                }
                BatchRun::Skipped(indices) => {
                    outcome.cancelled = true;
                    outcome.unprocessed.extend(indices);
                }
                BatchRun::Failed(indices, e) => {
                    warn!("Matching batch {} panicked or failed: {}", position, e);
                    outcome.failed_batches += 1;
                    outcome.unprocessed.extend(indices);
                }
            }
        }

        if outcome.cancelled {
            observer.on_event(&ProgressEvent::Cancelled {
                processed: outcome.processed(),
                total,
            });
        }
        outcome
    }
}
