// src/utils/progress_bars/progress_callback.rs - Progress events and their observers
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::models::PipelineStage;
use crate::utils::get_memory_usage;
use crate::utils::progress_bars::logging::StageLogger;
use crate::utils::config::ProgressOutput;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    StageStarted {
        stage: PipelineStage,
    },
    StageCompleted {
        stage: PipelineStage,
        seconds: f64,
    },
    /// Emitted after each matching batch; `done` never decreases within a run.
    BatchCompleted {
        done: usize,
        total: usize,
        matched: usize,
    },
    Cancelled {
        processed: usize,
        total: usize,
    },
    Failed {
        stage: PipelineStage,
        message: String,
    },
}

pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

pub type SharedObserver = Arc<dyn ProgressObserver>;

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Writes events to the log through a [`StageLogger`]. Per-batch lines are optional;
/// stage transitions, cancellation and failures are always logged.
#[derive(Debug)]
pub struct LoggingObserver {
    logger: StageLogger,
    batch_lines: bool,
}

impl LoggingObserver {
    pub fn new(batch_lines: bool) -> Self {
        Self {
            logger: StageLogger::new(PipelineStage::Idle),
            batch_lines,
        }
    }

    pub fn logs_batches(&self) -> bool {
        self.batch_lines
    }
}

impl ProgressObserver for LoggingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageStarted { stage } => {
                StageLogger::new(*stage).log_phase(&stage.to_string(), "started");
            }
            ProgressEvent::StageCompleted { stage, seconds } => {
                StageLogger::new(*stage)
                    .log_phase(&stage.to_string(), &format!("finished in {:.2}s", seconds));
            }
            ProgressEvent::BatchCompleted { done, total, matched } => {
                if self.batch_lines {
                    StageLogger::new(PipelineStage::MatchingCounsellingData).log_progress_update(
                        *done,
                        *total,
                        Some(format!("{} matched", matched).as_str()),
                    );
                }
            }
            ProgressEvent::Cancelled { processed, total } => {
                self.logger.log_warning(&format!(
                    "Cancelled after {}/{} rows; remaining batches were not dispatched",
                    processed, total
                ));
            }
            ProgressEvent::Failed { stage, message } => {
                StageLogger::new(*stage).log_error(message);
            }
        }
    }
}

/// Forwards events into a tokio channel for callers that consume them asynchronously.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_event(&self, event: &ProgressEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.sender.send(event.clone());
    }
}

/// Fans one event out to several observers, in order.
#[derive(Clone, Default)]
pub struct CompositeObserver {
    observers: Vec<SharedObserver>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<SharedObserver>) -> Self {
        Self { observers }
    }
}

impl ProgressObserver for CompositeObserver {
    fn on_event(&self, event: &ProgressEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

/// Renders matching progress as an indicatif bar.
pub struct ProgressBarObserver {
    bar: ProgressBar,
    show_memory: bool,
    batches_seen: AtomicUsize,
}

impl ProgressBarObserver {
    /// `None` when the bar is switched off.
    pub fn new(output: &ProgressOutput, multi: Option<&MultiProgress>) -> Option<Self> {
        if !output.bar {
            return None;
        }
        let bar = ProgressBar::new(0);
        let bar = match multi {
            Some(mp) => mp.add(bar),
            None => bar,
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  🎓 [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} rows {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_message("Waiting for counselling data...");
        Some(Self {
            bar,
            show_memory: output.memory,
            batches_seen: AtomicUsize::new(0),
        })
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageStarted { stage } => {
                self.bar.set_message(format!("{}...", stage));
            }
            ProgressEvent::StageCompleted { .. } => {}
            ProgressEvent::BatchCompleted { done, total, matched } => {
                self.bar.set_length(*total as u64);
                self.bar.set_position(*done as u64);
                let seen = self.batches_seen.fetch_add(1, Ordering::Relaxed);
                if self.show_memory && seen % 10 == 0 {
                    self.bar.set_message(format!(
                        "Matching... (Memory: {} MB, matched: {})",
                        get_memory_usage(),
                        matched
                    ));
                } else {
                    self.bar.set_message(format!("Matching... (matched: {})", matched));
                }
                if done == total {
                    self.bar.finish_with_message(format!("Matched {}/{} rows", matched, total));
                }
            }
            ProgressEvent::Cancelled { processed, total } => {
                self.bar
                    .abandon_with_message(format!("Cancelled at {}/{} rows", processed, total));
            }
            ProgressEvent::Failed { stage, message } => {
                self.bar
                    .abandon_with_message(format!("Failed while {}: {}", stage, message));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_event(&ProgressEvent::StageStarted {
            stage: PipelineStage::LoadingFoundation,
        });
        observer.on_event(&ProgressEvent::BatchCompleted {
            done: 5,
            total: 10,
            matched: 4,
        });
        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::StageStarted {
                stage: PipelineStage::LoadingFoundation
            })
        );
        assert!(matches!(rx.recv().await, Some(ProgressEvent::BatchCompleted { done: 5, .. })));
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_event(&ProgressEvent::Cancelled { processed: 0, total: 1 });
    }

    #[test]
    fn test_closure_and_composite_observers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let recorder = move |event: &ProgressEvent| {
            if let ProgressEvent::BatchCompleted { done, .. } = event {
                seen_clone.lock().unwrap().push(*done);
            }
        };
        let composite = CompositeObserver::new(vec![
            Arc::new(recorder) as SharedObserver,
            Arc::new(NoopObserver),
            Arc::new(LoggingObserver::new(true)),
        ]);
        for done in [2, 4, 6] {
            composite.on_event(&ProgressEvent::BatchCompleted {
                done,
                total: 6,
                matched: done,
            });
        }
        assert_eq!(*seen.lock().unwrap(), vec![2, 4, 6]);
    }

    #[test]
    fn test_progress_bar_observer_respects_output_settings() {
        let mut output = ProgressOutput::default();
        output.bar = false;
        assert!(ProgressBarObserver::new(&output, None).is_none());

        output.bar = true;
        output.memory = false;
        let observer = ProgressBarObserver::new(&output, None).unwrap();
        observer.on_event(&ProgressEvent::BatchCompleted {
            done: 3,
            total: 3,
            matched: 2,
        });
        assert_eq!(observer.bar.position(), 3);
        assert!(observer.bar.is_finished());
    }

    #[test]
    fn test_logging_observer_batch_lines_follow_settings() {
        let quiet = ProgressOutput {
            batch_lines: false,
            ..ProgressOutput::default()
        };
        let observer = quiet.logging_observer();
        assert!(!observer.logs_batches());
        // Stage and batch events are accepted either way.
        observer.on_event(&ProgressEvent::BatchCompleted { done: 1, total: 2, matched: 1 });
        observer.on_event(&ProgressEvent::StageCompleted {
            stage: PipelineStage::Reporting,
            seconds: 0.5,
        });

        assert!(ProgressOutput::default().logging_observer().logs_batches());
    }
}
