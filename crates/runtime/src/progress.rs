//! Weighted progress for one ingestion run.
//!
//! The synchronous stage is worth a fixed share; the rest is split evenly
//! across the asynchronous tasks. Tasks never touch the percentage
//! themselves: they send a [`Completion`] to the single
//! [`ProgressCoordinator`], which owns the arithmetic and the callback.

use std::collections::BTreeSet;

use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const SYNC_SHARE: f64 = 10.0;
pub const ASYNC_SHARE: f64 = 90.0;
pub const COMPLETE: f64 = 100.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub task: usize,
    pub label: String,
    pub outcome: TaskOutcome,
}

impl Completion {
    pub fn message(&self) -> String {
        match self.outcome {
            TaskOutcome::Succeeded => format!("Loaded {}", self.label),
            TaskOutcome::Failed => format!("Failed to load {}", self.label),
            TaskOutcome::Skipped => format!("Skipped {}", self.label),
        }
    }
}

/// Progress arithmetic.
///
/// Each task index counts once; repeats and out-of-range indices are
/// ignored. The reported value never decreases and the last task lands on
/// exactly [`COMPLETE`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressTracker {
    total_tasks: usize,
    done: BTreeSet<usize>,
    percent: f64,
}

impl ProgressTracker {
    pub fn new(total_tasks: usize) -> Self {
        Self {
            total_tasks,
            done: BTreeSet::new(),
            percent: 0.0,
        }
    }

    pub fn total_tasks(&self) -> usize {
        self.total_tasks
    }

    pub fn completed(&self) -> usize {
        self.done.len()
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= COMPLETE
    }

    /// The synchronous stage finished. With nothing asynchronous left the run
    /// is complete.
    pub fn finish_sync(&mut self) -> f64 {
        if self.total_tasks == 0 {
            self.advance(COMPLETE)
        } else {
            self.advance(SYNC_SHARE)
        }
    }

    pub fn finish_task(&mut self, task: usize) -> Option<f64> {
        if task >= self.total_tasks {
            warn!(task, total = self.total_tasks, "progress report for unknown task");
            return None;
        }
        if !self.done.insert(task) {
            debug!(task, "duplicate progress report ignored");
            return None;
        }
        let target = if self.done.len() == self.total_tasks {
            COMPLETE
        } else {
            SYNC_SHARE + ASYNC_SHARE * self.done.len() as f64 / self.total_tasks as f64
        };
        Some(self.advance(target))
    }

    /// Jump to completion, for runs whose remaining tasks can no longer report.
    pub fn force_complete(&mut self) -> f64 {
        self.advance(COMPLETE)
    }

    fn advance(&mut self, target: f64) -> f64 {
        self.percent = self.percent.max(target.min(COMPLETE));
        self.percent
    }
}

/// Sending half, handed to the tasks by reference.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<Completion>,
}

impl ProgressReporter {
    pub fn complete(&self, task: usize, label: impl Into<String>, outcome: TaskOutcome) {
        let completion = Completion {
            task,
            label: label.into(),
            outcome,
        };
        if self.tx.send(completion).is_err() {
            debug!(task, "progress coordinator already finished");
        }
    }
}

pub struct ProgressCoordinator {
    rx: mpsc::UnboundedReceiver<Completion>,
    tracker: ProgressTracker,
}

pub fn progress_channel(total_tasks: usize) -> (ProgressReporter, ProgressCoordinator) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressReporter { tx },
        ProgressCoordinator {
            rx,
            tracker: ProgressTracker::new(total_tasks),
        },
    )
}

impl ProgressCoordinator {
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn finish_sync<C: FnMut(&str, f64) + ?Sized>(&mut self, message: &str, on_progress: &mut C) {
        let percent = self.tracker.finish_sync();
        on_progress(message, percent);
    }

    /// Drain completions until every reporter is dropped.
    ///
    /// If the channel closes before every task reported, the run still ends
    /// on [`COMPLETE`].
    pub async fn run<C: FnMut(&str, f64) + ?Sized>(mut self, on_progress: &mut C) -> ProgressTracker {
        while let Some(completion) = self.rx.recv().await {
            if let Some(percent) = self.tracker.finish_task(completion.task) {
                on_progress(&completion.message(), percent);
            }
        }
        if !self.tracker.is_complete() {
            warn!(
                completed = self.tracker.completed(),
                total = self.tracker.total_tasks(),
                "progress channel closed before every task reported"
            );
            let percent = self.tracker.force_complete();
            on_progress("Scene loaded", percent);
        }
        self.tracker
    }
}
