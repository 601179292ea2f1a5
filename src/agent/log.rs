//! Logging context
//!
//! A cloneable handle threaded through the community and its agents. While
//! attached to a task, every record is emitted through `tracing` and buffered
//! for the persistence collaborator to drain.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::StepDescriptor;

/// One buffered record, keyed by step and role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub task: String,
    pub step: usize,
    pub total: usize,
    pub role: String,
    pub text: String,
}

#[derive(Debug, Default)]
struct Inner {
    task: Option<String>,
    records: Vec<LogRecord>,
}

/// Shared log sink with `new → attach → detach` lifecycle
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    inner: Arc<Mutex<Inner>>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // a poisoned buffer is still a usable buffer
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start buffering records for `task`. Records left from a previous task
    /// are discarded.
    pub fn attach(&self, task: impl Into<String>) {
        let mut inner = self.lock();
        inner.task = Some(task.into());
        inner.records.clear();
    }

    /// Stop buffering. Already buffered records stay until drained.
    pub fn detach(&self) {
        self.lock().task = None;
    }

    /// Name of the attached task
    pub fn task(&self) -> Option<String> {
        self.lock().task.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.lock().task.is_some()
    }

    /// Emit a record for one role at one step
    pub fn record(&self, step: StepDescriptor, role: &str, text: &str) {
        let mut inner = self.lock();
        let task = inner.task.clone();

        info!(
            task = task.as_deref().unwrap_or("-"),
            step = step.index + 1,
            total = step.total,
            role,
            "{}",
            text
        );

        if let Some(task) = task {
            inner.records.push(LogRecord {
                task,
                step: step.index,
                total: step.total,
                role: role.to_string(),
                text: text.to_string(),
            });
        }
    }

    /// Take every buffered record
    pub fn drain(&self) -> Vec<LogRecord> {
        std::mem::take(&mut self.lock().records)
    }
}
