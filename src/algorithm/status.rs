//! Run status of an algorithm and the exclusive-run guard

use crate::error::{SvrError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::error;

/// Workflow status observed by front ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Status {
    Idle = 0,
    Running = 1,
    Done = 2,
    Error = 3,
}

impl Status {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Status::Running,
            2 => Status::Done,
            3 => Status::Error,
            _ => Status::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Running => "running",
            Status::Done => "done",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status flag plus the error-message slot
#[derive(Debug)]
pub(crate) struct StatusCell {
    status: AtomicU8,
    message: RwLock<Option<String>>,
}

impl StatusCell {
    pub(crate) fn new(status: Status, message: Option<String>) -> Self {
        Self {
            status: AtomicU8::new(status as u8),
            message: RwLock::new(message),
        }
    }

    pub(crate) fn get(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn message(&self) -> Option<String> {
        self.message.read().clone()
    }

    fn set(&self, status: Status, message: Option<String>) {
        *self.message.write() = message;
        self.status.store(status as u8, Ordering::Release);
    }

    /// Atomically move any non-running status to `Running`.
    /// Returns the status that was replaced.
    fn acquire(&self) -> Result<Status> {
        self.status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s != Status::Running as u8).then_some(Status::Running as u8)
            })
            .map(Status::from_u8)
            .map_err(|_| SvrError::Busy)
    }

    /// Enter a tracked run. The outcome is written back as `Done` or `Error`.
    pub(crate) fn begin(&self) -> Result<RunGuard<'_>> {
        let previous = self.acquire()?;
        Ok(RunGuard { cell: self, previous, restore: false, finished: false })
    }

    /// Enter a short exclusive section. The prior status is restored on exit.
    pub(crate) fn exclusive(&self) -> Result<RunGuard<'_>> {
        let previous = self.acquire()?;
        Ok(RunGuard { cell: self, previous, restore: true, finished: false })
    }
}

/// Holds the running state until the operation completes
pub(crate) struct RunGuard<'a> {
    cell: &'a StatusCell,
    previous: Status,
    restore: bool,
    finished: bool,
}

impl RunGuard<'_> {
    /// Record the outcome of the guarded operation and hand it back
    pub(crate) fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        self.finished = true;
        if self.restore {
            self.cell.status.store(self.previous as u8, Ordering::Release);
            return result;
        }
        match &result {
            Ok(_) => self.cell.set(Status::Done, None),
            Err(e) => {
                error!(error = %e, "Operation failed");
                self.cell.set(Status::Error, Some(e.to_string()));
            }
        }
        result
    }

    /// Leave without having done any work; the prior status is put back
    pub(crate) fn abandon<T>(mut self, result: Result<T>) -> Result<T> {
        self.restore = true;
        self.finish(result)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.restore {
            self.cell.status.store(self.previous as u8, Ordering::Release);
        } else {
            self.cell.set(Status::Error, Some("operation was interrupted".to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_run_is_busy() {
        let cell = StatusCell::new(Status::Idle, None);
        let guard = cell.begin().unwrap();
        assert_eq!(cell.get(), Status::Running);
        assert!(matches!(cell.begin(), Err(SvrError::Busy)));
        assert!(matches!(cell.exclusive(), Err(SvrError::Busy)));

        guard.finish(Ok(())).unwrap();
        assert_eq!(cell.get(), Status::Done);
        assert_eq!(cell.message(), None);
    }

    #[test]
    fn test_failure_sets_message() {
        let cell = StatusCell::new(Status::Done, None);
        let guard = cell.begin().unwrap();
        let result: Result<()> = guard.finish(Err(SvrError::NoTrainedModel));
        assert!(result.is_err());
        assert_eq!(cell.get(), Status::Error);
        assert_eq!(cell.message().as_deref(), Some("No trained model"));
    }

    #[test]
    fn test_exclusive_restores_status() {
        let cell = StatusCell::new(Status::Error, Some("old".to_string()));
        let guard = cell.exclusive().unwrap();
        assert_eq!(cell.get(), Status::Running);
        drop(guard);
        assert_eq!(cell.get(), Status::Error);
        assert_eq!(cell.message().as_deref(), Some("old"));
    }

    #[test]
    fn test_abandoned_run_keeps_status() {
        let cell = StatusCell::new(Status::Done, None);
        let guard = cell.begin().unwrap();
        let result: Result<()> = guard.abandon(Err(SvrError::NoTrainedModel));
        assert!(matches!(result, Err(SvrError::NoTrainedModel)));
        assert_eq!(cell.get(), Status::Done);
        assert_eq!(cell.message(), None);
    }

    #[test]
    fn test_dropped_run_marks_error() {
        let cell = StatusCell::new(Status::Idle, None);
        drop(cell.begin().unwrap());
        assert_eq!(cell.get(), Status::Error);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Status::Running).unwrap(), "\"running\"");
    }
}
