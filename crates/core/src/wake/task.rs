use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Terminal result of a wake unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    Completed,
    /// Any end other than a normal finish, expiry included.
    Failed,
}

struct TaskInner {
    identifier: String,
    expiration: CancellationToken,
    outcome: OnceLock<TaskOutcome>,
    report: Mutex<Option<oneshot::Sender<TaskOutcome>>>,
}

impl TaskInner {
    fn complete(&self, outcome: TaskOutcome) -> bool {
        if self.outcome.set(outcome).is_err() {
            return false;
        }
        let tx = self
            .report
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(tx) = tx {
            // Backend may have stopped listening.
            let _ = tx.send(outcome);
        }
        true
    }
}

impl Drop for TaskInner {
    fn drop(&mut self) {
        if self.outcome.get().is_none() {
            tracing::warn!(identifier = %self.identifier, "wake task dropped without completing");
            self.complete(TaskOutcome::Failed);
        }
    }
}

/// One in-flight wake, handed to the wake handler by the backend.
///
/// Completion is terminal: the first call to [`complete`](Self::complete)
/// wins and is reported to the backend exactly once. The backend calls
/// [`expire`](Self::expire) when the execution budget is about to run out.
#[derive(Clone)]
pub struct WakeTask {
    inner: Arc<TaskInner>,
}

impl WakeTask {
    /// Create a task and the receiver on which its single outcome is reported.
    pub fn new(identifier: impl Into<String>) -> (Self, oneshot::Receiver<TaskOutcome>) {
        let (tx, rx) = oneshot::channel();
        let task = Self {
            inner: Arc::new(TaskInner {
                identifier: identifier.into(),
                expiration: CancellationToken::new(),
                outcome: OnceLock::new(),
                report: Mutex::new(Some(tx)),
            }),
        };
        (task, rx)
    }

    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    /// Signal that the execution budget is exhausted.
    pub fn expire(&self) {
        self.inner.expiration.cancel();
    }

    pub fn is_expired(&self) -> bool {
        self.inner.expiration.is_cancelled()
    }

    /// Token cancelled when the task expires.
    pub fn expiration_token(&self) -> CancellationToken {
        self.inner.expiration.clone()
    }

    /// Mark the task finished. Returns false if it was already finished.
    pub fn complete(&self, outcome: TaskOutcome) -> bool {
        self.inner.complete(outcome)
    }

    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.inner.outcome.get().copied()
    }
}

impl std::fmt::Debug for WakeTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeTask")
            .field("identifier", &self.inner.identifier)
            .field("expired", &self.is_expired())
            .field("outcome", &self.outcome())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_completion_wins() {
        let (task, mut rx) = WakeTask::new("t");
        assert!(task.complete(TaskOutcome::Failed));
        assert!(!task.complete(TaskOutcome::Completed));
        assert_eq!(task.outcome(), Some(TaskOutcome::Failed));
        assert_eq!(rx.try_recv().unwrap(), TaskOutcome::Failed);
    }

    #[test]
    fn clones_share_completion() {
        let (task, mut rx) = WakeTask::new("t");
        let other = task.clone();
        other.complete(TaskOutcome::Completed);
        assert_eq!(task.outcome(), Some(TaskOutcome::Completed));
        assert_eq!(rx.try_recv().unwrap(), TaskOutcome::Completed);
    }

    #[test]
    fn expire_does_not_complete_by_itself() {
        let (task, _rx) = WakeTask::new("t");
        task.expire();
        assert!(task.is_expired());
        assert!(task.expiration_token().is_cancelled());
        assert_eq!(task.outcome(), None);
        task.complete(TaskOutcome::Completed);
    }

    #[test]
    fn dropped_task_reports_failure() {
        let (task, mut rx) = WakeTask::new("t");
        drop(task);
        assert_eq!(rx.try_recv().unwrap(), TaskOutcome::Failed);
    }
}
