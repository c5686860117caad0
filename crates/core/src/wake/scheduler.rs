use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{TaskOutcome, WakeTask};

/// Identifier of the recurring connectivity-check wake.
pub const WAKE_IDENTIFIER: &str = "com.onlinenotifier.connectivity-check";

/// Request for a wake no earlier than `earliest_begin`. A newer request with
/// the same identifier supersedes an unfired one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeRequest {
    pub identifier: String,
    pub earliest_begin: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("wake scheduling unavailable")]
    Unavailable,
    #[error("too many pending wake requests")]
    TooManyPending,
    #[error("wake identifier not registered: {0}")]
    NotRegistered(String),
}

/// Handler invoked by the backend when a scheduled wake fires.
pub type WakeHandler = Arc<dyn Fn(WakeTask) + Send + Sync>;

/// Platform periodic wake scheduler.
pub trait WakeBackend: Send + Sync {
    /// Register the handler for `identifier`. Called once, before any submit.
    fn register(&self, identifier: &str, handler: WakeHandler);

    fn submit(&self, request: &WakeRequest) -> Result<(), ScheduleError>;

    /// Withdraw a pending request. No-op when none is pending.
    fn cancel(&self, identifier: &str);
}

/// Keeps the recurring wake chain alive.
pub struct WakeScheduler {
    backend: Arc<dyn WakeBackend>,
    identifier: String,
    min_interval: Duration,
}

impl WakeScheduler {
    pub fn new(backend: Arc<dyn WakeBackend>, min_interval: Duration) -> Self {
        Self {
            backend,
            identifier: WAKE_IDENTIFIER.to_owned(),
            min_interval,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn register(&self, handler: WakeHandler) {
        self.backend.register(&self.identifier, handler);
        tracing::debug!(identifier = %self.identifier, "wake handler registered");
    }

    /// The request `schedule_next` would submit at `now`.
    pub fn next_request(&self, now: DateTime<Utc>) -> WakeRequest {
        let delay = chrono::Duration::from_std(self.min_interval)
            .unwrap_or_else(|_| chrono::Duration::minutes(15));
        WakeRequest {
            identifier: self.identifier.clone(),
            earliest_begin: now + delay,
        }
    }

    /// Submit the next wake. Failure is logged and otherwise ignored; the next
    /// foreground resume still runs a check.
    pub fn schedule_next(&self) -> Option<WakeRequest> {
        let request = self.next_request(Utc::now());
        match self.backend.submit(&request) {
            Ok(()) => {
                tracing::info!(
                    identifier = %request.identifier,
                    earliest_begin = %request.earliest_begin,
                    "wake scheduled"
                );
                Some(request)
            }
            Err(e) => {
                tracing::warn!(identifier = %request.identifier, error = %e, "failed to schedule wake");
                None
            }
        }
    }

    pub fn cancel(&self) {
        self.backend.cancel(&self.identifier);
        tracing::info!(identifier = %self.identifier, "pending wake cancelled");
    }

    /// Run one wake: reschedule first, then run `work` once under the task's
    /// expiration guard, then complete the task.
    ///
    /// If the task expires first it is completed as failed and this returns
    /// without a value. `work` keeps running detached on its blocking thread,
    /// so a hung check never holds up the caller.
    pub async fn handle_wake<F, T>(&self, task: WakeTask, work: F) -> (TaskOutcome, Option<T>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.schedule_next();

        let expiration = task.expiration_token();
        let work = tokio::task::spawn_blocking(work);

        let result = tokio::select! {
            biased;
            _ = expiration.cancelled() => None,
            result = work => Some(result),
        };
        let Some(result) = result else {
            if task.complete(TaskOutcome::Failed) {
                tracing::warn!(identifier = %task.identifier(), "wake expired before work finished, detaching");
            }
            return (TaskOutcome::Failed, None);
        };

        let value = match result {
            Ok(value) => {
                task.complete(TaskOutcome::Completed);
                Some(value)
            }
            Err(e) => {
                tracing::error!(identifier = %task.identifier(), error = %e, "wake work panicked");
                task.complete(TaskOutcome::Failed);
                None
            }
        };

        let outcome = task.outcome().unwrap_or(TaskOutcome::Failed);
        tracing::debug!(identifier = %task.identifier(), ?outcome, "wake handled");
        (outcome, value)
    }
}
