use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::wake::{ScheduleError, TaskOutcome, WakeBackend, WakeHandler, WakeRequest, WakeTask};

#[derive(Default)]
struct State {
    handlers: HashMap<String, WakeHandler>,
    pending: HashMap<String, WakeRequest>,
    fail_next: usize,
    submits: usize,
    cancels: usize,
}

/// Wake backend that holds requests in memory and fires them on demand or
/// from a polling clock.
#[derive(Default)]
pub struct SimWakeBackend {
    state: Mutex<State>,
}

impl SimWakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` submissions.
    pub fn fail_next_submits(&self, n: usize) {
        self.lock().fail_next = n;
    }

    pub fn pending(&self, identifier: &str) -> Option<WakeRequest> {
        self.lock().pending.get(identifier).cloned()
    }

    pub fn submit_count(&self) -> usize {
        self.lock().submits
    }

    pub fn cancel_count(&self) -> usize {
        self.lock().cancels
    }

    pub fn is_registered(&self, identifier: &str) -> bool {
        self.lock().handlers.contains_key(identifier)
    }

    /// Fire a wake for `identifier` now, consuming any pending request.
    /// The task expires after `budget` if given. Returns the outcome receiver,
    /// or `None` when no handler is registered.
    pub fn fire(
        &self,
        identifier: &str,
        budget: Option<Duration>,
    ) -> Option<oneshot::Receiver<TaskOutcome>> {
        let handler = {
            let mut state = self.lock();
            state.pending.remove(identifier);
            state.handlers.get(identifier).cloned()
        }?;

        let (task, rx) = WakeTask::new(identifier);
        if let Some(budget) = budget {
            let timer = task.clone();
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                if timer.outcome().is_none() {
                    timer.expire();
                }
            });
        }
        tracing::debug!(identifier, "firing wake");
        handler(task);
        Some(rx)
    }

    /// Fire every pending request whose earliest begin date has passed.
    pub fn fire_due(&self, now: DateTime<Utc>, budget: Option<Duration>) -> usize {
        let due: Vec<String> = self
            .lock()
            .pending
            .values()
            .filter(|r| r.earliest_begin <= now)
            .map(|r| r.identifier.clone())
            .collect();
        due.iter()
            .filter(|id| self.fire(id, budget).is_some())
            .count()
    }

    /// Poll for due requests every `tick` until `cancel` fires.
    pub fn spawn_clock(
        self: Arc<Self>,
        tick: Duration,
        budget: Duration,
        cancel: CancellationToken,
    ) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {
                        self.fire_due(Utc::now(), Some(budget));
                    }
                }
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WakeBackend for SimWakeBackend {
    fn register(&self, identifier: &str, handler: WakeHandler) {
        self.lock().handlers.insert(identifier.to_owned(), handler);
    }

    fn submit(&self, request: &WakeRequest) -> Result<(), ScheduleError> {
        let mut state = self.lock();
        state.submits += 1;
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(ScheduleError::Unavailable);
        }
        state
            .pending
            .insert(request.identifier.clone(), request.clone());
        Ok(())
    }

    fn cancel(&self, identifier: &str) {
        let mut state = self.lock();
        state.cancels += 1;
        state.pending.remove(identifier);
    }
}
