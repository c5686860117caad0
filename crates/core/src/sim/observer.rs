use std::sync::Mutex;

use crate::connectivity::{ConnectivityObserver, Observation, ObserveError, PathHandler};
use crate::types::PathSnapshot;

struct State {
    current: Observation,
    handler: Option<PathHandler>,
    starts: usize,
}

/// Path observer whose state is set by hand.
pub struct SimObserver {
    state: Mutex<State>,
}

impl SimObserver {
    pub fn new(connected: bool) -> Self {
        Self {
            state: Mutex::new(State {
                current: Ok(PathSnapshot { connected }),
                handler: None,
                starts: 0,
            }),
        }
    }

    /// Change the path and push the change to the running handler, if any.
    pub fn set_connected(&self, connected: bool) {
        self.push(Ok(PathSnapshot { connected }));
    }

    /// Change the path without notifying, as if it changed while the
    /// process was suspended.
    pub fn set_snapshot(&self, connected: bool) {
        self.lock().current = Ok(PathSnapshot { connected });
    }

    /// Make reads fail and push the failure to the running handler.
    pub fn set_failure(&self, error: ObserveError) {
        self.push(Err(error));
    }

    pub fn is_observing(&self) -> bool {
        self.lock().handler.is_some()
    }

    pub fn start_count(&self) -> usize {
        self.lock().starts
    }

    fn push(&self, observation: Observation) {
        let handler = {
            let mut state = self.lock();
            state.current = observation.clone();
            state.handler.clone()
        };
        if let Some(handler) = handler {
            handler(observation);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConnectivityObserver for SimObserver {
    fn start(&self, handler: PathHandler) {
        let initial = {
            let mut state = self.lock();
            state.handler = Some(handler.clone());
            state.starts += 1;
            state.current.clone()
        };
        handler(initial);
    }

    fn stop(&self) {
        self.lock().handler = None;
    }

    fn current_snapshot(&self) -> Observation {
        self.lock().current.clone()
    }
}
