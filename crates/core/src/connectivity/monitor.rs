use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::observer::{ConnectivityObserver, Observation, PathHandler};
use crate::store::{self, FlagStore, WAS_CONNECTED};
use crate::types::Restored;

/// Receiving end of restoration events. Exactly one consumer.
pub type RestoredReceiver = mpsc::UnboundedReceiver<Restored>;

/// Last decided connectivity (persisted) and latest observed connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectivityState {
    pub was_connected: bool,
    pub is_connected: bool,
}

/// What a single observation did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Offline → online; a restoration event was emitted.
    Restored,
    /// Online → offline.
    Lost,
    /// Same as the last decided state.
    Steady,
    /// Observation failed; nothing changed.
    NoData,
}

struct Shared {
    store: Arc<dyn FlagStore>,
    state_tx: watch::Sender<ConnectivityState>,
    restored_tx: mpsc::UnboundedSender<Restored>,
}

impl Shared {
    /// Compare, record and persist while holding the state channel's write
    /// lock, so concurrent observations converge on the latest value and a
    /// transition is emitted at most once.
    fn apply(&self, observation: Observation) -> Transition {
        let now_connected = match observation {
            Ok(snapshot) => snapshot.connected,
            Err(e) => {
                tracing::warn!(error = %e, "connectivity observation failed, keeping prior state");
                return Transition::NoData;
            }
        };

        let mut transition = Transition::Steady;
        self.state_tx.send_if_modified(|state| {
            transition = match (state.was_connected, now_connected) {
                (false, true) => Transition::Restored,
                (true, false) => Transition::Lost,
                _ => Transition::Steady,
            };
            if transition == Transition::Restored
                && self.restored_tx.send(Restored { at: Utc::now() }).is_err()
            {
                tracing::debug!("no restoration listener");
            }
            state.is_connected = now_connected;
            state.was_connected = now_connected;
            store::write_flag(&*self.store, WAS_CONNECTED, now_connected);
            transition != Transition::Steady
        });

        match transition {
            Transition::Restored => tracing::info!("connectivity restored"),
            Transition::Lost => tracing::info!("connectivity lost"),
            _ => {}
        }
        transition
    }
}

/// Tracks connectivity across wakes and emits one event per offline → online
/// transition, including transitions that happened while the process was not
/// running.
pub struct ConnectivityMonitor {
    observer: Arc<dyn ConnectivityObserver>,
    shared: Arc<Shared>,
    /// Token of the running observation task, if started.
    running: Mutex<Option<CancellationToken>>,
}

impl ConnectivityMonitor {
    /// Create a monitor seeded from the persisted last-known state.
    /// Returns the monitor and the receiver for restoration events.
    pub fn new(
        observer: Arc<dyn ConnectivityObserver>,
        store: Arc<dyn FlagStore>,
    ) -> (Self, RestoredReceiver) {
        let was_connected = store::read_flag(&*store, WAS_CONNECTED);
        let (restored_tx, restored_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectivityState {
            was_connected,
            is_connected: was_connected,
        });
        let shared = Arc::new(Shared {
            store,
            state_tx,
            restored_tx,
        });
        let monitor = Self {
            observer,
            shared,
            running: Mutex::new(None),
        };
        (monitor, restored_rx)
    }

    /// Begin continuous observation. Observations are applied in order on a
    /// dedicated background task. Calling again replaces the running observation.
    /// Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = running.take() {
            previous.cancel();
            self.observer.stop();
        }

        let token = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<Observation>();
        let shared = Arc::clone(&self.shared);
        let task_token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    observation = rx.recv() => {
                        let Some(observation) = observation else {
                            break;
                        };
                        shared.apply(observation);
                    }
                }
            }
            tracing::debug!("connectivity observation task stopped");
        });

        let handler: PathHandler = Arc::new(move |observation| {
            // Send fails only after the task has stopped.
            let _ = tx.send(observation);
        });
        self.observer.start(handler);
        *running = Some(token);
        tracing::info!("connectivity monitoring started");
    }

    /// Stop observation. No-op when not started.
    pub fn stop(&self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = running.take() {
            token.cancel();
            self.observer.stop();
            tracing::info!("connectivity monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Read the live path and run the transition logic once.
    /// Used right after a wake, before the observer has had a chance to fire.
    pub fn check(&self) -> Transition {
        self.shared.apply(self.observer.current_snapshot())
    }

    pub fn state(&self) -> ConnectivityState {
        *self.shared.state_tx.borrow()
    }

    /// Receiver notified whenever the observed connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.shared.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected
    }

    /// Last decided connectivity, as persisted.
    pub fn was_connected(&self) -> bool {
        self.state().was_connected
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
