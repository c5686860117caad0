use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use super::handle::CoordinatorHandle;
use crate::config::NotifierCfg;
use crate::connectivity::{
    ConnectivityMonitor, ConnectivityObserver, ConnectivityState, RestoredReceiver, Transition,
};
use crate::notify::{NotificationDispatcher, NotificationService};
use crate::secondary::{LocationService, SecondaryWakeSource, SignalHandler};
use crate::store::{self, FlagStore, MONITORING_ENABLED};
use crate::types::{LocationAuthorization, MonitorStatus, Restored};
use crate::wake::{TaskOutcome, WakeBackend, WakeHandler, WakeScheduler, WakeTask};

/// Platform collaborators, injected once at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn FlagStore>,
    pub observer: Arc<dyn ConnectivityObserver>,
    pub notifications: Arc<dyn NotificationService>,
    pub location: Arc<dyn LocationService>,
    pub wake: Arc<dyn WakeBackend>,
}

/// Requests from the UI / app lifecycle, each answered once applied.
pub(crate) enum Command {
    Toggle(oneshot::Sender<bool>),
    Enable(oneshot::Sender<bool>),
    Disable(oneshot::Sender<bool>),
    EnterBackground(oneshot::Sender<()>),
    EnterForeground(oneshot::Sender<()>),
    CheckNow(oneshot::Sender<Transition>),
}

/// Wakes delivered by platform collaborators.
enum WakeEvent {
    Scheduled(WakeTask),
    Location,
}

/// Owner of all monitoring state. Runs as a single task; every mutation of
/// the flag, cached connectivity and authorization snapshots happens here.
pub struct MonitoringCoordinator {
    store: Arc<dyn FlagStore>,
    enabled: bool,
    is_connected: bool,
    location_auth: LocationAuthorization,
    notifications_authorized: bool,
    monitor: Arc<ConnectivityMonitor>,
    restored_rx: RestoredReceiver,
    connectivity_rx: watch::Receiver<ConnectivityState>,
    secondary: SecondaryWakeSource,
    scheduler: WakeScheduler,
    dispatcher: NotificationDispatcher,
    cmd_rx: mpsc::Receiver<Command>,
    wake_tx: mpsc::UnboundedSender<WakeEvent>,
    wake_rx: mpsc::UnboundedReceiver<WakeEvent>,
    status_tx: watch::Sender<MonitorStatus>,
    token: CancellationToken,
}

impl MonitoringCoordinator {
    /// Build the coordinator from persisted state and register the wake
    /// handler. Returns the coordinator (drive it with [`run`](Self::run))
    /// and a handle for callers.
    pub fn new(cfg: &NotifierCfg, collab: Collaborators) -> (Self, CoordinatorHandle) {
        let enabled = store::read_flag(&*collab.store, MONITORING_ENABLED);
        let (monitor, restored_rx) =
            ConnectivityMonitor::new(collab.observer, Arc::clone(&collab.store));
        let connectivity_rx = monitor.subscribe();
        let secondary = SecondaryWakeSource::new(collab.location);
        let scheduler = WakeScheduler::new(collab.wake, cfg.min_wake_interval());
        let dispatcher = NotificationDispatcher::new(collab.notifications, cfg);

        let (cmd_tx, cmd_rx) = mpsc::channel(cfg.command_buffer);
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();

        // Registration precedes any other scheduling work.
        let tx = wake_tx.clone();
        let handler: WakeHandler = Arc::new(move |task| {
            if let Err(mpsc::error::SendError(WakeEvent::Scheduled(task))) =
                tx.send(WakeEvent::Scheduled(task))
            {
                tracing::warn!("coordinator gone, failing wake");
                task.complete(TaskOutcome::Failed);
            }
        });
        scheduler.register(handler);

        let location_auth = secondary.authorization_status();
        let is_connected = monitor.is_connected();
        let status = MonitorStatus {
            monitoring_enabled: enabled,
            is_connected,
            location_auth,
            notifications_authorized: false,
        };
        let (status_tx, status_rx) = watch::channel(status);
        let token = CancellationToken::new();

        let coordinator = Self {
            store: collab.store,
            enabled,
            is_connected,
            location_auth,
            notifications_authorized: false,
            monitor: Arc::new(monitor),
            restored_rx,
            connectivity_rx,
            secondary,
            scheduler,
            dispatcher,
            cmd_rx,
            wake_tx,
            wake_rx,
            status_tx,
            token: token.clone(),
        };
        let handle = CoordinatorHandle::new(cmd_tx, status_rx, token);
        (coordinator, handle)
    }

    /// Build the coordinator and run it on a new task.
    pub fn spawn(cfg: &NotifierCfg, collab: Collaborators) -> CoordinatorHandle {
        let (coordinator, handle) = Self::new(cfg, collab);
        tokio::spawn(coordinator.run());
        handle
    }

    /// Process commands, wakes and restoration events until shutdown.
    pub async fn run(mut self) {
        tracing::info!(enabled = self.enabled, "coordinator started");
        if self.enabled {
            self.start_monitors();
        }
        self.publish();

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                Some(restored) = self.restored_rx.recv() => self.on_restored(restored),
                Ok(()) = self.connectivity_rx.changed() => {
                    self.is_connected = self.connectivity_rx.borrow_and_update().is_connected;
                }
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        tracing::info!("all handles dropped");
                        break;
                    };
                    self.handle_command(cmd).await;
                }
                Some(event) = self.wake_rx.recv() => self.handle_wake(event).await,
            }
            self.publish();
        }

        // Leave the wake chain and persisted flag alone: monitoring resumes on
        // the next launch.
        self.monitor.stop();
        self.secondary.stop();
        tracing::info!("coordinator stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Toggle(reply) => {
                if self.enabled {
                    self.disable();
                } else {
                    self.enable().await;
                }
                self.reply(reply, self.enabled);
            }
            Command::Enable(reply) => {
                self.enable().await;
                self.reply(reply, self.enabled);
            }
            Command::Disable(reply) => {
                self.disable();
                self.reply(reply, self.enabled);
            }
            Command::EnterBackground(reply) => {
                if self.enabled {
                    self.scheduler.schedule_next();
                }
                self.reply(reply, ());
            }
            Command::EnterForeground(reply) => {
                self.refresh_authorization().await;
                if self.enabled {
                    self.check();
                }
                self.reply(reply, ());
            }
            Command::CheckNow(reply) => {
                let transition = self.check();
                self.reply(reply, transition);
            }
        }
    }

    /// Publish state before answering so callers observe the new status as
    /// soon as their call returns.
    fn reply<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        // Caller may have given up waiting.
        let _ = reply.send(value);
    }

    async fn enable(&mut self) {
        if self.enabled {
            return;
        }
        let granted = self.dispatcher.request_authorization().await;
        self.notifications_authorized = granted;
        if !granted {
            tracing::info!("notification permission not granted, monitoring anyway");
        }
        self.secondary.request_authorization();

        self.enabled = true;
        store::write_flag(&*self.store, MONITORING_ENABLED, true);
        self.start_monitors();
        tracing::info!("monitoring enabled");
    }

    fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        store::write_flag(&*self.store, MONITORING_ENABLED, false);
        self.monitor.stop();
        self.secondary.stop();
        self.scheduler.cancel();
        tracing::info!("monitoring disabled");
    }

    fn start_monitors(&mut self) {
        self.monitor.start();

        let tx = self.wake_tx.clone();
        let on_signal: SignalHandler = Arc::new(move || {
            // Best effort; a closed channel means we are shutting down.
            let _ = tx.send(WakeEvent::Location);
        });
        self.secondary.start(on_signal);

        self.is_connected = self.monitor.is_connected();
        self.location_auth = self.secondary.authorization_status();
    }

    async fn refresh_authorization(&mut self) {
        self.location_auth = self.secondary.authorization_status();
        let status = self.dispatcher.authorization_status().await;
        self.notifications_authorized = status.is_authorized();
        tracing::debug!(location = ?self.location_auth, notifications = ?status, "authorization refreshed");
    }

    fn check(&mut self) -> Transition {
        let transition = self.monitor.check();
        self.is_connected = self.monitor.is_connected();
        transition
    }

    async fn handle_wake(&mut self, event: WakeEvent) {
        match event {
            WakeEvent::Scheduled(task) => {
                if !self.enabled {
                    // Stale wake after cancel: check, but do not revive the chain.
                    let transition = self.check();
                    tracing::debug!(identifier = %task.identifier(), ?transition, "wake while disabled, not rescheduling");
                    task.complete(TaskOutcome::Completed);
                    return;
                }
                let monitor = Arc::clone(&self.monitor);
                let (outcome, transition) =
                    self.scheduler.handle_wake(task, move || monitor.check()).await;
                self.is_connected = self.monitor.is_connected();
                tracing::info!(?outcome, ?transition, "periodic wake handled");
            }
            WakeEvent::Location => {
                let transition = self.check();
                tracing::debug!(?transition, "location wake handled");
            }
        }
    }

    fn on_restored(&mut self, restored: Restored) {
        // Read the flag now, not when the event was produced.
        if !self.enabled {
            tracing::debug!(at = %restored.at, "restoration while disabled, not notifying");
            return;
        }
        self.dispatcher.send_restored();
    }

    fn status(&self) -> MonitorStatus {
        MonitorStatus {
            monitoring_enabled: self.enabled,
            is_connected: self.is_connected,
            location_auth: self.location_auth,
            notifications_authorized: self.notifications_authorized,
        }
    }

    fn publish(&self) {
        self.status_tx.send_if_modified(|current| {
            let next = self.status();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
