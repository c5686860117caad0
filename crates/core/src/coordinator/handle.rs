use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use super::actor::Command;
use crate::connectivity::Transition;
use crate::types::MonitorStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("coordinator is not running")]
    Stopped,
}

/// Cloneable handle to a running [`MonitoringCoordinator`](super::MonitoringCoordinator).
///
/// Operations are queued and applied one at a time, so concurrent toggles
/// never interleave. Each call returns after its effect is visible in
/// [`status`](Self::status).
#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<MonitorStatus>,
    token: CancellationToken,
}

impl CoordinatorHandle {
    pub(crate) fn new(
        cmd_tx: mpsc::Sender<Command>,
        status_rx: watch::Receiver<MonitorStatus>,
        token: CancellationToken,
    ) -> Self {
        Self {
            cmd_tx,
            status_rx,
            token,
        }
    }

    /// Enable if disabled, disable if enabled. Returns the new state.
    pub async fn toggle(&self) -> Result<bool, CoordinatorError> {
        self.request(Command::Toggle).await
    }

    pub async fn enable(&self) -> Result<bool, CoordinatorError> {
        self.request(Command::Enable).await
    }

    pub async fn disable(&self) -> Result<bool, CoordinatorError> {
        self.request(Command::Disable).await
    }

    pub async fn enter_background(&self) -> Result<(), CoordinatorError> {
        self.request(Command::EnterBackground).await
    }

    pub async fn enter_foreground(&self) -> Result<(), CoordinatorError> {
        self.request(Command::EnterForeground).await
    }

    /// Run one connectivity check regardless of the monitoring flag.
    pub async fn check_now(&self) -> Result<Transition, CoordinatorError> {
        self.request(Command::CheckNow).await
    }

    pub fn status(&self) -> MonitorStatus {
        *self.status_rx.borrow()
    }

    pub fn is_monitoring_enabled(&self) -> bool {
        self.status_rx.borrow().monitoring_enabled
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_rx.clone()
    }

    /// Stop the coordinator task. Persisted state is left as is.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        rx.await.map_err(|_| CoordinatorError::Stopped)
    }
}
