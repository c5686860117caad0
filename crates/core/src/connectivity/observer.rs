use std::sync::Arc;

use crate::types::PathSnapshot;

/// Failure reported by the platform path observer instead of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObserveError {
    #[error("path observation not permitted")]
    PermissionDenied,
    #[error("path observer unavailable: {0}")]
    Unavailable(String),
}

/// One reading from the path observer.
pub type Observation = Result<PathSnapshot, ObserveError>;

/// Callback the observer invokes on every path change, including the initial one.
pub type PathHandler = Arc<dyn Fn(Observation) + Send + Sync>;

/// Push-based network path observer provided by the host platform.
pub trait ConnectivityObserver: Send + Sync {
    /// Begin delivering observations to `handler`, replacing any previous handler.
    fn start(&self, handler: PathHandler);

    /// Stop delivering observations. Safe to call when not started.
    fn stop(&self);

    /// Read the current path synchronously, bypassing any cached update.
    fn current_snapshot(&self) -> Observation;
}
