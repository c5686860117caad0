//! Best-effort auxiliary wake source driven by coarse location changes.
//! Nothing depends on it firing; the periodic wake is the guaranteed path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::LocationAuthorization;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("significant location change monitoring unavailable")]
    Unavailable,
    #[error("location access not authorized")]
    NotAuthorized,
}

/// Invoked on every "something changed, worth rechecking" signal.
pub type SignalHandler = Arc<dyn Fn() + Send + Sync>;

/// Platform location service.
pub trait LocationService: Send + Sync {
    /// Ask for background location access. Fire-and-forget.
    fn request_authorization(&self);

    fn authorization_status(&self) -> LocationAuthorization;

    fn start(&self, handler: SignalHandler) -> Result<(), LocationError>;

    /// Safe to call when not started.
    fn stop(&self);
}

pub struct SecondaryWakeSource {
    service: Arc<dyn LocationService>,
    active: AtomicBool,
}

impl SecondaryWakeSource {
    pub fn new(service: Arc<dyn LocationService>) -> Self {
        Self {
            service,
            active: AtomicBool::new(false),
        }
    }

    pub fn request_authorization(&self) {
        self.service.request_authorization();
    }

    pub fn authorization_status(&self) -> LocationAuthorization {
        self.service.authorization_status()
    }

    /// Start delivering signals to `handler`. Failure degrades to a source
    /// that never fires. Returns whether the source is active.
    pub fn start(&self, handler: SignalHandler) -> bool {
        if self.active.swap(false, Ordering::SeqCst) {
            self.service.stop();
        }
        match self.service.start(handler) {
            Ok(()) => {
                self.active.store(true, Ordering::SeqCst);
                let status = self.service.authorization_status();
                if status.allows_background() {
                    tracing::info!("location wake source started");
                } else {
                    tracing::info!(?status, "location wake source started, foreground only");
                }
                true
            }
            Err(e) => {
                tracing::info!(error = %e, "location wake source unavailable");
                false
            }
        }
    }

    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.service.stop();
            tracing::info!("location wake source stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
