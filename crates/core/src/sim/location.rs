use std::sync::Mutex;

use crate::secondary::{LocationError, LocationService, SignalHandler};
use crate::types::LocationAuthorization;

struct State {
    status: LocationAuthorization,
    grant: LocationAuthorization,
    handler: Option<SignalHandler>,
}

/// Location service that fires signals on demand.
pub struct SimLocation {
    available: bool,
    state: Mutex<State>,
}

impl SimLocation {
    /// A service with `status`, granting "always" when asked.
    pub fn new(status: LocationAuthorization) -> Self {
        Self::with_grant(status, LocationAuthorization::AuthorizedAlways)
    }

    /// A service that moves to `grant` when authorization is requested.
    pub fn with_grant(status: LocationAuthorization, grant: LocationAuthorization) -> Self {
        Self {
            available: true,
            state: Mutex::new(State {
                status,
                grant,
                handler: None,
            }),
        }
    }

    /// A device without significant-change monitoring.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(LocationAuthorization::AuthorizedAlways)
        }
    }

    /// Deliver one movement signal. Returns whether anyone was listening.
    pub fn signal(&self) -> bool {
        let handler = self.lock().handler.clone();
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.lock().handler.is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LocationService for SimLocation {
    fn request_authorization(&self) {
        let mut state = self.lock();
        if state.status == LocationAuthorization::NotDetermined {
            state.status = state.grant;
        }
    }

    fn authorization_status(&self) -> LocationAuthorization {
        self.lock().status
    }

    fn start(&self, handler: SignalHandler) -> Result<(), LocationError> {
        if !self.available {
            return Err(LocationError::Unavailable);
        }
        let mut state = self.lock();
        if matches!(
            state.status,
            LocationAuthorization::Denied | LocationAuthorization::Restricted
        ) {
            return Err(LocationError::NotAuthorized);
        }
        state.handler = Some(handler);
        Ok(())
    }

    fn stop(&self) {
        self.lock().handler = None;
    }
}
