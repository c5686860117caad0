use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::notify::{DeliveryError, Notification, NotificationService};
use crate::types::NotificationAuthorization;

/// Notification service that records deliveries and optionally echoes them.
pub struct SimNotifier {
    grant: bool,
    status: Mutex<NotificationAuthorization>,
    delivered: Mutex<Vec<Notification>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
    echo: bool,
}

impl SimNotifier {
    fn with(grant: bool, echo: bool) -> Self {
        Self {
            grant,
            status: Mutex::new(NotificationAuthorization::NotDetermined),
            delivered: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            echo,
        }
    }

    /// Grants permission when asked.
    pub fn granting() -> Self {
        Self::with(true, false)
    }

    /// Denies permission when asked. Deliveries are still recorded.
    pub fn denying() -> Self {
        Self::with(false, false)
    }

    /// Grants permission and prints every delivered notification.
    pub fn console() -> Self {
        Self::with(true, true)
    }

    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NotificationService for SimNotifier {
    async fn request_authorization(&self) -> bool {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if *status == NotificationAuthorization::NotDetermined {
            *status = if self.grant {
                NotificationAuthorization::Authorized
            } else {
                NotificationAuthorization::Denied
            };
        }
        status.is_authorized()
    }

    async fn authorization_status(&self) -> NotificationAuthorization {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeliveryError::Failed("simulated failure".into()));
        }
        if self.echo {
            println!("\n[notification] {}: {}", notification.title, notification.body);
        }
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
        Ok(())
    }
}
