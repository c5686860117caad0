use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::NotifierCfg;
use crate::types::NotificationAuthorization;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("notifications not authorized")]
    NotAuthorized,
    #[error("notification delivery failed: {0}")]
    Failed(String),
}

/// A local notification, delivered immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Platform notification service.
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// Prompt for permission. Errors count as "not granted".
    async fn request_authorization(&self) -> bool;

    async fn authorization_status(&self) -> NotificationAuthorization;

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Builds the restored notification and delivers it fire-and-forget.
pub struct NotificationDispatcher {
    service: Arc<dyn NotificationService>,
    title: String,
    body: String,
}

impl NotificationDispatcher {
    pub fn new(service: Arc<dyn NotificationService>, cfg: &NotifierCfg) -> Self {
        Self {
            service,
            title: cfg.notification_title.clone(),
            body: cfg.notification_body.clone(),
        }
    }

    pub async fn request_authorization(&self) -> bool {
        self.service.request_authorization().await
    }

    pub async fn authorization_status(&self) -> NotificationAuthorization {
        self.service.authorization_status().await
    }

    pub fn restored_notification(&self) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            title: self.title.clone(),
            body: self.body.clone(),
            created_at: Utc::now(),
        }
    }

    /// Deliver the restored notification on a separate task. Failures are
    /// logged and never retried.
    pub fn send_restored(&self) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(&self.service);
        let notification = self.restored_notification();
        tokio::spawn(async move {
            match service.deliver(&notification).await {
                Ok(()) => tracing::info!(id = %notification.id, "restored notification delivered"),
                Err(e) => tracing::warn!(id = %notification.id, error = %e, "failed to deliver restored notification"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimNotifier;

    #[tokio::test]
    async fn restored_notification_uses_configured_text() {
        let service = Arc::new(SimNotifier::granting());
        let dispatcher = NotificationDispatcher::new(service.clone(), &NotifierCfg::default());

        dispatcher.send_restored().await.unwrap();
        let delivered = service.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].title, "Back Online");
        assert_eq!(delivered[0].body, "Your internet connection has been restored.");
    }

    #[tokio::test]
    async fn each_notification_gets_fresh_id() {
        let service = Arc::new(SimNotifier::granting());
        let dispatcher = NotificationDispatcher::new(service, &NotifierCfg::default());
        let a = dispatcher.restored_notification();
        let b = dispatcher.restored_notification();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let service = Arc::new(SimNotifier::granting());
        service.fail_deliveries(true);
        let dispatcher = NotificationDispatcher::new(service.clone(), &NotifierCfg::default());

        // Task completes normally even though delivery failed.
        dispatcher.send_restored().await.unwrap();
        assert_eq!(service.attempts(), 1);
        assert!(service.delivered().is_empty());
    }

    #[tokio::test]
    async fn authorization_passthrough() {
        let service = Arc::new(SimNotifier::denying());
        let dispatcher = NotificationDispatcher::new(service, &NotifierCfg::default());
        assert!(!dispatcher.request_authorization().await);
        assert_eq!(dispatcher.authorization_status().await, NotificationAuthorization::Denied);
    }
}
