use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the network path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSnapshot {
    pub connected: bool,
}

/// Emitted once per detected offline → online transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restored {
    pub at: DateTime<Utc>,
}

/// Notification permission state as reported by the notification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotificationAuthorization {
    #[default]
    NotDetermined,
    Denied,
    Authorized,
    Provisional,
    Ephemeral,
}

impl NotificationAuthorization {
    /// Only a full grant counts as "notifications authorized" for display.
    pub fn is_authorized(self) -> bool {
        matches!(self, Self::Authorized)
    }
}

/// Location permission state as reported by the location service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LocationAuthorization {
    #[default]
    NotDetermined,
    Restricted,
    Denied,
    AuthorizedAlways,
    AuthorizedWhenInUse,
}

impl LocationAuthorization {
    /// Background location wakes need the "always" grant.
    pub fn allows_background(self) -> bool {
        matches!(self, Self::AuthorizedAlways)
    }
}

/// Snapshot of coordinator state, broadcast on every change for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub monitoring_enabled: bool,
    pub is_connected: bool,
    pub location_auth: LocationAuthorization,
    pub notifications_authorized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_full_grant_counts_as_authorized() {
        assert!(NotificationAuthorization::Authorized.is_authorized());
        assert!(!NotificationAuthorization::Provisional.is_authorized());
        assert!(!NotificationAuthorization::Ephemeral.is_authorized());
        assert!(!NotificationAuthorization::Denied.is_authorized());
        assert!(!NotificationAuthorization::NotDetermined.is_authorized());
    }

    #[test]
    fn background_location_requires_always() {
        assert!(LocationAuthorization::AuthorizedAlways.allows_background());
        assert!(!LocationAuthorization::AuthorizedWhenInUse.allows_background());
        assert!(!LocationAuthorization::Denied.allows_background());
    }

    #[test]
    fn status_default_is_disabled_offline() {
        let s = MonitorStatus::default();
        assert!(!s.monitoring_enabled);
        assert!(!s.is_connected);
        assert_eq!(s.location_auth, LocationAuthorization::NotDetermined);
        assert!(!s.notifications_authorized);
    }

    #[test]
    fn status_serializes_to_json() {
        let s = MonitorStatus {
            monitoring_enabled: true,
            is_connected: true,
            location_auth: LocationAuthorization::AuthorizedAlways,
            notifications_authorized: true,
        };
        let json = serde_json::to_value(s).unwrap();
        assert_eq!(json["monitoring_enabled"], true);
        assert_eq!(json["location_auth"], "AuthorizedAlways");
    }
}
