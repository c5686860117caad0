//! End-to-end coordinator tests against the simulated platform:
//! lifecycle → coordinator → monitor → restoration → notification.

use std::sync::Arc;
use std::time::Duration;

use notifier_core::config::NotifierCfg;
use notifier_core::connectivity::Transition;
use notifier_core::coordinator::{Collaborators, CoordinatorHandle, MonitoringCoordinator};
use notifier_core::sim::{SimLocation, SimNotifier, SimObserver, SimWakeBackend};
use notifier_core::store::{FileFlagStore, FlagStore, MemoryFlagStore, MONITORING_ENABLED, WAS_CONNECTED};
use notifier_core::types::LocationAuthorization;

struct Platform {
    store: Arc<dyn FlagStore>,
    observer: Arc<SimObserver>,
    notifier: Arc<SimNotifier>,
    location: Arc<SimLocation>,
    wake: Arc<SimWakeBackend>,
}

impl Platform {
    fn new(store: Arc<dyn FlagStore>, connected: bool) -> Self {
        Self {
            store,
            observer: Arc::new(SimObserver::new(connected)),
            notifier: Arc::new(SimNotifier::granting()),
            location: Arc::new(SimLocation::new(LocationAuthorization::NotDetermined)),
            wake: Arc::new(SimWakeBackend::new()),
        }
    }

    fn spawn(&self) -> CoordinatorHandle {
        MonitoringCoordinator::spawn(
            &NotifierCfg::default(),
            Collaborators {
                store: self.store.clone(),
                observer: self.observer.clone(),
                notifications: self.notifier.clone(),
                location: self.location.clone(),
                wake: self.wake.clone(),
            },
        )
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test]
async fn flag_round_trips_through_reconstruction() {
    let store: Arc<dyn FlagStore> = Arc::new(MemoryFlagStore::new());

    let p = Platform::new(store.clone(), true);
    let handle = p.spawn();
    assert!(!handle.is_monitoring_enabled());
    handle.enable().await.unwrap();
    handle.shutdown();

    let p = Platform::new(store.clone(), true);
    let handle = p.spawn();
    assert!(handle.is_monitoring_enabled());
    handle.disable().await.unwrap();
    handle.shutdown();

    let p = Platform::new(store.clone(), true);
    let handle = p.spawn();
    assert!(!handle.is_monitoring_enabled());
    handle.shutdown();
}

#[tokio::test]
async fn flag_persists_immediately_in_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flags.json");
    let store: Arc<dyn FlagStore> = Arc::new(FileFlagStore::open(&path).unwrap());
    let p = Platform::new(store, true);
    let handle = p.spawn();

    handle.enable().await.unwrap();
    let reopened = FileFlagStore::open(&path).unwrap();
    assert_eq!(reopened.get(MONITORING_ENABLED).unwrap(), Some(true));

    handle.disable().await.unwrap();
    let reopened = FileFlagStore::open(&path).unwrap();
    assert_eq!(reopened.get(MONITORING_ENABLED).unwrap(), Some(false));
    handle.shutdown();
}

#[tokio::test]
async fn restored_state_resumes_monitoring_on_launch() {
    let store: Arc<dyn FlagStore> = Arc::new(MemoryFlagStore::new());
    store.set(MONITORING_ENABLED, true).unwrap();
    let p = Platform::new(store, true);
    let handle = p.spawn();
    settle().await;

    assert!(handle.is_monitoring_enabled());
    assert!(p.observer.is_observing());
    handle.shutdown();
}

#[tokio::test]
async fn toggle_is_symmetric_and_visible_on_return() {
    let p = Platform::new(Arc::new(MemoryFlagStore::new()), true);
    let handle = p.spawn();

    assert!(handle.toggle().await.unwrap());
    assert!(handle.is_monitoring_enabled());
    assert_eq!(p.store.get(MONITORING_ENABLED).unwrap(), Some(true));

    assert!(!handle.toggle().await.unwrap());
    assert!(!handle.is_monitoring_enabled());
    assert_eq!(p.store.get(MONITORING_ENABLED).unwrap(), Some(false));
    handle.shutdown();
}

#[tokio::test]
async fn concurrent_toggles_never_interleave() {
    let p = Platform::new(Arc::new(MemoryFlagStore::new()), true);
    let handle = p.spawn();

    let a = handle.clone();
    let b = handle.clone();
    let (ra, rb) = tokio::join!(a.toggle(), b.toggle());
    let mut results = vec![ra.unwrap(), rb.unwrap()];
    results.sort();
    // One call enabled, the other disabled; never two enables.
    assert_eq!(results, vec![false, true]);
    assert!(!handle.is_monitoring_enabled());
    assert!(!p.observer.is_observing());
    handle.shutdown();
}

#[tokio::test]
async fn restoration_sends_one_notification() {
    let p = Platform::new(Arc::new(MemoryFlagStore::new()), false);
    let handle = p.spawn();
    handle.enable().await.unwrap();
    settle().await;

    p.observer.set_connected(true);
    p.observer.set_connected(true);
    settle().await;

    assert_eq!(p.notifier.delivered().len(), 1);
    assert!(handle.status().is_connected);
    assert_eq!(p.store.get(WAS_CONNECTED).unwrap(), Some(true));
    handle.shutdown();
}

#[tokio::test]
async fn notification_fires_per_transition() {
    let p = Platform::new(Arc::new(MemoryFlagStore::new()), false);
    let handle = p.spawn();
    handle.enable().await.unwrap();

    for connected in [false, false, true, true, false, true] {
        p.observer.set_snapshot(connected);
        handle.check_now().await.unwrap();
    }
    settle().await;

    assert_eq!(p.notifier.delivered().len(), 2);
    handle.shutdown();
}

#[tokio::test]
async fn disabled_monitoring_gates_delivery() {
    let p = Platform::new(Arc::new(MemoryFlagStore::new()), false);
    let handle = p.spawn();
    handle.enable().await.unwrap();
    settle().await;

    handle.disable().await.unwrap();
    p.observer.set_snapshot(true);
    assert_eq!(handle.check_now().await.unwrap(), Transition::Restored);
    settle().await;

    assert_eq!(p.notifier.attempts(), 0);
    // The transition is still recorded.
    assert_eq!(p.store.get(WAS_CONNECTED).unwrap(), Some(true));
    handle.shutdown();
}

#[tokio::test]
async fn delivery_failure_keeps_transition_recorded() {
    let p = Platform::new(Arc::new(MemoryFlagStore::new()), false);
    p.notifier.fail_deliveries(true);
    let handle = p.spawn();
    handle.enable().await.unwrap();

    p.observer.set_snapshot(true);
    assert_eq!(handle.check_now().await.unwrap(), Transition::Restored);
    settle().await;
    assert_eq!(p.notifier.attempts(), 1);

    // No retry on the next check.
    assert_eq!(handle.check_now().await.unwrap(), Transition::Steady);
    settle().await;
    assert_eq!(p.notifier.attempts(), 1);
    handle.shutdown();
}

#[tokio::test]
async fn foreground_checks_when_enabled() {
    let p = Platform::new(Arc::new(MemoryFlagStore::new()), false);
    let handle = p.spawn();
    handle.enable().await.unwrap();
    settle().await;

    // Changed while suspended; the observer never fired.
    p.observer.set_snapshot(true);
    handle.enter_foreground().await.unwrap();
    settle().await;

    assert!(handle.status().is_connected);
    assert!(handle.status().notifications_authorized);
    assert_eq!(p.notifier.delivered().len(), 1);
    handle.shutdown();
}

#[tokio::test]
async fn foreground_skips_check_when_disabled() {
    let p = Platform::new(Arc::new(MemoryFlagStore::new()), false);
    let handle = p.spawn();

    p.observer.set_snapshot(true);
    handle.enter_foreground().await.unwrap();

    assert!(!handle.status().is_connected);
    assert_eq!(p.store.get(WAS_CONNECTED).unwrap(), None);
    handle.shutdown();
}

#[tokio::test]
async fn location_signal_runs_a_check() {
    let p = Platform::new(Arc::new(MemoryFlagStore::new()), false);
    let handle = p.spawn();
    handle.enable().await.unwrap();
    settle().await;

    p.observer.set_snapshot(true);
    assert!(p.location.signal());
    settle().await;

    assert!(handle.status().is_connected);
    assert_eq!(p.notifier.delivered().len(), 1);
    handle.shutdown();
}

#[tokio::test]
async fn missing_location_source_does_not_affect_monitoring() {
    let mut p = Platform::new(Arc::new(MemoryFlagStore::new()), false);
    p.location = Arc::new(SimLocation::unavailable());
    let handle = p.spawn();
    handle.enable().await.unwrap();
    settle().await;

    p.observer.set_connected(true);
    settle().await;
    assert_eq!(p.notifier.delivered().len(), 1);
    handle.shutdown();
}

#[tokio::test]
async fn shutdown_stops_observation_but_keeps_flag() {
    let p = Platform::new(Arc::new(MemoryFlagStore::new()), true);
    let handle = p.spawn();
    handle.enable().await.unwrap();

    handle.shutdown();
    settle().await;

    assert!(!p.observer.is_observing());
    assert_eq!(p.store.get(MONITORING_ENABLED).unwrap(), Some(true));
    assert!(handle.toggle().await.is_err());
}
