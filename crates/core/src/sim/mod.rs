//! In-process stand-ins for the platform collaborators. The interactive host
//! drives the coordinator with these, and the tests use them as fakes.

mod location;
mod notifier;
mod observer;
mod wake;

pub use location::SimLocation;
pub use notifier::SimNotifier;
pub use observer::SimObserver;
pub use wake::SimWakeBackend;
