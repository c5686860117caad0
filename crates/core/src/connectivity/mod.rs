mod monitor;
mod observer;

pub use monitor::{ConnectivityMonitor, ConnectivityState, RestoredReceiver, Transition};
pub use observer::{ConnectivityObserver, Observation, ObserveError, PathHandler};
