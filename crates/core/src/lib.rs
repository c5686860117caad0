//! Connectivity-transition coordinator: detects offline → online transitions
//! across intermittent process wakes and emits exactly one "restored"
//! notification per transition.

pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod notify;
pub mod secondary;
pub mod sim;
pub mod store;
pub mod types;
pub mod wake;
