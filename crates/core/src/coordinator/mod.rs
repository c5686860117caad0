mod actor;
mod handle;

pub use actor::{Collaborators, MonitoringCoordinator};
pub use handle::{CoordinatorError, CoordinatorHandle};
