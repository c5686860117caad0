mod scheduler;
mod task;

pub use scheduler::{ScheduleError, WakeBackend, WakeHandler, WakeRequest, WakeScheduler, WAKE_IDENTIFIER};
pub use task::{TaskOutcome, WakeTask};
