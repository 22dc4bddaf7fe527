mod cycle_scheduler;

pub use cycle_scheduler::{Scheduler, SchedulerSummary};
