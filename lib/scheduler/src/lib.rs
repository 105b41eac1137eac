//! Task scheduler for pulse workflows.
//!
//! This crate provides:
//!
//! - **Scheduler**: the task registry and its start/stop lifecycle
//! - **Tasks**: a compiled pipeline fired by a schedule, with deadline and
//!   failure policy
//! - **Schedules**: fixed-interval and windowed tick sources
//! - **Metric Manager**: the capability tasks collect, process and publish through

pub mod config;
pub mod error;
mod execution;
pub mod manager;
mod registry;
pub mod schedule;
pub mod scheduler;
pub mod task;

#[cfg(test)]
mod test_support;

pub use config::SchedulerConfig;
pub use error::{ManagerError, ScheduleError, SchedulerError, TaskErrors, TaskFailure};
pub use manager::MetricManager;
pub use schedule::{Schedule, ScheduleResponse, ScheduleState, SimpleSchedule, WindowedSchedule};
pub use scheduler::{Scheduler, SchedulerState};
pub use task::{
    DEFAULT_DEADLINE, DEFAULT_FAILURE_THRESHOLD, FailureRecord, Task, TaskOption, TaskSettings,
    TaskState, TaskStats,
};
