//! Error types for the scheduler crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ScheduleError`: Schedule validation and evaluation failures
//! - `ManagerError`: Failures reported by the metric manager
//! - `SchedulerError`: Scheduler and task lifecycle errors, wrapping the above
//! - `TaskFailure`: Runtime failures recorded on a task, never returned

use chrono::{DateTime, Utc};
use pulse_core::{PluginKey, TaskId};
use pulse_workflow::WorkflowError;
use rootcause::Report;
use std::fmt;

/// Errors from schedule operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The interval is zero.
    InvalidInterval,
    /// The window bounds are unusable.
    InvalidWindow { reason: String },
    /// The schedule could not compute its next tick.
    Evaluation { reason: String },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInterval => write!(f, "Interval must be greater than 0"),
            Self::InvalidWindow { reason } => write!(f, "invalid schedule window: {reason}"),
            Self::Evaluation { reason } => write!(f, "schedule evaluation failed: {reason}"),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Errors reported by a [`crate::MetricManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    /// A required plugin is not loaded.
    PluginNotFound { plugin: PluginKey },
    /// A requested metric is not available at the requested version.
    MetricNotFound { namespace: String, version: i32 },
    /// A dependency failed validation.
    ValidationFailed { reason: String },
    /// Reserving a dependency failed.
    SubscriptionFailed { reason: String },
    /// Collecting metrics failed.
    CollectFailed { reason: String },
    /// A processor failed.
    ProcessFailed { plugin: PluginKey, reason: String },
    /// A publisher failed.
    PublishFailed { plugin: PluginKey, reason: String },
    /// Metrics could not be encoded or decoded.
    Encoding {
        content_type: String,
        reason: String,
    },
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PluginNotFound { plugin } => write!(f, "plugin not found: {plugin}"),
            Self::MetricNotFound { namespace, version } => {
                write!(f, "metric not found: {namespace} (version {version})")
            }
            Self::ValidationFailed { reason } => {
                write!(f, "dependency validation failed: {reason}")
            }
            Self::SubscriptionFailed { reason } => write!(f, "subscription failed: {reason}"),
            Self::CollectFailed { reason } => write!(f, "collect failed: {reason}"),
            Self::ProcessFailed { plugin, reason } => {
                write!(f, "processor {plugin} failed: {reason}")
            }
            Self::PublishFailed { plugin, reason } => {
                write!(f, "publisher {plugin} failed: {reason}")
            }
            Self::Encoding {
                content_type,
                reason,
            } => write!(f, "cannot encode {content_type}: {reason}"),
        }
    }
}

impl std::error::Error for ManagerError {}

/// Scheduler and task lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler is not running.
    NotStarted,
    /// The scheduler is already running.
    AlreadyStarted,
    /// No metric manager has been installed.
    MetricManagerNotSet,
    /// A task was started outside a tokio runtime.
    NoRuntime,
    /// No task with this ID is registered.
    TaskNotFound { id: TaskId },
    /// A task with this ID is already registered.
    TaskAlreadyExists { id: TaskId },
    /// The task cannot perform the operation in its current state.
    InvalidTaskState {
        id: TaskId,
        state: String,
        operation: &'static str,
    },
    /// The schedule failed its own validation.
    InvalidSchedule(ScheduleError),
    /// The workflow map is invalid or could not be compiled.
    Workflow(WorkflowError),
    /// The metric manager rejected a dependency.
    Dependency(ManagerError),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "scheduler is not started"),
            Self::AlreadyStarted => write!(f, "scheduler is already started"),
            Self::MetricManagerNotSet => write!(f, "metric manager is not set"),
            Self::NoRuntime => write!(f, "no tokio runtime to run the task on"),
            Self::TaskNotFound { id } => write!(f, "task not found: {id}"),
            Self::TaskAlreadyExists { id } => write!(f, "task already exists: {id}"),
            Self::InvalidTaskState {
                id,
                state,
                operation,
            } => write!(f, "cannot {operation} task {id} while {state}"),
            Self::InvalidSchedule(error) => error.fmt(f),
            Self::Workflow(error) => error.fmt(f),
            Self::Dependency(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<ScheduleError> for SchedulerError {
    fn from(error: ScheduleError) -> Self {
        Self::InvalidSchedule(error)
    }
}

impl From<WorkflowError> for SchedulerError {
    fn from(error: WorkflowError) -> Self {
        Self::Workflow(error)
    }
}

impl From<ManagerError> for SchedulerError {
    fn from(error: ManagerError) -> Self {
        Self::Dependency(error)
    }
}

/// Every error found while validating a task operation.
///
/// Never empty when returned as an error.
#[derive(Debug)]
pub struct TaskErrors(Vec<Report<SchedulerError>>);

impl TaskErrors {
    pub(crate) fn new() -> Self {
        Self(Vec::new())
    }

    pub(crate) fn push(&mut self, error: impl Into<SchedulerError>) {
        let error: SchedulerError = error.into();
        self.0.push(error.into());
    }

    pub(crate) fn extend<E: Into<SchedulerError>>(&mut self, errors: impl IntoIterator<Item = E>) {
        for error in errors {
            self.push(error);
        }
    }

    /// Returns the individual error reports in the order they were found.
    #[must_use]
    pub fn errors(&self) -> &[Report<SchedulerError>] {
        &self.0
    }

    /// Returns the number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no error was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the error contexts in the order they were found.
    pub fn contexts(&self) -> impl Iterator<Item = &SchedulerError> {
        self.0.iter().map(|report| report.current_context())
    }
}

impl From<SchedulerError> for TaskErrors {
    fn from(error: SchedulerError) -> Self {
        let mut errors = Self::new();
        errors.push(error);
        errors
    }
}

impl fmt::Display for TaskErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut contexts = self.contexts();
        if let Some(first) = contexts.next() {
            write!(f, "{first}")?;
        }
        for context in contexts {
            write!(f, "; {context}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TaskErrors {}

/// A runtime failure recorded on a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The schedule reported an error instead of a tick.
    Schedule(ScheduleError),
    /// Collecting metrics failed.
    Collect(Vec<ManagerError>),
    /// A process or publish stage failed.
    Stage {
        plugin: PluginKey,
        errors: Vec<ManagerError>,
    },
    /// The fire cycle ran past its deadline.
    DeadlineExceeded { deadline: DateTime<Utc> },
    /// Several independent stages failed in one cycle.
    Multiple(Vec<TaskFailure>),
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule(error) => write!(f, "schedule error: {error}"),
            Self::Collect(errors) => {
                write!(f, "collect failed: ")?;
                write_list(f, errors)
            }
            Self::Stage { plugin, errors } => {
                write!(f, "stage {plugin} failed: ")?;
                write_list(f, errors)
            }
            Self::DeadlineExceeded { deadline } => {
                write!(f, "deadline exceeded at {}", deadline.to_rfc3339())
            }
            Self::Multiple(failures) => write_list(f, failures),
        }
    }
}

impl std::error::Error for TaskFailure {}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "; ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
