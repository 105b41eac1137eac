//! Tasks: a compiled pipeline driven by a schedule.
//!
//! A started task owns one spawned loop. The loop waits on the schedule or
//! a stop signal, fires the pipeline on every active tick and applies the
//! failure policy. Cycles of one task never overlap.

use crate::error::{ScheduleError, SchedulerError, TaskErrors, TaskFailure};
use crate::execution::{Deadline, fire};
use crate::manager::MetricManager;
use crate::schedule::{Schedule, ScheduleState};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pulse_core::{SubscribedPlugin, TaskId};
use pulse_workflow::Pipeline;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Deadline of a fire cycle when none is configured.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Consecutive failures that disable a task when none is configured.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 10;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Not firing. Can be started.
    Stopped,
    /// The loop is running.
    Running,
    /// A stop was requested; the loop exits after the current cycle.
    Stopping,
    /// The schedule finished. Terminal.
    Ended,
    /// The failure policy tripped. Only [`crate::Scheduler::enable_task`] leaves it.
    Disabled,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Ended => "ended",
            Self::Disabled => "disabled",
        };
        f.write_str(state)
    }
}

/// Per-task settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSettings {
    /// Time budget of one fire cycle.
    pub deadline: Duration,
    /// Consecutive failures before the task is disabled. Zero never disables.
    pub failure_threshold: u32,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

/// A reversible change to a task's settings.
///
/// Applying an option returns the option that restores the previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOption {
    /// Sets the fire cycle deadline.
    Deadline(Duration),
    /// Sets the consecutive-failure threshold.
    FailureThreshold(u32),
}

impl TaskOption {
    /// Applies the option and returns its inverse.
    pub fn apply(self, settings: &mut TaskSettings) -> TaskOption {
        match self {
            Self::Deadline(deadline) => {
                Self::Deadline(std::mem::replace(&mut settings.deadline, deadline))
            }
            Self::FailureThreshold(threshold) => Self::FailureThreshold(std::mem::replace(
                &mut settings.failure_threshold,
                threshold,
            )),
        }
    }
}

/// When and why a task last failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub failure: TaskFailure,
    pub at: DateTime<Utc>,
}

/// Accumulated task statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Fire cycles started.
    pub hit_count: u64,
    /// Intervals the schedule reported as missed.
    pub missed_intervals: u64,
    /// Failed cycles and schedule errors.
    pub failed_count: u64,
    /// Failures since the last successful cycle.
    pub consecutive_failures: u32,
    pub last_fire_time: Option<DateTime<Utc>>,
    pub last_failure: Option<FailureRecord>,
}

struct Runtime {
    state: TaskState,
    stats: TaskStats,
    stop_tx: Option<watch::Sender<bool>>,
}

/// A scheduled workflow.
pub struct Task {
    id: TaskId,
    created_at: DateTime<Utc>,
    pipeline: Pipeline,
    plugins: Vec<SubscribedPlugin>,
    schedule: Box<dyn Schedule>,
    manager: Arc<dyn MetricManager>,
    settings: Mutex<TaskSettings>,
    runtime: Mutex<Runtime>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("state", &self.state())
            .field("settings", &self.settings())
            .finish_non_exhaustive()
    }
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        pipeline: Pipeline,
        schedule: Box<dyn Schedule>,
        manager: Arc<dyn MetricManager>,
        settings: TaskSettings,
    ) -> Self {
        let plugins = pipeline.plugins();
        Self {
            id,
            created_at: Utc::now(),
            pipeline,
            plugins,
            schedule,
            manager,
            settings: Mutex::new(settings),
            runtime: Mutex::new(Runtime {
                state: TaskState::Stopped,
                stats: TaskStats::default(),
                stop_tx: None,
            }),
        }
    }

    /// Returns the task's ID, unique within its scheduler.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the compiled pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.runtime.lock().state
    }

    /// Returns a snapshot of the task's statistics.
    #[must_use]
    pub fn stats(&self) -> TaskStats {
        self.runtime.lock().stats.clone()
    }

    /// Returns a copy of the current settings.
    #[must_use]
    pub fn settings(&self) -> TaskSettings {
        *self.settings.lock()
    }

    /// Returns the deadline applied to each fire cycle.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.settings.lock().deadline
    }

    /// Applies an option and returns the option that reverses it.
    ///
    /// Takes effect from the next fire cycle.
    pub fn apply_option(&self, option: TaskOption) -> TaskOption {
        option.apply(&mut self.settings.lock())
    }

    fn invalid_state(&self, state: TaskState, operation: &'static str) -> SchedulerError {
        SchedulerError::InvalidTaskState {
            id: self.id,
            state: state.to_string(),
            operation,
        }
    }

    /// Subscribes the task's dependencies and spawns its loop on the
    /// current tokio runtime.
    pub(crate) fn start(self: &Arc<Self>) -> Result<(), TaskErrors> {
        let state = self.state();
        if state != TaskState::Stopped {
            return Err(self.invalid_state(state, "start").into());
        }
        let handle = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let errors = self
            .manager
            .subscribe_deps(self.id, self.pipeline.metrics(), &self.plugins);
        if !errors.is_empty() {
            let mut task_errors = TaskErrors::new();
            task_errors.extend(errors);
            return Err(task_errors);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        {
            let mut runtime = self.runtime.lock();
            if runtime.state != TaskState::Stopped {
                let state = runtime.state;
                drop(runtime);
                self.unsubscribe();
                return Err(self.invalid_state(state, "start").into());
            }
            runtime.state = TaskState::Running;
            runtime.stop_tx = Some(stop_tx);
        }

        let task = Arc::clone(self);
        handle.spawn(async move { task.run(stop_rx).await });
        info!(task_id = %self.id, "task started");
        Ok(())
    }

    /// Signals the loop to exit after the current cycle.
    pub(crate) fn stop(&self) -> Result<(), Report<SchedulerError>> {
        let mut runtime = self.runtime.lock();
        if runtime.state != TaskState::Running {
            return Err(self.invalid_state(runtime.state, "stop").into());
        }
        if let Some(stop_tx) = runtime.stop_tx.take() {
            // The loop may already be gone; nothing to signal then.
            let _ = stop_tx.send(true);
        }
        runtime.state = TaskState::Stopping;
        info!(task_id = %self.id, "task stopping");
        Ok(())
    }

    /// Moves a disabled task back to `Stopped` and clears its failure streak.
    pub(crate) fn enable(&self) -> Result<(), Report<SchedulerError>> {
        let mut runtime = self.runtime.lock();
        if runtime.state != TaskState::Disabled {
            return Err(self.invalid_state(runtime.state, "enable").into());
        }
        runtime.state = TaskState::Stopped;
        runtime.stats.consecutive_failures = 0;
        info!(task_id = %self.id, "task enabled");
        Ok(())
    }

    #[instrument(skip_all, fields(task_id = %self.id))]
    async fn run(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        let final_state = self.drive(&mut stop_rx).await;
        self.unsubscribe();

        let mut runtime = self.runtime.lock();
        runtime.state = final_state;
        runtime.stop_tx = None;
        info!(state = %final_state, "task loop exited");
    }

    /// Fires until stopped, ended or disabled, and returns the state to settle in.
    async fn drive(&self, stop_rx: &mut watch::Receiver<bool>) -> TaskState {
        let mut last = None;
        loop {
            let response = tokio::select! {
                biased;
                _ = stop_rx.changed() => return TaskState::Stopped,
                response = self.schedule.wait(last) => response,
            };
            last = Some(response.last_time());

            match response.state() {
                ScheduleState::Ended => return TaskState::Ended,
                ScheduleState::Error => {
                    let error = response.schedule_error().cloned().unwrap_or_else(|| {
                        ScheduleError::Evaluation {
                            reason: "schedule reported an error".to_string(),
                        }
                    });
                    if self.record_failure(TaskFailure::Schedule(error)) {
                        return TaskState::Disabled;
                    }
                }
                ScheduleState::Active => {
                    self.record_fire(response.missed_intervals());
                    let deadline = Deadline::after(self.deadline());
                    match fire(&self.pipeline, self.manager.as_ref(), deadline).await {
                        Ok(()) => self.record_success(),
                        Err(failure) => {
                            if self.record_failure(failure) {
                                return TaskState::Disabled;
                            }
                        }
                    }
                }
            }
        }
    }

    fn record_fire(&self, missed: u64) {
        let mut runtime = self.runtime.lock();
        runtime.stats.hit_count += 1;
        runtime.stats.missed_intervals += missed;
        runtime.stats.last_fire_time = Some(Utc::now());
        debug!(
            hit_count = runtime.stats.hit_count,
            missed, "firing pipeline"
        );
    }

    fn record_success(&self) {
        self.runtime.lock().stats.consecutive_failures = 0;
    }

    /// Records a failure and returns true if the task must be disabled.
    fn record_failure(&self, failure: TaskFailure) -> bool {
        let threshold = self.settings.lock().failure_threshold;
        let mut runtime = self.runtime.lock();
        let stats = &mut runtime.stats;
        stats.failed_count += 1;
        stats.consecutive_failures += 1;
        warn!(
            consecutive_failures = stats.consecutive_failures,
            error = %failure,
            "fire cycle failed"
        );
        stats.last_failure = Some(FailureRecord {
            failure,
            at: Utc::now(),
        });

        let disable = threshold > 0 && stats.consecutive_failures >= threshold;
        if disable {
            warn!(threshold, "failure threshold reached, disabling task");
        }
        disable
    }

    fn unsubscribe(&self) {
        let errors = self
            .manager
            .unsubscribe_deps(self.id, self.pipeline.metrics(), &self.plugins);
        for error in errors {
            warn!(task_id = %self.id, %error, "failed to release dependency");
        }
    }
}
