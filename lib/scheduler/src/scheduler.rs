//! The scheduler: task registry and lifecycle.

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, TaskErrors};
use crate::manager::MetricManager;
use crate::registry::TaskRegistry;
use crate::schedule::Schedule;
use crate::task::{Task, TaskOption, TaskSettings, TaskState};
use parking_lot::RwLock;
use pulse_core::{Result, TaskId};
use pulse_workflow::{WorkflowMap, compile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, instrument, warn};

/// Global scheduler state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Tasks cannot be created or started.
    #[default]
    Stopped,
    /// Tasks can be created and fire.
    Running,
}

/// Owns every task and the metric manager they share.
#[derive(Default)]
pub struct Scheduler {
    config: SchedulerConfig,
    state: RwLock<SchedulerState>,
    metric_manager: Option<Arc<dyn MetricManager>>,
    tasks: TaskRegistry,
    next_id: AtomicU64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("metric_manager", &self.metric_manager.is_some())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl Scheduler {
    /// Creates a stopped scheduler.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    /// Installs the metric manager. Must happen before [`Self::start`].
    pub fn set_metric_manager(&mut self, manager: Arc<dyn MetricManager>) {
        self.metric_manager = Some(manager);
    }

    #[must_use]
    pub fn metric_manager(&self) -> Option<&Arc<dyn MetricManager>> {
        self.metric_manager.as_ref()
    }

    /// Moves the scheduler to `Running`.
    ///
    /// # Errors
    ///
    /// Returns an error if no metric manager is installed or the scheduler
    /// is already running.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.metric_manager.is_none() {
            return Err(SchedulerError::MetricManagerNotSet.into());
        }
        let mut state = self.state.write();
        if *state == SchedulerState::Running {
            return Err(SchedulerError::AlreadyStarted.into());
        }
        *state = SchedulerState::Running;
        info!("scheduler started");
        Ok(())
    }

    /// Moves the scheduler to `Stopped` and signals every running task.
    ///
    /// Cycles in flight run to completion; their loops exit afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler is not running.
    #[instrument(skip(self))]
    pub fn stop(&self) -> Result<(), SchedulerError> {
        {
            let mut state = self.state.write();
            if *state != SchedulerState::Running {
                return Err(SchedulerError::NotStarted.into());
            }
            *state = SchedulerState::Stopped;
        }

        for task in self.tasks.snapshot().into_values() {
            if task.state() == TaskState::Running
                && let Err(error) = task.stop()
            {
                warn!(task_id = %task.id(), %error, "failed to stop task");
            }
        }
        info!("scheduler stopped");
        Ok(())
    }

    fn ensure_running(&self) -> std::result::Result<Arc<dyn MetricManager>, SchedulerError> {
        if self.state() != SchedulerState::Running {
            return Err(SchedulerError::NotStarted);
        }
        self.metric_manager
            .clone()
            .ok_or(SchedulerError::MetricManagerNotSet)
    }

    /// Validates and compiles a workflow map into a new task.
    ///
    /// Options are applied in order, so later options win. When
    /// `start_on_create` is set the task starts firing immediately.
    ///
    /// # Errors
    ///
    /// Returns every problem found. Nothing is registered on error.
    #[instrument(skip_all, fields(start_on_create = start_on_create))]
    pub fn create_task(
        &self,
        schedule: Box<dyn Schedule>,
        map: &WorkflowMap,
        start_on_create: bool,
        options: &[TaskOption],
    ) -> std::result::Result<Arc<Task>, TaskErrors> {
        let manager = self.ensure_running()?;

        schedule
            .validate()
            .map_err(|error| TaskErrors::from(SchedulerError::from(error)))?;

        let mut errors = TaskErrors::new();
        errors.extend(map.validate());
        errors.extend(manager.validate_deps(&map.valid_metrics(), &map.plugins()));
        if !errors.is_empty() {
            warn!(errors = errors.len(), "workflow rejected");
            return Err(errors);
        }

        let pipeline = compile(map, manager.as_ref()).map_err(|compile_errors| {
            let mut errors = TaskErrors::new();
            errors.extend(compile_errors);
            errors
        })?;

        let mut settings = TaskSettings {
            deadline: self.config.default_deadline(),
            failure_threshold: self.config.failure_threshold,
        };
        for option in options {
            option.apply(&mut settings);
        }

        let id = TaskId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let task = Arc::new(Task::new(id, pipeline, schedule, manager, settings));

        // Held until the task is registered and started so a concurrent stop
        // either rejects this task or sees it in its snapshot.
        let state = self.state.read();
        if *state != SchedulerState::Running {
            return Err(SchedulerError::NotStarted.into());
        }
        self.tasks.add(Arc::clone(&task))?;
        info!(task_id = %id, stages = task.pipeline().stage_count(), "task created");

        if start_on_create
            && let Err(errors) = task.start()
        {
            if let Err(error) = self.tasks.remove_if(id, |_| Ok(())) {
                warn!(task_id = %id, %error, "failed to unregister task");
            }
            return Err(errors);
        }
        drop(state);
        Ok(task)
    }

    /// Returns a registered task.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if no task has this ID.
    pub fn get_task(&self, id: TaskId) -> Result<Arc<Task>, SchedulerError> {
        self.tasks
            .get(id)
            .ok_or_else(|| SchedulerError::TaskNotFound { id }.into())
    }

    /// Returns a snapshot of every registered task.
    #[must_use]
    pub fn get_tasks(&self) -> HashMap<TaskId, Arc<Task>> {
        self.tasks.snapshot()
    }

    /// Subscribes a stopped task's dependencies and starts its loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler is not running, the task is unknown
    /// or not stopped, or its dependencies cannot be subscribed.
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn start_task(&self, id: TaskId) -> std::result::Result<(), TaskErrors> {
        let state = self.state.read();
        if *state != SchedulerState::Running {
            return Err(SchedulerError::NotStarted.into());
        }
        let task = self
            .tasks
            .get(id)
            .ok_or(SchedulerError::TaskNotFound { id })?;
        task.start()
    }

    /// Stops a running task after its current cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is unknown or not running.
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn stop_task(&self, id: TaskId) -> Result<(), SchedulerError> {
        self.get_task(id)?.stop()
    }

    /// Re-enables a disabled task. It stays stopped until started.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is unknown or not disabled.
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn enable_task(&self, id: TaskId) -> Result<(), SchedulerError> {
        self.get_task(id)?.enable()
    }

    /// Removes a task that is not running.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is unknown, running or stopping.
    #[instrument(skip(self), fields(task_id = %id))]
    pub fn remove_task(&self, id: TaskId) -> Result<Arc<Task>, SchedulerError> {
        let task = self.tasks.remove_if(id, |task| match task.state() {
            state @ (TaskState::Running | TaskState::Stopping) => {
                Err(SchedulerError::InvalidTaskState {
                    id,
                    state: state.to_string(),
                    operation: "remove",
                })
            }
            _ => Ok(()),
        })?;
        info!("task removed");
        Ok(task)
    }
}
