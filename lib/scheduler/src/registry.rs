//! The scheduler's task table.
//!
//! All access goes through short critical sections; the lock is never held
//! while a task fires or a pipeline compiles.

use crate::error::SchedulerError;
use crate::task::Task;
use parking_lot::RwLock;
use pulse_core::TaskId;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub(crate) struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<Task>>>,
}

impl TaskRegistry {
    /// Registers a task. An existing ID is never overwritten.
    pub(crate) fn add(&self, task: Arc<Task>) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.write();
        let id = task.id();
        if tasks.contains_key(&id) {
            return Err(SchedulerError::TaskAlreadyExists { id });
        }
        tasks.insert(id, task);
        Ok(())
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<Arc<Task>> {
        self.tasks.read().get(&id).cloned()
    }

    /// Removes a task if `check` accepts it.
    pub(crate) fn remove_if(
        &self,
        id: TaskId,
        check: impl FnOnce(&Task) -> Result<(), SchedulerError>,
    ) -> Result<Arc<Task>, SchedulerError> {
        let mut tasks = self.tasks.write();
        let task = tasks.get(&id).ok_or(SchedulerError::TaskNotFound { id })?;
        check(&**task)?;
        tasks.remove(&id).ok_or(SchedulerError::TaskNotFound { id })
    }

    pub(crate) fn snapshot(&self) -> HashMap<TaskId, Arc<Task>> {
        self.tasks.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.read().len()
    }
}
