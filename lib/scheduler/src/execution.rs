//! One fire cycle of a task's pipeline.
//!
//! Metrics are collected once, encoded into each first-layer stage's inbound
//! content type, then pushed depth-first through the stage tree. A stage
//! runs only after its parent succeeded; a failing stage skips its subtree
//! while its siblings continue. Stages run one at a time.

use crate::error::{ManagerError, TaskFailure};
use crate::manager::MetricManager;
use chrono::{DateTime, Utc};
use pulse_core::{Metric, Payload};
use pulse_workflow::{Pipeline, Stage};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// The time budget of one fire cycle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    wall_clock: DateTime<Utc>,
}

impl Deadline {
    pub(crate) fn after(budget: Duration) -> Self {
        let wall_clock = chrono::Duration::from_std(budget)
            .ok()
            .and_then(|budget| Utc::now().checked_add_signed(budget))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            at: Instant::now() + budget,
            wall_clock,
        }
    }

    fn check(&self) -> Result<(), TaskFailure> {
        if Instant::now() > self.at {
            return Err(TaskFailure::DeadlineExceeded {
                deadline: self.wall_clock,
            });
        }
        Ok(())
    }
}

/// What a stage receives from its parent.
enum Input<'a> {
    /// Freshly collected metrics, not yet encoded.
    Metrics(&'a [Metric]),
    /// The output of a process stage.
    Payload(Payload),
}

/// Produces the payload a stage expects from whatever its parent emitted.
fn prepare(
    manager: &dyn MetricManager,
    input: Input<'_>,
    content_type: &str,
) -> Result<Payload, ManagerError> {
    match input {
        Input::Metrics(metrics) => manager.marshal_metrics(content_type, metrics),
        Input::Payload(payload) if payload.content_type == content_type => Ok(payload),
        Input::Payload(payload) => {
            debug!(
                from = %payload.content_type,
                to = %content_type,
                "re-encoding payload"
            );
            let metrics = manager.unmarshal_metrics(&payload)?;
            manager.marshal_metrics(content_type, &metrics)
        }
    }
}

/// Runs one fire cycle.
///
/// # Errors
///
/// Returns the cycle's failures: a collect failure, every failed stage, and
/// a deadline overrun if the budget ran out.
pub(crate) async fn fire(
    pipeline: &Pipeline,
    manager: &dyn MetricManager,
    deadline: Deadline,
) -> Result<(), TaskFailure> {
    deadline.check()?;
    let metrics = manager
        .collect_metrics(pipeline.metrics(), deadline.wall_clock)
        .await
        .map_err(TaskFailure::Collect)?;
    debug!(count = metrics.len(), "collected metrics");

    let mut failures = Vec::new();
    let mut pending: Vec<(&Stage, Input<'_>)> = pipeline
        .stages()
        .iter()
        .rev()
        .map(|stage| (stage, Input::Metrics(&metrics)))
        .collect();

    while let Some((stage, input)) = pending.pop() {
        if let Err(overrun) = deadline.check() {
            failures.push(overrun);
            break;
        }

        let plugin = stage.plugin();
        let payload = match prepare(manager, input, stage.inbound_content_type()) {
            Ok(payload) => payload,
            Err(error) => {
                failures.push(TaskFailure::Stage {
                    plugin: plugin.clone(),
                    errors: vec![error],
                });
                continue;
            }
        };

        let outcome = match stage {
            Stage::Process(process) => manager
                .process_metrics(&payload, plugin, process.config())
                .await
                .map(|output| {
                    pending.extend(
                        process
                            .children()
                            .iter()
                            .rev()
                            .map(|child| (child, Input::Payload(output.clone()))),
                    );
                }),
            Stage::Publish(publish) => {
                manager
                    .publish_metrics(&payload, plugin, publish.config())
                    .await
            }
        };

        match outcome {
            Ok(()) => debug!(plugin = %plugin, "stage completed"),
            Err(errors) => {
                warn!(plugin = %plugin, errors = errors.len(), "stage failed");
                failures.push(TaskFailure::Stage {
                    plugin: plugin.clone(),
                    errors,
                });
            }
        }
    }

    let overran = matches!(failures.last(), Some(TaskFailure::DeadlineExceeded { .. }));
    if !overran && let Err(overrun) = deadline.check() {
        failures.push(overrun);
    }

    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0)),
        _ => Err(TaskFailure::Multiple(failures)),
    }
}
