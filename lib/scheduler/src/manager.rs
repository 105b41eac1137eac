//! The metric manager capability.
//!
//! The scheduler never loads plugins or touches metric bytes itself. Every
//! dependency check, subscription, collection, encoding, processing and
//! publishing call goes through a [`MetricManager`] shared by all tasks.

use crate::error::ManagerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::{
    ConfigDataNode, Metric, Payload, PluginKey, RequestedMetric, SubscribedPlugin, TaskId,
};
use pulse_workflow::ContentTypeCatalog;

/// Collects, transforms and publishes metrics on behalf of tasks.
///
/// Implementations must be safe to call from many task loops at once.
#[async_trait]
pub trait MetricManager: ContentTypeCatalog {
    /// Checks that every metric and plugin a task needs is available.
    fn validate_deps(
        &self,
        metrics: &[RequestedMetric],
        plugins: &[SubscribedPlugin],
    ) -> Vec<ManagerError>;

    /// Reserves the dependencies of a task about to start.
    fn subscribe_deps(
        &self,
        task_id: TaskId,
        metrics: &[RequestedMetric],
        plugins: &[SubscribedPlugin],
    ) -> Vec<ManagerError>;

    /// Releases the dependencies reserved by [`Self::subscribe_deps`].
    fn unsubscribe_deps(
        &self,
        task_id: TaskId,
        metrics: &[RequestedMetric],
        plugins: &[SubscribedPlugin],
    ) -> Vec<ManagerError>;

    /// Collects the requested metrics.
    ///
    /// `deadline` is the absolute time the fire cycle must finish by.
    /// Implementations may use it to cancel slow collectors.
    ///
    /// # Errors
    ///
    /// Returns every collector failure.
    async fn collect_metrics(
        &self,
        metrics: &[RequestedMetric],
        deadline: DateTime<Utc>,
    ) -> Result<Vec<Metric>, Vec<ManagerError>>;

    /// Encodes metrics into `content_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type is not a native serialization.
    fn marshal_metrics(
        &self,
        content_type: &str,
        metrics: &[Metric],
    ) -> Result<Payload, ManagerError>;

    /// Decodes a payload in a native serialization.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decoded.
    fn unmarshal_metrics(&self, payload: &Payload) -> Result<Vec<Metric>, ManagerError>;

    /// Runs a processor over a payload. The returned payload carries the
    /// processor's output content type.
    ///
    /// # Errors
    ///
    /// Returns every error the processor reported.
    async fn process_metrics(
        &self,
        payload: &Payload,
        plugin: &PluginKey,
        config: &ConfigDataNode,
    ) -> Result<Payload, Vec<ManagerError>>;

    /// Hands a payload to a publisher.
    ///
    /// # Errors
    ///
    /// Returns every error the publisher reported.
    async fn publish_metrics(
        &self,
        payload: &Payload,
        plugin: &PluginKey,
        config: &ConfigDataNode,
    ) -> Result<(), Vec<ManagerError>>;
}
