//! Core domain types for the pulse task scheduler.
//!
//! This crate provides the foundational types shared by the workflow
//! compiler and the scheduler: task identity, metric namespaces, typed
//! plugin configuration, plugin identity and metric payloads.

pub mod config;
pub mod error;
pub mod id;
pub mod metric;
pub mod namespace;
pub mod plugin;

pub use config::{ConfigDataNode, ConfigTree, ConfigValue};
pub use error::Result;
pub use id::{ParseIdError, TaskId};
pub use metric::{Metric, Payload, RequestedMetric};
pub use namespace::{Namespace, NamespaceError};
pub use plugin::{PluginKey, PluginType, SubscribedPlugin, LATEST_VERSION};
