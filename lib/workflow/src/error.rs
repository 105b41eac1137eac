//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `CatalogError`: Failures reported by a content-type catalog
//! - `WorkflowError`: Workflow map construction and compilation failures

use crate::node::NodeId;
use pulse_core::{NamespaceError, PluginKey};
use std::fmt;

/// Errors reported by a [`crate::ContentTypeCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The plugin is not loaded.
    PluginNotFound { plugin: PluginKey },
    /// The catalog could not be queried.
    Unavailable { reason: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PluginNotFound { plugin } => write!(f, "plugin not found: {plugin}"),
            Self::Unavailable { reason } => write!(f, "plugin catalog unavailable: {reason}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Errors from building or compiling a workflow map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// A namespace failed syntax validation.
    InvalidNamespace {
        namespace: String,
        reason: NamespaceError,
    },
    /// The collect node requests no metrics.
    NoMetricsRequested,
    /// Node with the given ID was not found in the map.
    NodeNotFound { node_id: NodeId },
    /// A child cannot be attached to the given parent.
    InvalidAttachment {
        parent: NodeId,
        child: NodeId,
        reason: &'static str,
    },
    /// The map contains a cycle.
    CyclicWorkflow,
    /// A process or publish node was never attached.
    DetachedNode { node_id: NodeId },
    /// A node was attached under more than one parent.
    MultipleParents { node_id: NodeId },
    /// No content type satisfies both ends of an edge.
    ContentTypeNotSupported {
        producer: String,
        consumer: PluginKey,
        accepted: Vec<String>,
    },
    /// Content types for a plugin could not be looked up.
    ContentTypeLookup {
        plugin: PluginKey,
        error: CatalogError,
    },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNamespace { namespace, reason } => {
                write!(f, "invalid namespace '{namespace}': {reason}")
            }
            Self::NoMetricsRequested => write!(f, "workflow requests no metrics"),
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::InvalidAttachment {
                parent,
                child,
                reason,
            } => write!(f, "cannot attach {child} to {parent}: {reason}"),
            Self::CyclicWorkflow => write!(f, "workflow contains a cycle"),
            Self::DetachedNode { node_id } => {
                write!(f, "node {node_id} is not attached to the workflow")
            }
            Self::MultipleParents { node_id } => {
                write!(f, "node {node_id} has more than one parent")
            }
            Self::ContentTypeNotSupported {
                producer,
                consumer,
                accepted,
            } => write!(
                f,
                "content type not supported: {producer} produces nothing {consumer} accepts ({})",
                accepted.join(", ")
            ),
            Self::ContentTypeLookup { plugin, error } => {
                write!(f, "content type lookup failed for {plugin}: {error}")
            }
        }
    }
}

impl std::error::Error for WorkflowError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::PluginType;

    #[test]
    fn invalid_namespace_display() {
        let err = WorkflowError::InvalidNamespace {
            namespace: "****/&&&".to_string(),
            reason: NamespaceError::MissingLeadingSlash,
        };
        assert!(err.to_string().contains("****/&&&"));
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn content_type_not_supported_names_both_ends() {
        let err = WorkflowError::ContentTypeNotSupported {
            producer: "processor:machine:v1".to_string(),
            consumer: PluginKey::new("file", PluginType::Publisher, -1),
            accepted: vec!["pulse.json".to_string()],
        };
        let display = err.to_string();
        assert!(display.contains("processor:machine:v1"));
        assert!(display.contains("publisher:file:latest"));
    }

    #[test]
    fn catalog_error_display() {
        let err = CatalogError::Unavailable {
            reason: "control module stopped".to_string(),
        };
        assert!(err.to_string().contains("control module stopped"));
    }
}
