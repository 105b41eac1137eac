//! Workflow map node types.
//!
//! A workflow map has exactly one collect node at its root. Process nodes
//! transform what their parent produced and may have children of their
//! own; publish nodes are always leaves.

use pulse_core::{ConfigDataNode, ConfigValue, PluginKey, PluginType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;

/// A unique identifier for a node within a workflow map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Ulid);

impl NodeId {
    /// Creates a new random node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// A metric requested by the collect node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEntry {
    /// Namespace as written by the author; validated at compile time.
    pub namespace: String,
    /// Requested version.
    pub version: i32,
}

/// The root of a workflow: what to collect and how to configure it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectNode {
    metrics: Vec<MetricEntry>,
    config: BTreeMap<String, ConfigDataNode>,
}

impl CollectNode {
    /// Requests a metric. Requesting a namespace again replaces its version.
    pub fn add_metric(&mut self, namespace: impl Into<String>, version: i32) {
        let namespace = namespace.into();
        match self.metrics.iter_mut().find(|m| m.namespace == namespace) {
            Some(existing) => existing.version = version,
            None => self.metrics.push(MetricEntry { namespace, version }),
        }
    }

    /// Attaches a setting to a namespace prefix.
    pub fn add_config_item(
        &mut self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) {
        self.config
            .entry(namespace.into())
            .or_default()
            .add_item(key, value);
    }

    /// Returns the requested metrics in declaration order.
    #[must_use]
    pub fn metrics(&self) -> &[MetricEntry] {
        &self.metrics
    }

    /// Returns configuration keyed by namespace prefix.
    #[must_use]
    pub fn config(&self) -> &BTreeMap<String, ConfigDataNode> {
        &self.config
    }
}

/// Generates a plugin-backed node type.
macro_rules! define_plugin_node {
    ($(#[$meta:meta])* $name:ident, $plugin_type:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            name: String,
            version: i32,
            config: ConfigDataNode,
        }

        impl $name {
            /// Creates a node for the given plugin.
            #[must_use]
            pub fn new(name: impl Into<String>, version: i32) -> Self {
                Self {
                    name: name.into(),
                    version,
                    config: ConfigDataNode::new(),
                }
            }

            /// Adds or replaces a plugin setting.
            pub fn add_config_item(
                &mut self,
                key: impl Into<String>,
                value: impl Into<ConfigValue>,
            ) {
                self.config.add_item(key, value);
            }

            /// Builder form of [`Self::add_config_item`].
            #[must_use]
            pub fn with_config_item(
                mut self,
                key: impl Into<String>,
                value: impl Into<ConfigValue>,
            ) -> Self {
                self.add_config_item(key, value);
                self
            }

            /// Returns the plugin name.
            #[must_use]
            pub fn name(&self) -> &str {
                &self.name
            }

            /// Returns the plugin version.
            #[must_use]
            pub fn version(&self) -> i32 {
                self.version
            }

            /// Returns the node's own configuration.
            #[must_use]
            pub fn config(&self) -> &ConfigDataNode {
                &self.config
            }

            /// Returns the plugin identity.
            #[must_use]
            pub fn key(&self) -> PluginKey {
                PluginKey::new(self.name.clone(), $plugin_type, self.version)
            }
        }
    };
}

define_plugin_node!(
    /// Runs a processor plugin over its parent's output.
    ProcessNode,
    PluginType::Processor
);

define_plugin_node!(
    /// Hands its parent's output to a publisher plugin.
    PublishNode,
    PluginType::Publisher
);

/// A node stored in a workflow map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapNode {
    /// The root collect node; its contents live on the map itself.
    Collect,
    /// A processor stage.
    Process(ProcessNode),
    /// A publisher stage.
    Publish(PublishNode),
}

impl MapNode {
    /// Returns the plugin identity, if the node runs a plugin.
    #[must_use]
    pub fn plugin_key(&self) -> Option<PluginKey> {
        match self {
            Self::Collect => None,
            Self::Process(node) => Some(node.key()),
            Self::Publish(node) => Some(node.key()),
        }
    }

    /// Returns the node's own plugin configuration.
    #[must_use]
    pub fn plugin_config(&self) -> Option<&ConfigDataNode> {
        match self {
            Self::Collect => None,
            Self::Process(node) => Some(node.config()),
            Self::Publish(node) => Some(node.config()),
        }
    }

    /// Returns true if the node may have children.
    #[must_use]
    pub fn accepts_children(&self) -> bool {
        !matches!(self, Self::Publish(_))
    }
}
