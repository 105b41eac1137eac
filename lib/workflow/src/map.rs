//! Workflow map construction using petgraph.
//!
//! A workflow map is authored as a tree: the collect node at the root,
//! process nodes below it, publish nodes as leaves. Nodes live in a
//! directed graph and are addressed by [`NodeId`], so a map under
//! construction can be malformed (cycles, shared children, detached nodes).
//! Those shapes are rejected when the map is compiled.

use crate::error::WorkflowError;
use crate::node::{CollectNode, MapNode, NodeId, ProcessNode, PublishNode};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use pulse_core::{ConfigTree, Namespace, RequestedMetric, SubscribedPlugin};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Slot {
    id: NodeId,
    node: MapNode,
}

/// A declarative collect/process/publish tree.
#[derive(Debug, Clone)]
pub struct WorkflowMap {
    /// The underlying directed graph. Edge weights record attach order.
    graph: DiGraph<Slot, usize>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    node_index_map: HashMap<NodeId, NodeIndex>,
    root: NodeId,
    collect: CollectNode,
    attach_seq: usize,
}

impl WorkflowMap {
    /// Creates a map holding only an empty collect node.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = NodeId::new();
        let index = graph.add_node(Slot {
            id: root,
            node: MapNode::Collect,
        });
        Self {
            graph,
            node_index_map: HashMap::from([(root, index)]),
            root,
            collect: CollectNode::default(),
            attach_seq: 0,
        }
    }

    /// Returns the ID of the collect node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the collect node.
    #[must_use]
    pub fn collect_node(&self) -> &CollectNode {
        &self.collect
    }

    /// Returns the collect node for editing.
    pub fn collect_node_mut(&mut self) -> &mut CollectNode {
        &mut self.collect
    }

    /// Adds an unattached process node.
    pub fn add_process(&mut self, node: ProcessNode) -> NodeId {
        self.add(MapNode::Process(node))
    }

    /// Adds an unattached publish node.
    pub fn add_publish(&mut self, node: PublishNode) -> NodeId {
        self.add(MapNode::Publish(node))
    }

    fn add(&mut self, node: MapNode) -> NodeId {
        let id = NodeId::new();
        let index = self.graph.add_node(Slot { id, node });
        self.node_index_map.insert(id, index);
        id
    }

    /// Attaches `child` below `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if either node is unknown, the parent is a publish
    /// node, the child is the collect node, or the edge already exists.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), WorkflowError> {
        let parent_index = self.index_of(parent)?;
        let child_index = self.index_of(child)?;

        let invalid = |reason| WorkflowError::InvalidAttachment {
            parent,
            child,
            reason,
        };
        if child == self.root {
            return Err(invalid("the collect node cannot be a child"));
        }
        if !self.graph[parent_index].node.accepts_children() {
            return Err(invalid("publish nodes cannot have children"));
        }
        if self.graph.find_edge(parent_index, child_index).is_some() {
            return Err(invalid("already attached to this parent"));
        }

        self.graph.add_edge(parent_index, child_index, self.attach_seq);
        self.attach_seq += 1;
        Ok(())
    }

    fn index_of(&self, node_id: NodeId) -> Result<NodeIndex, WorkflowError> {
        self.node_index_map
            .get(&node_id)
            .copied()
            .ok_or(WorkflowError::NodeNotFound { node_id })
    }

    /// Returns a node by its ID.
    #[must_use]
    pub fn get_node(&self, node_id: NodeId) -> Option<&MapNode> {
        let index = self.node_index_map.get(&node_id)?;
        self.graph.node_weight(*index).map(|slot| &slot.node)
    }

    /// Returns the number of nodes, including the collect node.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the children of a node in attach order.
    #[must_use]
    pub fn children(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| (*edge.weight(), self.graph[edge.target()].id))
            .collect();
        edges.sort_by_key(|(seq, _)| *seq);
        edges.into_iter().map(|(_, id)| id).collect()
    }

    /// Returns the number of parents of a node.
    pub(crate) fn parent_count(&self, node_id: NodeId) -> usize {
        self.node_index_map.get(&node_id).map_or(0, |&index| {
            self.graph
                .edges_directed(index, Direction::Incoming)
                .count()
        })
    }

    /// Returns the IDs of every process and publish node.
    pub(crate) fn plugin_node_ids(&self) -> Vec<NodeId> {
        self.graph
            .node_weights()
            .filter(|slot| slot.id != self.root)
            .map(|slot| slot.id)
            .collect()
    }

    /// Returns true if the map contains a cycle.
    pub(crate) fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Checks the collect node: at least one metric, and every namespace
    /// referenced by a metric or a config entry is well formed.
    ///
    /// Every violation is reported, not just the first.
    #[must_use]
    pub fn validate(&self) -> Vec<WorkflowError> {
        let mut errors = Vec::new();
        if self.collect.metrics().is_empty() {
            errors.push(WorkflowError::NoMetricsRequested);
        }

        let metric_namespaces = self.collect.metrics().iter().map(|m| m.namespace.as_str());
        let config_namespaces = self.collect.config().keys().map(String::as_str);
        for raw in metric_namespaces.chain(config_namespaces) {
            if let Err(reason) = Namespace::parse(raw) {
                errors.push(WorkflowError::InvalidNamespace {
                    namespace: raw.to_string(),
                    reason,
                });
            }
        }
        errors
    }

    /// Resolves the collect node into metric requests, each carrying the
    /// configuration of its nearest namespace prefixes.
    ///
    /// # Errors
    ///
    /// Returns every validation failure from [`Self::validate`].
    pub fn requested_metrics(&self) -> Result<Vec<RequestedMetric>, Vec<WorkflowError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(self.valid_metrics())
    }

    /// Like [`Self::requested_metrics`], but skips entries with malformed
    /// namespaces instead of failing.
    #[must_use]
    pub fn valid_metrics(&self) -> Vec<RequestedMetric> {
        let mut tree = ConfigTree::new();
        for (raw, node) in self.collect.config() {
            if let Ok(namespace) = Namespace::parse(raw) {
                tree.insert(namespace, node);
            }
        }

        self.collect
            .metrics()
            .iter()
            .filter_map(|entry| {
                let namespace = Namespace::parse(&entry.namespace).ok()?;
                let config = tree.get(&namespace);
                Some(RequestedMetric {
                    namespace,
                    version: entry.version,
                    config,
                })
            })
            .collect()
    }

    /// Lists every plugin referenced by the map with its own configuration.
    #[must_use]
    pub fn plugins(&self) -> Vec<SubscribedPlugin> {
        self.graph
            .node_weights()
            .filter_map(|slot| {
                Some(SubscribedPlugin {
                    key: slot.node.plugin_key()?,
                    config: slot.node.plugin_config()?.clone(),
                })
            })
            .collect()
    }
}

impl Default for WorkflowMap {
    fn default() -> Self {
        Self::new()
    }
}
