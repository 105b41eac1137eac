//! Workflow map compilation.
//!
//! Compiling a map checks its shape, resolves collect configuration, and
//! walks the process/publish tree depth-first from the collect node,
//! negotiating the inbound content type of every stage against the stage
//! that feeds it. Failures for independent nodes are accumulated so the
//! caller sees all of them at once.

use crate::catalog::ContentTypeCatalog;
use crate::error::WorkflowError;
use crate::map::WorkflowMap;
use crate::negotiate::negotiate;
use crate::node::{MapNode, NodeId};
use crate::pipeline::{Pipeline, ProcessStage, PublishStage, Stage};
use pulse_core::ConfigDataNode;
use tracing::{debug, instrument};

/// The stage feeding an edge.
struct Producer {
    label: String,
    returned: Vec<String>,
}

struct Compiler<'a, C: ?Sized> {
    map: &'a WorkflowMap,
    catalog: &'a C,
    native: Vec<String>,
    errors: Vec<WorkflowError>,
}

/// Compiles a workflow map into a negotiated pipeline.
///
/// # Errors
///
/// Returns every problem found: namespace violations, a missing metric
/// request, cycles, detached or multiply-attached nodes, failed catalog
/// lookups and edges with no acceptable content type.
#[instrument(skip_all, fields(nodes = map.node_count()))]
pub fn compile<C>(map: &WorkflowMap, catalog: &C) -> Result<Pipeline, Vec<WorkflowError>>
where
    C: ContentTypeCatalog + ?Sized,
{
    let metrics = map.requested_metrics()?;
    check_structure(map)?;

    let native = catalog.native_content_types();
    let mut compiler = Compiler {
        map,
        catalog,
        native: native.clone(),
        errors: Vec::new(),
    };
    let collect = Producer {
        label: "collect".to_string(),
        returned: native,
    };
    let stages = compiler.build_children(map.root(), &collect, &ConfigDataNode::new());

    if compiler.errors.is_empty() {
        Ok(Pipeline { metrics, stages })
    } else {
        Err(compiler.errors)
    }
}

fn check_structure(map: &WorkflowMap) -> Result<(), Vec<WorkflowError>> {
    if map.is_cyclic() {
        return Err(vec![WorkflowError::CyclicWorkflow]);
    }

    let errors: Vec<_> = map
        .plugin_node_ids()
        .into_iter()
        .filter_map(|node_id| match map.parent_count(node_id) {
            0 => Some(WorkflowError::DetachedNode { node_id }),
            1 => None,
            _ => Some(WorkflowError::MultipleParents { node_id }),
        })
        .collect();

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

impl<C: ContentTypeCatalog + ?Sized> Compiler<'_, C> {
    fn build_children(
        &mut self,
        parent: NodeId,
        producer: &Producer,
        inherited: &ConfigDataNode,
    ) -> Vec<Stage> {
        self.map
            .children(parent)
            .into_iter()
            .filter_map(|child| self.build_stage(child, producer, inherited))
            .collect()
    }

    fn build_stage(
        &mut self,
        node_id: NodeId,
        producer: &Producer,
        inherited: &ConfigDataNode,
    ) -> Option<Stage> {
        let map = self.map;
        let node = map.get_node(node_id)?;
        let plugin = node.plugin_key()?;
        let config = inherited.merged(node.plugin_config()?);

        let types = match self.catalog.plugin_content_types(&plugin) {
            Ok(types) => Some(types),
            Err(error) => {
                self.errors.push(WorkflowError::ContentTypeLookup {
                    plugin: plugin.clone(),
                    error,
                });
                None
            }
        };

        // Children are built even when this node fails so their errors are
        // reported too. An unknown processor is treated as declaring no types.
        let children = match node {
            MapNode::Process(_) => {
                let next = Producer {
                    label: plugin.to_string(),
                    returned: types
                        .as_ref()
                        .map(|types| types.returned.clone())
                        .unwrap_or_default(),
                };
                self.build_children(node_id, &next, &config)
            }
            _ => Vec::new(),
        };

        let types = types?;
        let inbound = negotiate(&producer.returned, &self.native, &types.accepted);

        let Some(inbound_content_type) = inbound else {
            self.errors.push(WorkflowError::ContentTypeNotSupported {
                producer: producer.label.clone(),
                consumer: plugin,
                accepted: types.accepted,
            });
            return None;
        };
        debug!(
            producer = %producer.label,
            consumer = %plugin,
            content_type = %inbound_content_type,
            "negotiated content type"
        );

        match node {
            MapNode::Process(_) => Some(Stage::Process(ProcessStage {
                plugin,
                config,
                inbound_content_type,
                children,
            })),
            MapNode::Publish(_) => Some(Stage::Publish(PublishStage {
                plugin,
                config,
                inbound_content_type,
            })),
            MapNode::Collect => None,
        }
    }
}
