//! Compiled, content-type negotiated pipelines.
//!
//! A pipeline is the executable form of a workflow map. Stages form a tree
//! below the implicit collect stage; every stage knows the content type its
//! parent must hand it. Pipelines are immutable once built.

use pulse_core::{ConfigDataNode, PluginKey, RequestedMetric, SubscribedPlugin};
use serde::Serialize;

/// A processor stage and the stages fed by its output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessStage {
    pub(crate) plugin: PluginKey,
    pub(crate) config: ConfigDataNode,
    pub(crate) inbound_content_type: String,
    pub(crate) children: Vec<Stage>,
}

impl ProcessStage {
    /// Returns the processor's identity.
    #[must_use]
    pub fn plugin(&self) -> &PluginKey {
        &self.plugin
    }

    /// Returns the effective configuration.
    #[must_use]
    pub fn config(&self) -> &ConfigDataNode {
        &self.config
    }

    /// Returns the content type this stage receives.
    #[must_use]
    pub fn inbound_content_type(&self) -> &str {
        &self.inbound_content_type
    }

    /// Returns the stages fed by this processor.
    #[must_use]
    pub fn children(&self) -> &[Stage] {
        &self.children
    }
}

/// A publisher stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishStage {
    pub(crate) plugin: PluginKey,
    pub(crate) config: ConfigDataNode,
    pub(crate) inbound_content_type: String,
}

impl PublishStage {
    /// Returns the publisher's identity.
    #[must_use]
    pub fn plugin(&self) -> &PluginKey {
        &self.plugin
    }

    /// Returns the effective configuration.
    #[must_use]
    pub fn config(&self) -> &ConfigDataNode {
        &self.config
    }

    /// Returns the content type this stage receives.
    #[must_use]
    pub fn inbound_content_type(&self) -> &str {
        &self.inbound_content_type
    }
}

/// A pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage {
    /// Transforms its input and feeds its children.
    Process(ProcessStage),
    /// Emits its input. Always a leaf.
    Publish(PublishStage),
}

impl Stage {
    /// Returns the plugin identity.
    #[must_use]
    pub fn plugin(&self) -> &PluginKey {
        match self {
            Self::Process(stage) => stage.plugin(),
            Self::Publish(stage) => stage.plugin(),
        }
    }

    /// Returns the effective configuration.
    #[must_use]
    pub fn config(&self) -> &ConfigDataNode {
        match self {
            Self::Process(stage) => stage.config(),
            Self::Publish(stage) => stage.config(),
        }
    }

    /// Returns the negotiated inbound content type.
    #[must_use]
    pub fn inbound_content_type(&self) -> &str {
        match self {
            Self::Process(stage) => stage.inbound_content_type(),
            Self::Publish(stage) => stage.inbound_content_type(),
        }
    }

    /// Returns the child stages; publish stages have none.
    #[must_use]
    pub fn children(&self) -> &[Stage] {
        match self {
            Self::Process(stage) => stage.children(),
            Self::Publish(_) => &[],
        }
    }
}

/// Visits pipeline stages in depth-first pre-order.
///
/// `depth` is 0 for stages fed directly by the collect stage.
pub trait StageVisitor {
    /// Called for each process stage before its children.
    fn visit_process(&mut self, _stage: &ProcessStage, _depth: usize) {}

    /// Called for each publish stage.
    fn visit_publish(&mut self, _stage: &PublishStage, _depth: usize) {}
}

/// The compiled form of a workflow map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    pub(crate) metrics: Vec<RequestedMetric>,
    pub(crate) stages: Vec<Stage>,
}

impl Pipeline {
    /// Returns the metrics the collect stage requests.
    #[must_use]
    pub fn metrics(&self) -> &[RequestedMetric] {
        &self.metrics
    }

    /// Returns the stages fed directly by the collect stage.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Walks every stage depth-first, parents before children.
    pub fn accept<V: StageVisitor + ?Sized>(&self, visitor: &mut V) {
        let mut stack: Vec<(&Stage, usize)> = self.stages.iter().rev().map(|s| (s, 0)).collect();
        while let Some((stage, depth)) = stack.pop() {
            match stage {
                Stage::Process(process) => {
                    visitor.visit_process(process, depth);
                    stack.extend(process.children.iter().rev().map(|s| (s, depth + 1)));
                }
                Stage::Publish(publish) => visitor.visit_publish(publish, depth),
            }
        }
    }

    /// Returns the number of process and publish stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        struct Counter(usize);
        impl StageVisitor for Counter {
            fn visit_process(&mut self, _: &ProcessStage, _: usize) {
                self.0 += 1;
            }
            fn visit_publish(&mut self, _: &PublishStage, _: usize) {
                self.0 += 1;
            }
        }

        let mut counter = Counter(0);
        self.accept(&mut counter);
        counter.0
    }

    /// Lists every plugin the pipeline runs, with its effective configuration.
    #[must_use]
    pub fn plugins(&self) -> Vec<SubscribedPlugin> {
        struct Plugins(Vec<SubscribedPlugin>);
        impl StageVisitor for Plugins {
            fn visit_process(&mut self, stage: &ProcessStage, _: usize) {
                self.0.push(SubscribedPlugin {
                    key: stage.plugin.clone(),
                    config: stage.config.clone(),
                });
            }
            fn visit_publish(&mut self, stage: &PublishStage, _: usize) {
                self.0.push(SubscribedPlugin {
                    key: stage.plugin.clone(),
                    config: stage.config.clone(),
                });
            }
        }

        let mut plugins = Plugins(Vec::new());
        self.accept(&mut plugins);
        plugins.0
    }
}
