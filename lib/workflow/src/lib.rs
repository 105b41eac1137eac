//! Workflow maps and their compilation into pipelines.
//!
//! This crate provides:
//!
//! - **Map Model**: a collect/process/publish tree held in a petgraph arena
//! - **Catalog**: the capability that reports each plugin's content types
//! - **Negotiation**: picking the content type carried along each edge
//! - **Compilation**: turning a validated map into an immutable [`Pipeline`]

pub mod catalog;
pub mod compile;
pub mod error;
pub mod map;
pub mod negotiate;
pub mod node;
pub mod pipeline;

pub use catalog::{ContentTypeCatalog, ContentTypes};
pub use compile::compile;
pub use error::{CatalogError, WorkflowError};
pub use map::WorkflowMap;
pub use negotiate::negotiate;
pub use node::{CollectNode, MapNode, MetricEntry, NodeId, ProcessNode, PublishNode};
pub use pipeline::{Pipeline, ProcessStage, PublishStage, Stage, StageVisitor};
