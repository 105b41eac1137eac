//! Metric requests, collected metrics and serialized payloads.

use crate::config::ConfigDataNode;
use crate::namespace::Namespace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A metric a task asks the collectors for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedMetric {
    /// Metric namespace.
    pub namespace: Namespace,
    /// Requested version, or [`crate::LATEST_VERSION`].
    pub version: i32,
    /// Effective configuration for the namespace.
    pub config: ConfigDataNode,
}

/// A collected metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric namespace.
    pub namespace: Namespace,
    /// Version of the collector that produced it.
    pub version: i32,
    /// The collected value.
    pub data: JsonValue,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// When the value was collected.
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    /// Creates a metric collected now.
    #[must_use]
    pub fn new(namespace: Namespace, version: i32, data: JsonValue) -> Self {
        Self {
            namespace,
            version,
            data,
            tags: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Serialized metric data travelling between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Content type identifier of `data`.
    pub content_type: String,
    /// Encoded bytes.
    pub data: Vec<u8>,
}

impl Payload {
    /// Creates a payload.
    #[must_use]
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            data,
        }
    }
}
