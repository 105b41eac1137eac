//! Plugin identity and content types.

use crate::config::ConfigDataNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version number that resolves to the newest loaded plugin version.
pub const LATEST_VERSION: i32 = -1;

/// Well-known content type identifiers.
pub mod content_type {
    /// The framework's native binary serialization.
    pub const PULSE_GOB: &str = "pulse.gob";
    /// The framework's native JSON serialization.
    pub const PULSE_JSON: &str = "pulse.json";
    /// Accepts every native serialization.
    pub const PULSE_ALL: &str = "pulse.*";
    /// Accepts anything.
    pub const ANY: &str = "*";

    /// Returns true if `content_type` is a wildcard pattern.
    #[must_use]
    pub fn is_wildcard(content_type: &str) -> bool {
        content_type == ANY || content_type.ends_with(".*")
    }

    /// Returns true if `pattern` accepts the concrete `content_type`.
    #[must_use]
    pub fn matches(pattern: &str, content_type: &str) -> bool {
        if pattern == ANY {
            return !is_wildcard(content_type);
        }
        match pattern.strip_suffix('*') {
            Some(prefix) if pattern.ends_with(".*") => {
                content_type.len() > prefix.len()
                    && content_type.starts_with(prefix)
                    && !is_wildcard(content_type)
            }
            _ => pattern == content_type,
        }
    }
}

/// The role a plugin plays in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    /// Gathers metrics.
    Collector,
    /// Transforms metric payloads.
    Processor,
    /// Emits metric payloads.
    Publisher,
}

impl PluginType {
    /// Returns the lowercase name of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collector => "collector",
            Self::Processor => "processor",
            Self::Publisher => "publisher",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a plugin by name, type and version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PluginKey {
    /// Plugin name.
    pub name: String,
    /// Plugin type.
    pub plugin_type: PluginType,
    /// Plugin version, or [`LATEST_VERSION`].
    pub version: i32,
}

impl PluginKey {
    /// Creates a plugin key.
    #[must_use]
    pub fn new(name: impl Into<String>, plugin_type: PluginType, version: i32) -> Self {
        Self {
            name: name.into(),
            plugin_type,
            version,
        }
    }

    /// Returns true if the key asks for the newest version.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.version < 0
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_latest() {
            write!(f, "{}:{}:latest", self.plugin_type, self.name)
        } else {
            write!(f, "{}:{}:v{}", self.plugin_type, self.name, self.version)
        }
    }
}

/// A plugin a task depends on, with the configuration it will run with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribedPlugin {
    /// Plugin identity.
    pub key: PluginKey,
    /// Effective configuration.
    pub config: ConfigDataNode,
}
