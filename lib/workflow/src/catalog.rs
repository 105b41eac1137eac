//! Content-type catalog capability.
//!
//! The compiler asks the catalog which content types each plugin accepts
//! and returns. Lookups are synchronous: the catalog answers from plugin
//! metadata it already holds.

use crate::error::CatalogError;
use pulse_core::PluginKey;
use pulse_core::plugin::content_type;

/// Content types declared by a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// Types the plugin can consume, in preference order.
    pub accepted: Vec<String>,
    /// Types the plugin emits, in preference order.
    pub returned: Vec<String>,
}

impl ContentTypes {
    /// Creates a declaration from accepted and returned lists.
    #[must_use]
    pub fn new<A, R>(accepted: A, returned: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            accepted: accepted.into_iter().map(Into::into).collect(),
            returned: returned.into_iter().map(Into::into).collect(),
        }
    }
}

/// Answers content-type questions about loaded plugins.
pub trait ContentTypeCatalog: Send + Sync {
    /// Returns the content types a plugin accepts and returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin is unknown or the catalog cannot be
    /// queried.
    fn plugin_content_types(&self, plugin: &PluginKey) -> Result<ContentTypes, CatalogError>;

    /// Returns the framework's native serializations in preference order.
    ///
    /// These are what the collect stage emits, and what any edge can fall
    /// back to when the producer's declared types do not fit.
    fn native_content_types(&self) -> Vec<String> {
        vec![
            content_type::PULSE_GOB.to_string(),
            content_type::PULSE_JSON.to_string(),
        ]
    }
}
