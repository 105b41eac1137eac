//! Typed plugin and metric configuration.
//!
//! Configuration is attached at every level of a workflow. Collect-level
//! configuration is keyed by namespace prefix and resolved with
//! [`ConfigTree`]; plugin-level configuration is a flat [`ConfigDataNode`]
//! that children inherit and override.

use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single typed configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    Str(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A flat set of typed key/value settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDataNode {
    items: BTreeMap<String, ConfigValue>,
}

impl ConfigDataNode {
    /// Creates an empty node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a setting.
    pub fn add_item(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.items.insert(key.into(), value.into());
    }

    /// Looks up a setting.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.items.get(key)
    }

    /// Iterates settings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of settings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns a copy of `self` with every entry of `overrides` applied on top.
    #[must_use]
    pub fn merged(&self, overrides: &ConfigDataNode) -> ConfigDataNode {
        let mut items = self.items.clone();
        items.extend(
            overrides
                .items
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        ConfigDataNode { items }
    }
}

/// Namespace-prefix keyed configuration.
///
/// Looking up a namespace merges every entry whose namespace is a prefix of
/// it, shortest prefix first, so the nearest ancestor wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    entries: BTreeMap<Namespace, ConfigDataNode>,
}

impl ConfigTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `node` into the entry for `namespace`.
    pub fn insert(&mut self, namespace: Namespace, node: &ConfigDataNode) {
        let entry = self.entries.entry(namespace).or_default();
        *entry = entry.merged(node);
    }

    /// Resolves the effective configuration for `namespace`.
    #[must_use]
    pub fn get(&self, namespace: &Namespace) -> ConfigDataNode {
        let mut matches: Vec<(&Namespace, &ConfigDataNode)> = self
            .entries
            .iter()
            .filter(|(prefix, _)| prefix.is_prefix_of(namespace))
            .collect();
        matches.sort_by_key(|(prefix, _)| prefix.segments().len());

        matches
            .into_iter()
            .fold(ConfigDataNode::new(), |acc, (_, node)| acc.merged(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(raw: &str) -> Namespace {
        Namespace::parse(raw).expect("valid namespace")
    }

    #[test]
    fn config_values_from_primitives() {
        let mut node = ConfigDataNode::new();
        node.add_item("username", "root");
        node.add_item("port", 8080);
        node.add_item("ratio", 0.32);
        node.add_item("yesorno", true);

        assert_eq!(node.len(), 4);
        assert_eq!(node.get("port"), Some(&ConfigValue::Int(8080)));
        assert_eq!(node.get("username"), Some(&ConfigValue::Str("root".into())));
    }

    #[test]
    fn merged_overrides_existing_keys() {
        let mut base = ConfigDataNode::new();
        base.add_item("username", "root");
        base.add_item("port", 8080);
        let mut overrides = ConfigDataNode::new();
        overrides.add_item("username", "wat");

        let merged = base.merged(&overrides);
        assert_eq!(merged.get("username"), Some(&ConfigValue::Str("wat".into())));
        assert_eq!(merged.get("port"), Some(&ConfigValue::Int(8080)));
    }

    #[test]
    fn tree_nearest_prefix_wins() {
        let mut root = ConfigDataNode::new();
        root.add_item("user", "root");
        root.add_item("password", "secret");
        let mut leaf = ConfigDataNode::new();
        leaf.add_item("user", "leaf");

        let mut tree = ConfigTree::new();
        tree.insert(ns("/foo"), &root);
        tree.insert(ns("/foo/bar"), &leaf);

        let resolved = tree.get(&ns("/foo/bar/baz"));
        assert_eq!(resolved.get("user"), Some(&ConfigValue::Str("leaf".into())));
        assert_eq!(
            resolved.get("password"),
            Some(&ConfigValue::Str("secret".into()))
        );

        let sibling = tree.get(&ns("/foo/qux"));
        assert_eq!(sibling.get("user"), Some(&ConfigValue::Str("root".into())));
        assert!(tree.get(&ns("/other")).is_empty());
    }

    #[test]
    fn config_value_serde_is_untagged() {
        let value: ConfigValue = serde_json::from_str("42").expect("deserialize");
        assert_eq!(value, ConfigValue::Int(42));
        let value: ConfigValue = serde_json::from_str("\"x\"").expect("deserialize");
        assert_eq!(value, ConfigValue::Str("x".into()));
    }
}
