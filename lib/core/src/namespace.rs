//! Metric namespaces.
//!
//! A namespace is an ordered sequence of path segments written as
//! `/intel/mock/foo`. Segments are restricted to ASCII alphanumerics,
//! `_`, `-` and `.`, or a lone `*` wildcard.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors from namespace parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    /// The namespace string was empty.
    Empty,
    /// The namespace did not start with `/`.
    MissingLeadingSlash,
    /// A segment between two separators was empty.
    EmptySegment { index: usize },
    /// A segment contained a character outside the allowed set.
    InvalidCharacter { segment: String, character: char },
}

impl fmt::Display for NamespaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "namespace is empty"),
            Self::MissingLeadingSlash => write!(f, "namespace must start with '/'"),
            Self::EmptySegment { index } => write!(f, "segment {index} is empty"),
            Self::InvalidCharacter { segment, character } => {
                write!(f, "segment '{segment}' contains invalid character '{character}'")
            }
        }
    }
}

impl std::error::Error for NamespaceError {}

/// A validated metric namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(Vec<String>);

impl Namespace {
    /// Parses and validates a namespace string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string violates the namespace syntax.
    pub fn parse(raw: &str) -> Result<Self, NamespaceError> {
        if raw.is_empty() {
            return Err(NamespaceError::Empty);
        }
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(NamespaceError::MissingLeadingSlash);
        };

        let mut segments = Vec::new();
        for (index, segment) in rest.split('/').enumerate() {
            if segment.is_empty() {
                return Err(NamespaceError::EmptySegment { index });
            }
            if segment != "*"
                && let Some(character) = segment.chars().find(|c| !is_segment_char(*c))
            {
                return Err(NamespaceError::InvalidCharacter {
                    segment: segment.to_string(),
                    character,
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns true if `self` is a (non-strict) prefix of `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Namespace) -> bool {
        other.0.starts_with(&self.0)
    }
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Namespace {
    type Err = NamespaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Namespace {
    type Error = NamespaceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.to_string()
    }
}
