//! Content-type negotiation for a single pipeline edge.
//!
//! For an edge producer -> consumer, the resolved type is:
//!
//! 1. the first concrete type in the consumer's accepted list that the
//!    producer returns;
//! 2. otherwise, the producer's first returned type matched by one of the
//!    consumer's wildcard patterns;
//! 3. otherwise, steps 1 and 2 repeated against the framework's native
//!    types, provided the producer emits a native type (or declares none)
//!    so the core can decode its output and re-encode it.
//!
//! If nothing matches, the edge cannot be resolved.

use pulse_core::plugin::content_type::{is_wildcard, matches};

/// Resolves the content type a producer must emit for a consumer.
#[must_use]
pub fn negotiate(returned: &[String], native: &[String], accepted: &[String]) -> Option<String> {
    if let Some(found) = resolve(returned, accepted) {
        return Some(found);
    }
    let decodable = returned.is_empty() || returned.iter().any(|t| native.contains(t));
    if decodable {
        resolve(native, accepted)
    } else {
        None
    }
}

fn resolve(offered: &[String], accepted: &[String]) -> Option<String> {
    let concrete = accepted
        .iter()
        .filter(|t| !is_wildcard(t))
        .find(|t| offered.contains(t));
    if let Some(found) = concrete {
        return Some(found.clone());
    }

    accepted
        .iter()
        .filter(|t| is_wildcard(t))
        .find_map(|pattern| offered.iter().find(|t| matches(pattern, t)))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn native() -> Vec<String> {
        types(&["pulse.gob", "pulse.json"])
    }

    #[test]
    fn concrete_intersection_wins() {
        let resolved = negotiate(
            &types(&["pulse.gob"]),
            &native(),
            &types(&["pulse.json", "pulse.gob"]),
        );
        assert_eq!(resolved.as_deref(), Some("pulse.gob"));
    }

    #[test]
    fn consumer_order_breaks_ties() {
        let returned = types(&["pulse.gob", "pulse.json"]);
        let resolved = negotiate(&returned, &native(), &types(&["pulse.json", "pulse.gob"]));
        assert_eq!(resolved.as_deref(), Some("pulse.json"));
    }

    #[test]
    fn concrete_match_preferred_over_wildcard() {
        let returned = types(&["pulse.json", "pulse.gob"]);
        let resolved = negotiate(&returned, &native(), &types(&["pulse.*", "pulse.gob"]));
        assert_eq!(resolved.as_deref(), Some("pulse.gob"));
    }

    #[test]
    fn wildcard_falls_back_to_first_returned() {
        let returned = types(&["custom.avro", "custom.csv"]);
        let resolved = negotiate(&returned, &native(), &types(&["*"]));
        assert_eq!(resolved.as_deref(), Some("custom.avro"));

        let resolved = negotiate(&returned, &native(), &types(&["custom.*"]));
        assert_eq!(resolved.as_deref(), Some("custom.avro"));
    }

    #[test]
    fn native_types_used_when_producer_does_not_fit() {
        let resolved = negotiate(&types(&["pulse.gob"]), &native(), &types(&["pulse.json"]));
        assert_eq!(resolved.as_deref(), Some("pulse.json"));
    }

    #[test]
    fn foreign_producer_gets_no_native_fallback() {
        let resolved = negotiate(&types(&["custom.avro"]), &native(), &types(&["pulse.json"]));
        assert!(resolved.is_none());

        let mixed = types(&["custom.avro", "pulse.gob"]);
        let resolved = negotiate(&mixed, &native(), &types(&["pulse.json"]));
        assert_eq!(resolved.as_deref(), Some("pulse.json"));
    }

    #[test]
    fn empty_producer_uses_native_types() {
        let resolved = negotiate(&[], &native(), &types(&["pulse.*"]));
        assert_eq!(resolved.as_deref(), Some("pulse.gob"));
    }

    #[test]
    fn unresolvable_edge() {
        let resolved = negotiate(&types(&["pulse.gob"]), &native(), &types(&["foo.bar"]));
        assert!(resolved.is_none());
    }
}
