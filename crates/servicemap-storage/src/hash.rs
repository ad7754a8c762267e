//! BLAKE3 content hashing for tamper evidence.
//!
//! Computes a deterministic hash of an environment's services and
//! relationships, independent of the order they were listed in, so that a
//! manifest written at save time can detect later out-of-band edits.

use serde::Serialize;

use servicemap_core::{EnvironmentData, Relationship, Service};

/// Hashable, canonically ordered view of an environment.
#[derive(Serialize)]
struct HashableEnvironment<'a> {
    services: Vec<&'a Service>,
    relationships: Vec<&'a Relationship>,
}

/// Compute the BLAKE3 hash of an environment's content.
///
/// Entries are sorted by id (stable, so duplicates keep their relative
/// order), serialized to JSON, then hashed. Returns the hex-encoded hash.
pub fn compute_environment_hash(data: &EnvironmentData) -> Result<String, serde_json::Error> {
    let mut services: Vec<&Service> = data.services.iter().collect();
    services.sort_by(|a, b| a.id.cmp(&b.id));
    let mut relationships: Vec<&Relationship> = data.relationships.iter().collect();
    relationships.sort_by(|a, b| a.id.cmp(&b.id));

    let json = serde_json::to_vec(&HashableEnvironment {
        services,
        relationships,
    })?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

/// Short, filesystem-safe fingerprint of an arbitrary string.
pub(crate) fn short_fingerprint(value: &str) -> String {
    let hex = blake3::hash(value.as_bytes()).to_hex();
    hex.as_str()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EnvironmentData {
        EnvironmentData {
            services: vec![Service::new("b", "B"), Service::new("a", "A")],
            relationships: vec![Relationship::new("r1", "a", "b", "depends_on")],
        }
    }

    #[test]
    fn hash_ignores_listing_order() {
        let data = sample();
        let mut reordered = data.clone();
        reordered.services.reverse();

        assert_eq!(
            compute_environment_hash(&data).unwrap(),
            compute_environment_hash(&reordered).unwrap()
        );
    }

    #[test]
    fn hash_changes_with_content() {
        let data = sample();
        let mut edited = data.clone();
        edited.services[0].name = "Renamed".to_string();

        assert_ne!(
            compute_environment_hash(&data).unwrap(),
            compute_environment_hash(&edited).unwrap()
        );
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        assert_eq!(short_fingerprint("a/b"), short_fingerprint("a/b"));
        assert_eq!(short_fingerprint("a/b").len(), 8);
        assert_ne!(short_fingerprint("a/b"), short_fingerprint("a:b"));
    }
}
