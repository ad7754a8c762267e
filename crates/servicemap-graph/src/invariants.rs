//! Predicates checked synchronously on every mutation.
//!
//! The checks run against the draft graph a batch is being applied to, so a
//! later operation in the same batch sees the effects of earlier ones.

use servicemap_core::config::StoreConfig;
use servicemap_core::{Relationship, RelationshipId, Service};

use crate::environment::EnvironmentGraph;
use crate::error::{Result, StoreError};

/// Mandatory service attributes must be non-blank.
pub fn check_service_fields(service: &Service) -> Result<()> {
    let missing = service.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!(
            "service is missing required field(s): {}",
            missing.join(", ")
        )))
    }
}

/// A new service must have a fresh id and fit under the service cap.
pub fn check_new_service(
    graph: &EnvironmentGraph,
    service: &Service,
    limits: &StoreConfig,
) -> Result<()> {
    check_service_fields(service)?;
    if graph.contains_service(service.id.as_str()) {
        return Err(StoreError::DuplicateServiceId(service.id.clone()));
    }
    if graph.service_count() >= limits.max_services_per_environment {
        return Err(StoreError::CapacityExceeded {
            resource: "services per environment",
            limit: limits.max_services_per_environment,
        });
    }
    Ok(())
}

/// A new relationship must have a fresh id, fit under the relationship cap,
/// and satisfy [`check_relationship`].
pub fn check_new_relationship(
    graph: &EnvironmentGraph,
    rel: &Relationship,
    limits: &StoreConfig,
) -> Result<()> {
    check_relationship_fields(rel)?;
    if graph.relationship(rel.id.as_str()).is_some() {
        return Err(StoreError::DuplicateRelationshipId(rel.id.clone()));
    }
    if graph.relationship_count() >= limits.max_relationships_per_environment {
        return Err(StoreError::CapacityExceeded {
            resource: "relationships per environment",
            limit: limits.max_relationships_per_environment,
        });
    }
    check_relationship(graph, rel, None)
}

/// Self-loop, endpoint existence, and edge-key uniqueness.
///
/// `replacing` names a relationship that is about to be replaced by `rel`;
/// its own edge key does not count as a duplicate.
pub fn check_relationship(
    graph: &EnvironmentGraph,
    rel: &Relationship,
    replacing: Option<&RelationshipId>,
) -> Result<()> {
    check_relationship_fields(rel)?;

    if rel.source == rel.target {
        return Err(StoreError::SelfLoop {
            relationship: rel.id.clone(),
            service: rel.source.clone(),
        });
    }

    for endpoint in [&rel.source, &rel.target] {
        if !graph.contains_service(endpoint.as_str()) {
            return Err(StoreError::DanglingEndpoint {
                relationship: rel.id.clone(),
                missing: endpoint.clone(),
            });
        }
    }

    let key = rel.edge_key();
    let own_key = replacing
        .and_then(|id| graph.relationship(id.as_str()))
        .is_some_and(|existing| existing.edge_key() == key);
    if graph.contains_edge(&key) && !own_key {
        return Err(StoreError::DuplicateEdge(key));
    }

    Ok(())
}

fn check_relationship_fields(rel: &Relationship) -> Result<()> {
    let missing = rel.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!(
            "relationship is missing required field(s): {}",
            missing.join(", ")
        )))
    }
}

/// Referential checks over a whole graph: every endpoint exists, no
/// relationship is a self-loop, and the incident index agrees with the
/// relationships. Id and edge-key uniqueness are structural in
/// [`EnvironmentGraph`] and need no audit.
pub fn audit(graph: &EnvironmentGraph) -> Vec<String> {
    let mut violations = Vec::new();
    for rel in graph.relationships() {
        if rel.source == rel.target {
            violations.push(format!("relationship {} is a self-loop on {}", rel.id, rel.source));
            continue;
        }
        for endpoint in [&rel.source, &rel.target] {
            if !graph.contains_service(endpoint.as_str()) {
                violations.push(format!(
                    "relationship {} references missing service {}",
                    rel.id, endpoint
                ));
            }
        }
    }

    // The incident index must list exactly the edges touching each service.
    let mut indexed = 0;
    for service in graph.services() {
        let id = service.id.as_str();
        for rel in graph.incident(id) {
            if !rel.touches(id) {
                violations.push(format!("relationship {} indexed under unrelated service {id}", rel.id));
            }
        }
        indexed += graph.incident_count(id);
    }
    let expected: usize = graph
        .relationships()
        .map(|rel| {
            let ends = if rel.source == rel.target { 1 } else { 2 };
            [&rel.source, &rel.target][..ends]
                .iter()
                .filter(|endpoint| graph.contains_service(endpoint.as_str()))
                .count()
        })
        .sum();
    if indexed != expected {
        violations.push(format!(
            "incident index holds {indexed} entries, relationships need {expected}"
        ));
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use servicemap_core::EnvironmentData;

    fn graph() -> EnvironmentGraph {
        EnvironmentGraph::from_data(&EnvironmentData {
            services: vec![Service::new("a", "A"), Service::new("b", "B")],
            relationships: vec![Relationship::new("r1", "a", "b", "depends_on")],
        })
        .unwrap()
    }

    #[test]
    fn test_self_loop_rejected() {
        let rel = Relationship::new("r2", "a", "a", "depends_on");
        let err = check_new_relationship(&graph(), &rel, &StoreConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::SelfLoop { .. }));
    }

    #[test]
    fn test_dangling_endpoint_rejected() {
        let rel = Relationship::new("r2", "a", "ghost", "depends_on");
        let err = check_new_relationship(&graph(), &rel, &StoreConfig::default()).unwrap_err();
        match err {
            StoreError::DanglingEndpoint { missing, .. } => assert_eq!(missing.as_str(), "ghost"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_edge_rejected_unless_replacing_itself() {
        let g = graph();
        let dup = Relationship::new("r2", "a", "b", "depends_on");
        let err = check_relationship(&g, &dup, None).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEdge(_)));

        let same = Relationship::new("r1", "a", "b", "depends_on");
        assert!(check_relationship(&g, &same, Some(&"r1".into())).is_ok());

        // Same key under another type is a distinct edge.
        let other_type = Relationship::new("r2", "a", "b", "reads_from");
        assert!(check_relationship(&g, &other_type, None).is_ok());
    }

    #[test]
    fn test_capacity_enforced() {
        let limits = StoreConfig {
            max_services_per_environment: 2,
            ..StoreConfig::default()
        };
        let err = check_new_service(&graph(), &Service::new("c", "C"), &limits).unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { limit: 2, .. }));
    }

    #[test]
    fn test_blank_fields_rejected() {
        let err = check_service_fields(&Service::new("", "Nameless")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let rel = Relationship::new("r9", "a", " ", "depends_on");
        let err = check_new_relationship(&graph(), &rel, &StoreConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn test_audit_clean_graph() {
        assert!(audit(&graph()).is_empty());
    }
}
