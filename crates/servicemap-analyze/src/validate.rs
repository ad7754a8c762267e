//! Read-only integrity audit of one environment.
//!
//! Works on plain [`EnvironmentData`] so it can audit data the store refused
//! to load as well as committed snapshots. Nothing here returns an error:
//! every inconsistency becomes an issue in the report.

use std::collections::{HashMap, HashSet};

use servicemap_core::config::ValidationConfig;
use servicemap_core::{EnvironmentData, EdgeKey};

use crate::cycles::find_cycles;
use crate::graph::ServiceGraph;
use crate::types::{IssueKind, ValidationIssue, ValidationReport};

pub fn validate(data: &EnvironmentData, config: &ValidationConfig) -> ValidationReport {
    let mut issues = Vec::new();

    check_services(data, &mut issues);
    check_relationships(data, &mut issues);

    let graph = ServiceGraph::from_data(data, config);
    check_cycles(&graph, &mut issues);
    check_reachability(&graph, config, &mut issues);

    let report = ValidationReport::from_issues(issues);
    tracing::debug!(
        services = data.services.len(),
        relationships = data.relationships.len(),
        errors = report.error_count,
        warnings = report.warning_count,
        info = report.info_count,
        "Validation complete"
    );
    report
}

// ── Services ─────────────────────────────────────────────────────

fn check_services(data: &EnvironmentData, issues: &mut Vec<ValidationIssue>) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for service in &data.services {
        if !service.id.is_blank() {
            *counts.entry(service.id.as_str()).or_default() += 1;
        }
    }

    let mut reported = HashSet::new();
    for (position, service) in data.services.iter().enumerate() {
        let missing = service.missing_fields();
        if !missing.is_empty() {
            let label = if service.id.is_blank() {
                format!("Service at position {position}")
            } else {
                format!("Service '{}'", service.id)
            };
            issues.push(
                ValidationIssue::new(
                    IssueKind::MissingRequiredField,
                    format!("{label} is missing required field(s): {}", missing.join(", ")),
                    vec![service.id.0.clone()],
                )
                .with_suggestion("Fill in the missing fields or remove the service"),
            );
        }

        let id = service.id.as_str();
        let count = counts.get(id).copied().unwrap_or(0);
        if count > 1 && reported.insert(id) {
            issues.push(
                ValidationIssue::new(
                    IssueKind::DuplicateServiceId,
                    format!("Service id '{id}' is used by {count} services"),
                    vec![id.to_string()],
                )
                .with_suggestion("Give each service a unique id"),
            );
        }
    }
}

// ── Relationships ────────────────────────────────────────────────

fn check_relationships(data: &EnvironmentData, issues: &mut Vec<ValidationIssue>) {
    let service_ids: HashSet<&str> = data.services.iter().map(|s| s.id.as_str()).collect();

    let mut id_counts: HashMap<&str, usize> = HashMap::new();
    for rel in &data.relationships {
        if !rel.id.is_blank() {
            *id_counts.entry(rel.id.as_str()).or_default() += 1;
        }
    }

    let mut reported_ids = HashSet::new();
    let mut first_with_key: HashMap<EdgeKey, &str> = HashMap::new();

    for (position, rel) in data.relationships.iter().enumerate() {
        let id = rel.id.as_str();

        let missing = rel.missing_fields();
        if !missing.is_empty() {
            let label = if rel.id.is_blank() {
                format!("Relationship at position {position}")
            } else {
                format!("Relationship '{id}'")
            };
            issues.push(
                ValidationIssue::new(
                    IssueKind::MissingRequiredField,
                    format!("{label} is missing required field(s): {}", missing.join(", ")),
                    vec![id.to_string()],
                )
                .with_suggestion("Fill in the missing fields or remove the relationship"),
            );
        }

        let count = id_counts.get(id).copied().unwrap_or(0);
        if count > 1 && reported_ids.insert(id) {
            issues.push(
                ValidationIssue::new(
                    IssueKind::DuplicateRelationshipId,
                    format!("Relationship id '{id}' is used by {count} relationships"),
                    vec![id.to_string()],
                )
                .with_suggestion("Give each relationship a unique id"),
            );
        }

        if !rel.source.is_blank() && rel.source == rel.target {
            issues.push(
                ValidationIssue::new(
                    IssueKind::SelfLoop,
                    format!("Relationship '{id}' connects service '{}' to itself", rel.source),
                    vec![id.to_string(), rel.source.0.clone()],
                )
                .with_suggestion("Remove the relationship"),
            );
        }

        // Blank endpoints were reported as missing fields above.
        let mut missing_endpoints: Vec<&str> = [rel.source.as_str(), rel.target.as_str()]
            .into_iter()
            .filter(|e| !e.trim().is_empty() && !service_ids.contains(e))
            .collect();
        missing_endpoints.dedup();
        if !missing_endpoints.is_empty() {
            let mut affected = vec![id.to_string()];
            affected.extend(missing_endpoints.iter().map(|e| e.to_string()));
            issues.push(
                ValidationIssue::new(
                    IssueKind::OrphanedRelationship,
                    format!(
                        "Relationship '{id}' references missing service(s): {}",
                        missing_endpoints.join(", ")
                    ),
                    affected,
                )
                .with_suggestion("Create the missing service or delete the relationship"),
            );
        }

        if missing.is_empty() {
            let key = rel.edge_key();
            match first_with_key.get(&key) {
                Some(first) => issues.push(
                    ValidationIssue::new(
                        IssueKind::DuplicateEdge,
                        format!("Relationships '{first}' and '{id}' both describe {key}"),
                        vec![first.to_string(), id.to_string()],
                    )
                    .with_suggestion("Keep one of the two relationships"),
                ),
                None => {
                    first_with_key.insert(key, id);
                }
            }
        }

        if !rel.relationship_type.is_recommended() {
            issues.push(
                ValidationIssue::new(
                    IssueKind::InvalidRelationshipType,
                    format!(
                        "Relationship '{id}' uses non-standard type '{}'",
                        rel.relationship_type
                    ),
                    vec![id.to_string()],
                )
                .with_suggestion(format!(
                    "Use one of: {}",
                    servicemap_core::RelationshipType::RECOMMENDED.join(", ")
                )),
            );
        }
    }
}

// ── Graph-level checks ───────────────────────────────────────────

fn check_cycles(graph: &ServiceGraph, issues: &mut Vec<ValidationIssue>) {
    for cycle in find_cycles(graph) {
        let ids: Vec<String> = cycle.iter().map(|&i| graph.ids[i].0.clone()).collect();
        let mut path = ids.join(" -> ");
        path.push_str(" -> ");
        path.push_str(&ids[0]);

        issues.push(
            ValidationIssue::new(
                IssueKind::CircularDependency,
                format!("Circular dependency detected: {path}"),
                ids,
            )
            .with_suggestion("Break the cycle by removing or retyping one dependency"),
        );
    }
}

fn check_reachability(
    graph: &ServiceGraph,
    config: &ValidationConfig,
    issues: &mut Vec<ValidationIssue>,
) {
    for (i, id) in graph.ids.iter().enumerate() {
        if graph.degree[i] == 0 {
            issues.push(
                ValidationIssue::new(
                    IssueKind::UnreachableService,
                    format!("Service '{id}' has no relationships"),
                    vec![id.0.clone()],
                )
                .with_suggestion("Connect the service or remove it if unused"),
            );
        }
    }

    if config.entry_points.is_empty() {
        return;
    }

    let mut roots = Vec::new();
    for entry in &config.entry_points {
        match graph.node_index.get(entry.as_str()) {
            Some(&idx) => roots.push(idx),
            None => tracing::warn!(entry_point = %entry, "Configured entry point is not a service"),
        }
    }
    if roots.is_empty() {
        return;
    }

    let reachable = graph.reachable_from(&roots);
    for (i, id) in graph.ids.iter().enumerate() {
        // Isolated services were already reported.
        if reachable[i] || graph.degree[i] == 0 {
            continue;
        }
        issues.push(
            ValidationIssue::new(
                IssueKind::UnreachableService,
                format!("Service '{id}' is not reachable from any entry point"),
                vec![id.0.clone()],
            )
            .with_suggestion("Add a relationship from an entry point or mark it as one"),
        );
    }
}
