//! Bounded-depth neighborhood traversal.
//!
//! Undirected BFS from a center service over the incident index of a
//! committed snapshot. Each service is visited once and only the edges of
//! visited services are scanned, so work is proportional to the
//! neighborhood, not the environment.

use std::collections::{BTreeMap, HashSet, VecDeque};

use servicemap_graph::EnvironmentGraph;

use crate::types::Neighborhood;

/// The induced subgraph within `depth` hops of `center`, ignoring edge
/// direction. Returns `None` if `center` is not a service in `graph`.
pub fn compute_neighborhood(
    graph: &EnvironmentGraph,
    center: &str,
    depth: usize,
) -> Option<Neighborhood> {
    let center_service = graph.service(center)?;

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(center_service.id.as_str());
    let mut order: Vec<&str> = vec![center_service.id.as_str()];

    // BFS queue: (service_id, hops)
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    queue.push_back((center_service.id.as_str(), 0));

    while let Some((node, hops)) = queue.pop_front() {
        if hops >= depth {
            continue;
        }
        for rel in graph.incident(node) {
            let other = if rel.source.as_str() == node {
                rel.target.as_str()
            } else {
                rel.source.as_str()
            };
            if visited.contains(other) || !graph.contains_service(other) {
                continue;
            }
            visited.insert(other);
            order.push(other);
            queue.push_back((other, hops + 1));
        }
    }

    // Induced edges: any incident edge of a visited node whose other end was
    // also visited.
    let mut relationships = BTreeMap::new();
    for &node in &order {
        for rel in graph.incident(node) {
            if visited.contains(rel.source.as_str()) && visited.contains(rel.target.as_str()) {
                relationships.entry(rel.id.clone()).or_insert_with(|| rel.clone());
            }
        }
    }

    let mut connected: Vec<_> = order[1..]
        .iter()
        .filter_map(|id| graph.service(id).cloned())
        .collect();
    connected.sort_by(|a, b| a.id.cmp(&b.id));

    Some(Neighborhood {
        center: center_service.clone(),
        connected,
        relationships: relationships.into_values().collect(),
    })
}
