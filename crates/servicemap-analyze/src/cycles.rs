//! Cycle detection over hard-dependency edges.
//!
//! Strongly connected components (Tarjan, iterative) narrow the search, then
//! every elementary cycle inside a non-trivial component is enumerated from
//! its smallest service id. Each cycle is therefore reported once, already
//! rotated, and every service that sits on a cycle appears in at least one.

use std::collections::HashSet;

use crate::graph::ServiceGraph;

/// Enumeration stops after this many cycles.
pub const MAX_CYCLES: usize = 1_000;

const UNVISITED: usize = usize::MAX;

/// Distinct dependency cycles as node indices in edge order, each starting at
/// its smallest service id. Ordered by that id, then by discovery.
pub fn find_cycles(graph: &ServiceGraph) -> Vec<Vec<usize>> {
    let component = strongly_connected(graph);

    // Rank nodes by id so a cycle is only ever entered from its smallest member.
    let mut order: Vec<usize> = (0..graph.node_count()).collect();
    order.sort_by(|a, b| graph.ids[*a].cmp(&graph.ids[*b]));
    let mut rank = vec![0usize; order.len()];
    for (r, &node) in order.iter().enumerate() {
        rank[node] = r;
    }

    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut cycles = Vec::new();

    for &start in &order {
        let in_scope = |w: usize| component[w] == component[start] && rank[w] >= rank[start];
        if !graph.dependencies[start].iter().any(|&w| in_scope(w)) {
            continue;
        }

        let mut on_path = vec![false; graph.node_count()];
        let mut path = vec![start];
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        on_path[start] = true;

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            let Some(&target) = graph.dependencies[node].get(next) else {
                on_path[node] = false;
                stack.pop();
                path.pop();
                continue;
            };
            top.1 += 1;

            if !in_scope(target) {
                continue;
            }
            if target == start {
                if seen.insert(path.clone()) {
                    cycles.push(path.clone());
                    if cycles.len() >= MAX_CYCLES {
                        tracing::warn!(limit = MAX_CYCLES, "Cycle enumeration truncated");
                        return cycles;
                    }
                }
            } else if !on_path[target] {
                on_path[target] = true;
                path.push(target);
                stack.push((target, 0));
            }
        }
    }

    cycles
}

/// Component number of every node over dependency edges.
fn strongly_connected(graph: &ServiceGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut component = vec![UNVISITED; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0;
    let mut next_component = 0;

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }

        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        let mut work: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(top) = work.last_mut() {
            let (node, next) = *top;
            if let Some(&w) = graph.dependencies[node].get(next) {
                top.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    work.push((w, 0));
                } else if on_stack[w] {
                    lowlink[node] = lowlink[node].min(index[w]);
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[node]);
            }
            if lowlink[node] == index[node] {
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component[w] = next_component;
                    if w == node {
                        break;
                    }
                }
                next_component += 1;
            }
        }
    }

    component
}

#[cfg(test)]
mod tests {
    use super::*;
    use servicemap_core::config::ValidationConfig;
    use servicemap_core::{EnvironmentData, Relationship, Service};

    fn build(services: &[&str], edges: &[(&str, &str, &str)]) -> ServiceGraph {
        let data = EnvironmentData {
            services: services.iter().map(|id| Service::new(*id, *id)).collect(),
            relationships: edges
                .iter()
                .enumerate()
                .map(|(i, (s, t, ty))| Relationship::new(format!("r{i}"), *s, *t, *ty))
                .collect(),
        };
        ServiceGraph::from_data(&data, &ValidationConfig::default())
    }

    fn named(graph: &ServiceGraph, cycles: &[Vec<usize>]) -> Vec<Vec<String>> {
        cycles
            .iter()
            .map(|c| c.iter().map(|&i| graph.ids[i].0.clone()).collect())
            .collect()
    }

    #[test]
    fn test_triangle() {
        let g = build(
            &["x", "y", "z"],
            &[("x", "y", "depends_on"), ("y", "z", "depends_on"), ("z", "x", "depends_on")],
        );
        assert_eq!(named(&g, &find_cycles(&g)), vec![vec!["x", "y", "z"]]);
    }

    #[test]
    fn test_rotation_starts_at_smallest_id() {
        // DFS enters at "m" but the report starts at "a".
        let g = build(
            &["m", "a", "q"],
            &[("m", "q", "depends_on"), ("q", "a", "depends_on"), ("a", "m", "depends_on")],
        );
        assert_eq!(named(&g, &find_cycles(&g)), vec![vec!["a", "m", "q"]]);
    }

    #[test]
    fn test_dag_has_no_cycles() {
        let g = build(
            &["a", "b", "c", "d"],
            &[
                ("a", "b", "depends_on"),
                ("a", "c", "depends_on"),
                ("b", "d", "depends_on"),
                ("c", "d", "depends_on"),
            ],
        );
        assert!(find_cycles(&g).is_empty());
    }

    #[test]
    fn test_non_dependency_edges_ignored() {
        let g = build(
            &["a", "b"],
            &[("a", "b", "depends_on"), ("b", "a", "reads_from")],
        );
        assert!(find_cycles(&g).is_empty());
    }

    #[test]
    fn test_two_cycles_sharing_a_node() {
        let g = build(
            &["a", "b", "c"],
            &[
                ("a", "b", "depends_on"),
                ("b", "a", "depends_on"),
                ("b", "c", "depends_on"),
                ("c", "b", "depends_on"),
            ],
        );
        let cycles = named(&g, &find_cycles(&g));
        assert_eq!(cycles, vec![vec!["a", "b"], vec!["b", "c"]]);
    }

    #[test]
    fn test_cycle_closed_through_cross_edge() {
        // a→c→b→a only closes through b, which the first cycle already finished.
        let g = build(
            &["a", "b", "c"],
            &[
                ("a", "b", "depends_on"),
                ("b", "a", "depends_on"),
                ("a", "c", "depends_on"),
                ("c", "b", "depends_on"),
            ],
        );
        let cycles = named(&g, &find_cycles(&g));
        assert_eq!(cycles, vec![vec!["a", "b"], vec!["a", "c", "b"]]);
    }

    #[test]
    fn test_parallel_dependency_edges_report_once() {
        let config = ValidationConfig {
            dependency_types: vec!["depends_on".into(), "authenticates_via".into()],
            ..ValidationConfig::default()
        };
        let data = EnvironmentData {
            services: vec![Service::new("a", "a"), Service::new("b", "b")],
            relationships: vec![
                Relationship::new("r1", "a", "b", "depends_on"),
                Relationship::new("r2", "a", "b", "authenticates_via"),
                Relationship::new("r3", "b", "a", "depends_on"),
            ],
        };
        let g = ServiceGraph::from_data(&data, &config);
        assert_eq!(named(&g, &find_cycles(&g)), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_components_keep_cycles_apart() {
        let g = build(
            &["a", "b", "c", "d", "e"],
            &[
                ("a", "b", "depends_on"),
                ("b", "a", "depends_on"),
                ("b", "c", "depends_on"),
                ("c", "d", "depends_on"),
                ("d", "c", "depends_on"),
                ("d", "e", "depends_on"),
            ],
        );
        let component = strongly_connected(&g);
        assert_eq!(component[0], component[1]);
        assert_eq!(component[2], component[3]);
        assert_ne!(component[1], component[2]);
        assert_ne!(component[3], component[4]);

        let cycles = named(&g, &find_cycles(&g));
        assert_eq!(cycles, vec![vec!["a", "b"], vec!["c", "d"]]);
    }
}
