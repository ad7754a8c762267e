//! Dense adjacency view of one environment for whole-graph scans.
//!
//! Built from plain [`EnvironmentData`], so it tolerates the inconsistencies
//! the validation engine exists to report: the first service with a given id
//! wins, and edges to unknown services or self-loops are left out.

use std::collections::{HashMap, VecDeque};

use servicemap_core::config::ValidationConfig;
use servicemap_core::{EnvironmentData, ServiceId};

pub struct ServiceGraph {
    /// Service ids, indexed by dense index, in first-appearance order.
    pub ids: Vec<ServiceId>,
    /// Map from service id → dense index.
    pub node_index: HashMap<String, usize>,
    /// `outgoing[i]` = targets of every relationship leaving node `i`.
    pub outgoing: Vec<Vec<usize>>,
    /// `dependencies[i]` = targets of hard-dependency relationships only.
    pub dependencies: Vec<Vec<usize>>,
    /// Relationships touching node `i` in either direction, dangling ones included.
    pub degree: Vec<usize>,
}

impl ServiceGraph {
    pub fn from_data(data: &EnvironmentData, config: &ValidationConfig) -> Self {
        let mut ids = Vec::with_capacity(data.services.len());
        let mut node_index = HashMap::with_capacity(data.services.len());

        for service in &data.services {
            if service.id.is_blank() || node_index.contains_key(service.id.as_str()) {
                continue;
            }
            node_index.insert(service.id.0.clone(), ids.len());
            ids.push(service.id.clone());
        }

        let n = ids.len();
        let mut outgoing = vec![Vec::new(); n];
        let mut dependencies = vec![Vec::new(); n];
        let mut degree = vec![0; n];

        for rel in &data.relationships {
            let src = node_index.get(rel.source.as_str()).copied();
            let tgt = node_index.get(rel.target.as_str()).copied();

            if let Some(s) = src {
                degree[s] += 1;
            }
            if let Some(t) = tgt {
                if src != Some(t) {
                    degree[t] += 1;
                }
            }

            if let (Some(s), Some(t)) = (src, tgt) {
                if s == t {
                    continue;
                }
                outgoing[s].push(t);
                if config.is_dependency_type(rel.relationship_type.as_str()) {
                    dependencies[s].push(t);
                }
            }
        }

        Self {
            ids,
            node_index,
            outgoing,
            dependencies,
            degree,
        }
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// Nodes reachable from `roots` along directed edges, roots included.
    pub fn reachable_from(&self, roots: &[usize]) -> Vec<bool> {
        let mut seen = vec![false; self.node_count()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for &root in roots {
            if !seen[root] {
                seen[root] = true;
                queue.push_back(root);
            }
        }

        while let Some(node) = queue.pop_front() {
            for &next in &self.outgoing[node] {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        seen
    }
}
