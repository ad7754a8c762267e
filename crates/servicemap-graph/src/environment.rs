//! One environment's committed graph.
//!
//! Services and relationships are kept in id-ordered maps so listings are
//! deterministic. Two indexes are maintained alongside them:
//! the set of `(source, target, type)` edge keys, and for every service id the
//! relationships that touch it. The incident index makes cascade delete and
//! neighborhood traversal proportional to the edges they touch.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use servicemap_core::{EdgeKey, EnvironmentData, Relationship, RelationshipId, Service, ServiceId};

use crate::invariants;

#[derive(Debug, Clone, Default)]
pub struct EnvironmentGraph {
    services: BTreeMap<ServiceId, Service>,
    relationships: BTreeMap<RelationshipId, Relationship>,
    edge_keys: HashSet<EdgeKey>,
    incident: HashMap<ServiceId, BTreeSet<RelationshipId>>,
}

impl EnvironmentGraph {
    /// Build a graph from raw data, refusing anything that breaks a store
    /// invariant. The error lists every violation found.
    pub fn from_data(data: &EnvironmentData) -> Result<Self, Vec<String>> {
        let mut graph = Self::default();
        let mut violations = Vec::new();

        for service in &data.services {
            if graph.services.contains_key(&service.id) {
                violations.push(format!("duplicate service id {}", service.id));
                continue;
            }
            graph.insert_service(service.clone());
        }

        for rel in &data.relationships {
            if graph.relationships.contains_key(&rel.id) {
                violations.push(format!("duplicate relationship id {}", rel.id));
                continue;
            }
            if graph.contains_edge(&rel.edge_key()) {
                violations.push(format!("duplicate relationship {}", rel.edge_key()));
                continue;
            }
            graph.insert_relationship(rel.clone());
        }

        violations.extend(invariants::audit(&graph));

        if violations.is_empty() {
            Ok(graph)
        } else {
            Err(violations)
        }
    }

    /// Plain lists for persistence and validation, ordered by id.
    pub fn to_data(&self) -> EnvironmentData {
        EnvironmentData {
            services: self.services.values().cloned().collect(),
            relationships: self.relationships.values().cloned().collect(),
        }
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.get(id)
    }

    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationships.get(id)
    }

    pub fn contains_service(&self, id: &str) -> bool {
        self.services.contains_key(id)
    }

    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edge_keys.contains(key)
    }

    /// Services ordered by id.
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    /// Relationships ordered by id.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Relationships where `service` is source or target, ordered by id.
    /// Works for ids that no longer name a service, so dangling edges left by
    /// a plain delete remain discoverable.
    pub fn incident(&self, service: &str) -> impl Iterator<Item = &Relationship> {
        self.incident
            .get(service)
            .into_iter()
            .flatten()
            .filter_map(|id| self.relationships.get(id))
    }

    pub fn incident_count(&self, service: &str) -> usize {
        self.incident.get(service).map_or(0, BTreeSet::len)
    }

    // ── Raw mutators (unchecked; callers go through a Batch) ─────

    pub(crate) fn insert_service(&mut self, service: Service) {
        self.services.insert(service.id.clone(), service);
    }

    pub(crate) fn remove_service(&mut self, id: &str) -> Option<Service> {
        self.services.remove(id)
    }

    pub(crate) fn insert_relationship(&mut self, rel: Relationship) {
        self.edge_keys.insert(rel.edge_key());
        for endpoint in [&rel.source, &rel.target] {
            self.incident
                .entry(endpoint.clone())
                .or_default()
                .insert(rel.id.clone());
        }
        self.relationships.insert(rel.id.clone(), rel);
    }

    pub(crate) fn remove_relationship(&mut self, id: &str) -> Option<Relationship> {
        let rel = self.relationships.remove(id)?;
        self.edge_keys.remove(&rel.edge_key());
        for endpoint in [&rel.source, &rel.target] {
            if let Some(ids) = self.incident.get_mut(endpoint.as_str()) {
                ids.remove(id);
                if ids.is_empty() {
                    self.incident.remove(endpoint.as_str());
                }
            }
        }
        Some(rel)
    }
}
