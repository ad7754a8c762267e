//! Pending changes committed or discarded as one unit.
//!
//! A [`Batch`] is applied to a private draft of an environment graph. If any
//! operation fails its invariant check the draft is dropped and the committed
//! snapshot is untouched, so a multi-step mutation is never half applied.

use servicemap_core::config::StoreConfig;
use servicemap_core::{Relationship, RelationshipId, Service, ServiceId};

use crate::environment::EnvironmentGraph;
use crate::error::{Result, StoreError};
use crate::invariants;

#[derive(Debug, Clone)]
pub enum Op {
    InsertService(Service),
    ReplaceService(Service),
    /// Removes the service only; incident relationships are left alone.
    RemoveService(ServiceId),
    InsertRelationship(Relationship),
    ReplaceRelationship(Relationship),
    RemoveRelationship(RelationshipId),
}

#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<Op>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Op) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn insert_service(mut self, service: Service) -> Self {
        self.ops.push(Op::InsertService(service));
        self
    }

    pub fn replace_service(mut self, service: Service) -> Self {
        self.ops.push(Op::ReplaceService(service));
        self
    }

    pub fn remove_service(mut self, id: impl Into<ServiceId>) -> Self {
        self.ops.push(Op::RemoveService(id.into()));
        self
    }

    pub fn insert_relationship(mut self, rel: Relationship) -> Self {
        self.ops.push(Op::InsertRelationship(rel));
        self
    }

    pub fn replace_relationship(mut self, rel: Relationship) -> Self {
        self.ops.push(Op::ReplaceRelationship(rel));
        self
    }

    pub fn remove_relationship(mut self, id: impl Into<RelationshipId>) -> Self {
        self.ops.push(Op::RemoveRelationship(id.into()));
        self
    }

    /// Every relationship touching `service`, then the service itself.
    pub fn cascade_delete(graph: &EnvironmentGraph, service: &str) -> Self {
        let mut batch = Self::new();
        for rel in graph.incident(service) {
            batch.push(Op::RemoveRelationship(rel.id.clone()));
        }
        batch.remove_service(service)
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every operation to `draft` in order, checking each one.
    ///
    /// On error `draft` is left partially modified; the caller must discard it.
    pub fn apply(self, draft: &mut EnvironmentGraph, limits: &StoreConfig) -> Result<()> {
        for op in self.ops {
            match op {
                Op::InsertService(service) => {
                    invariants::check_new_service(draft, &service, limits)?;
                    draft.insert_service(service);
                }
                Op::ReplaceService(service) => {
                    invariants::check_service_fields(&service)?;
                    if !draft.contains_service(service.id.as_str()) {
                        return Err(missing_service(&service.id));
                    }
                    draft.insert_service(service);
                }
                Op::RemoveService(id) => {
                    draft
                        .remove_service(id.as_str())
                        .ok_or_else(|| missing_service(&id))?;
                }
                Op::InsertRelationship(rel) => {
                    invariants::check_new_relationship(draft, &rel, limits)?;
                    draft.insert_relationship(rel);
                }
                Op::ReplaceRelationship(rel) => {
                    if draft.relationship(rel.id.as_str()).is_none() {
                        return Err(missing_relationship(&rel.id));
                    }
                    invariants::check_relationship(draft, &rel, Some(&rel.id))?;
                    draft.remove_relationship(rel.id.as_str());
                    draft.insert_relationship(rel);
                }
                Op::RemoveRelationship(id) => {
                    draft
                        .remove_relationship(id.as_str())
                        .ok_or_else(|| missing_relationship(&id))?;
                }
            }
        }
        Ok(())
    }
}

// The store rewrites these with the environment name before returning them.
fn missing_service(id: &ServiceId) -> StoreError {
    StoreError::ServiceNotFound {
        environment: Default::default(),
        id: id.clone(),
    }
}

fn missing_relationship(id: &RelationshipId) -> StoreError {
    StoreError::RelationshipNotFound {
        environment: Default::default(),
        id: id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use servicemap_core::EnvironmentData;

    fn graph() -> EnvironmentGraph {
        EnvironmentGraph::from_data(&EnvironmentData {
            services: vec![
                Service::new("a", "A"),
                Service::new("b", "B"),
                Service::new("c", "C"),
            ],
            relationships: vec![
                Relationship::new("r1", "a", "b", "depends_on"),
                Relationship::new("r2", "c", "a", "reads_from"),
                Relationship::new("r3", "b", "c", "depends_on"),
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_cascade_removes_incident_edges_then_service() {
        let g = graph();
        let batch = Batch::cascade_delete(&g, "a");
        assert_eq!(batch.len(), 3);
        assert!(matches!(batch.ops().last(), Some(Op::RemoveService(id)) if id.as_str() == "a"));

        let mut draft = g.clone();
        batch.apply(&mut draft, &StoreConfig::default()).unwrap();
        assert!(draft.service("a").is_none());
        assert_eq!(draft.relationship_count(), 1);
        assert_eq!(draft.incident_count("a"), 0);
        assert!(draft.relationships().all(|r| !r.touches("a")));
        assert!(invariants::audit(&draft).is_empty());
    }

    #[test]
    fn test_later_ops_see_earlier_ones() {
        let mut draft = graph();
        Batch::new()
            .insert_service(Service::new("d", "D"))
            .insert_relationship(Relationship::new("r4", "c", "d", "depends_on"))
            .apply(&mut draft, &StoreConfig::default())
            .unwrap();
        assert_eq!(draft.incident_count("d"), 1);
    }

    #[test]
    fn test_failure_reports_first_bad_op() {
        let mut draft = graph();
        let err = Batch::new()
            .insert_service(Service::new("d", "D"))
            .insert_relationship(Relationship::new("r4", "d", "d", "depends_on"))
            .apply(&mut draft, &StoreConfig::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::SelfLoop { .. }));
    }

    #[test]
    fn test_replace_relationship_moves_endpoint() {
        let mut draft = graph();
        Batch::new()
            .replace_relationship(Relationship::new("r1", "a", "c", "depends_on"))
            .apply(&mut draft, &StoreConfig::default())
            .unwrap();
        assert_eq!(draft.incident_count("b"), 1);
        assert_eq!(draft.incident_count("c"), 3);
    }
}
