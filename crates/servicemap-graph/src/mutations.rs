//! Write operations on services and relationships.
//!
//! Each operation builds a [`Batch`] against the committed snapshot and hands
//! it to the store's commit path, so every write is all-or-nothing.

use servicemap_core::{
    EnvironmentName, Relationship, RelationshipPatch, Service, ServiceId, ServiceUpdate,
};

use crate::error::{Result, StoreError};
use crate::store::GraphStore;
use crate::tx::Batch;

impl GraphStore {
    // ── Services ─────────────────────────────────────────────────

    pub fn create_service(&self, env: &EnvironmentName, service: Service) -> Result<Service> {
        let created = self.commit(env, |_| {
            Ok((Batch::new().insert_service(service.clone()), service))
        })?;
        tracing::info!(environment = %env, service_id = %created.id, "Service created");
        Ok(created)
    }

    /// Replace every mutable attribute of service `id`. The id, and with it
    /// every relationship pointing at the service, is preserved.
    pub fn update_service(
        &self,
        env: &EnvironmentName,
        id: &str,
        update: ServiceUpdate,
    ) -> Result<Service> {
        let updated = self.commit(env, |graph| {
            let mut service = graph
                .service(id)
                .cloned()
                .ok_or_else(|| service_not_found(env, id))?;
            service.apply_update(update);
            Ok((Batch::new().replace_service(service.clone()), service))
        })?;
        tracing::info!(environment = %env, service_id = %id, "Service updated");
        Ok(updated)
    }

    /// Remove the service only. Relationships touching it are left dangling;
    /// callers that must keep the graph consistent use
    /// [`GraphStore::delete_service_cascade`].
    pub fn delete_service(&self, env: &EnvironmentName, id: &str) -> Result<Service> {
        let removed = self.commit(env, |graph| {
            let service = graph
                .service(id)
                .cloned()
                .ok_or_else(|| service_not_found(env, id))?;
            Ok((Batch::new().remove_service(id), service))
        })?;
        tracing::warn!(environment = %env, service_id = %id, "Service deleted without cascade");
        Ok(removed)
    }

    /// Remove the service and every relationship with it as source or target,
    /// as one unit. Returns the number of relationships removed.
    pub fn delete_service_cascade(&self, env: &EnvironmentName, id: &str) -> Result<usize> {
        let removed = self.commit(env, |graph| {
            if !graph.contains_service(id) {
                return Err(service_not_found(env, id));
            }
            let removed = graph.incident_count(id);
            Ok((Batch::cascade_delete(graph, id), removed))
        })?;
        tracing::info!(
            environment = %env,
            service_id = %id,
            relationships_removed = removed,
            "Service deleted"
        );
        Ok(removed)
    }

    // ── Relationships ────────────────────────────────────────────

    pub fn create_relationship(
        &self,
        env: &EnvironmentName,
        rel: Relationship,
    ) -> Result<Relationship> {
        let created = self.commit(env, |_| {
            Ok((Batch::new().insert_relationship(rel.clone()), rel))
        })?;
        tracing::info!(
            environment = %env,
            relationship_id = %created.id,
            edge = %created.edge_key(),
            "Relationship created"
        );
        Ok(created)
    }

    /// Apply `patch` to relationship `id`. Endpoint, self-loop, and duplicate
    /// edge rules are checked against the patched relationship.
    pub fn update_relationship(
        &self,
        env: &EnvironmentName,
        id: &str,
        patch: RelationshipPatch,
    ) -> Result<Relationship> {
        let updated = self.commit(env, |graph| {
            let current = graph
                .relationship(id)
                .ok_or_else(|| relationship_not_found(env, id))?;
            let patched = patch.applied_to(current);
            Ok((Batch::new().replace_relationship(patched.clone()), patched))
        })?;
        tracing::info!(
            environment = %env,
            relationship_id = %id,
            endpoints_changed = patch.touches_endpoints(),
            "Relationship updated"
        );
        Ok(updated)
    }

    pub fn delete_relationship(&self, env: &EnvironmentName, id: &str) -> Result<Relationship> {
        let removed = self.commit(env, |graph| {
            let rel = graph
                .relationship(id)
                .cloned()
                .ok_or_else(|| relationship_not_found(env, id))?;
            Ok((Batch::new().remove_relationship(id), rel))
        })?;
        tracing::info!(environment = %env, relationship_id = %id, "Relationship deleted");
        Ok(removed)
    }
}

fn service_not_found(env: &EnvironmentName, id: &str) -> StoreError {
    StoreError::ServiceNotFound {
        environment: env.clone(),
        id: ServiceId::from(id),
    }
}

fn relationship_not_found(env: &EnvironmentName, id: &str) -> StoreError {
    StoreError::RelationshipNotFound {
        environment: env.clone(),
        id: id.into(),
    }
}
