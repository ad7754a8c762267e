//! Read operations. Every read works on one committed snapshot and returns
//! owned copies.

use servicemap_core::{EnvironmentName, Relationship, Service, ServiceId};

use crate::error::{Result, StoreError};
use crate::store::GraphStore;

impl GraphStore {
    pub fn get_service(&self, env: &EnvironmentName, id: &str) -> Result<Service> {
        self.snapshot(env)?
            .service(id)
            .cloned()
            .ok_or_else(|| StoreError::ServiceNotFound {
                environment: env.clone(),
                id: ServiceId::from(id),
            })
    }

    /// Services ordered by id.
    pub fn list_services(&self, env: &EnvironmentName) -> Result<Vec<Service>> {
        let graph = self.snapshot(env)?;
        tracing::debug!(environment = %env, count = graph.service_count(), "Listing services");
        Ok(graph.services().cloned().collect())
    }

    pub fn get_relationship(&self, env: &EnvironmentName, id: &str) -> Result<Relationship> {
        self.snapshot(env)?
            .relationship(id)
            .cloned()
            .ok_or_else(|| StoreError::RelationshipNotFound {
                environment: env.clone(),
                id: id.into(),
            })
    }

    /// Relationships ordered by id.
    pub fn list_relationships(&self, env: &EnvironmentName) -> Result<Vec<Relationship>> {
        let graph = self.snapshot(env)?;
        tracing::debug!(environment = %env, count = graph.relationship_count(), "Listing relationships");
        Ok(graph.relationships().cloned().collect())
    }

    /// Relationships where `service` is source or target. An unknown service
    /// simply has none.
    pub fn relationships_for_service(
        &self,
        env: &EnvironmentName,
        service: &str,
    ) -> Result<Vec<Relationship>> {
        let graph = self.snapshot(env)?;
        Ok(graph.incident(service).cloned().collect())
    }

    /// Services whose id, name, description, owner, team, or tags contain
    /// `query`, ignoring case. An empty query matches everything.
    pub fn search_services(&self, env: &EnvironmentName, query: &str) -> Result<Vec<Service>> {
        let graph = self.snapshot(env)?;
        let query = query.trim();
        let hits: Vec<Service> = graph
            .services()
            .filter(|s| query.is_empty() || s.matches_search(query))
            .cloned()
            .collect();
        tracing::debug!(environment = %env, query, hits = hits.len(), "Service search");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use servicemap_core::config::StoreConfig;

    #[test]
    fn test_reads_return_copies_in_id_order() {
        let store = GraphStore::new(StoreConfig::default());
        let env = EnvironmentName::from("dev");
        store.create_environment(&env).unwrap();
        for id in ["zeta", "alpha", "mid"] {
            store.create_service(&env, Service::new(id, id)).unwrap();
        }

        let mut listed = store.list_services(&env).unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);

        // Mutating a returned copy does not reach the store.
        listed[0].name = "changed".to_string();
        assert_eq!(store.get_service(&env, "alpha").unwrap().name, "alpha");
    }

    #[test]
    fn test_search_services() {
        let store = GraphStore::new(StoreConfig::default());
        let env = EnvironmentName::from("dev");
        store.create_environment(&env).unwrap();
        store
            .create_service(&env, Service::new("user-api", "User API").with_tag("auth"))
            .unwrap();
        store
            .create_service(&env, Service::new("orders", "Orders"))
            .unwrap();

        assert_eq!(store.search_services(&env, "AUTH").unwrap().len(), 1);
        assert_eq!(store.search_services(&env, "").unwrap().len(), 2);
        assert!(store.search_services(&env, "billing").unwrap().is_empty());
    }

    #[test]
    fn test_reads_on_unknown_environment() {
        let store = GraphStore::new(StoreConfig::default());
        let env = EnvironmentName::from("nope");
        assert!(matches!(
            store.list_services(&env),
            Err(StoreError::EnvironmentNotFound(_))
        ));
        assert!(store.relationships_for_service(&env, "a").is_err());
    }
}
