//! servicemap-core: Shared types, configuration, and error handling for servicemap.
//!
//! This crate provides the foundational types used across all servicemap components:
//! - Services (nodes) and relationships (directed typed edges)
//! - Identifier newtypes and open vocabularies
//! - The error-kind taxonomy exposed at the command boundary
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use error::{ErrorKind, ServiceMapError};
pub use types::{
    EdgeKey, EnvironmentData, EnvironmentName, Relationship, RelationshipId, RelationshipPatch,
    RelationshipType, Service, ServiceId, ServiceStatus, ServiceType, ServiceUpdate,
};
