use servicemap_core::{EdgeKey, EnvironmentName, ErrorKind, RelationshipId, ServiceId};
use servicemap_storage::StorageError;

/// Errors from graph store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Environment not found: {0}")]
    EnvironmentNotFound(EnvironmentName),

    #[error("Service not found: {id} in environment {environment}")]
    ServiceNotFound {
        environment: EnvironmentName,
        id: ServiceId,
    },

    #[error("Relationship not found: {id} in environment {environment}")]
    RelationshipNotFound {
        environment: EnvironmentName,
        id: RelationshipId,
    },

    #[error("Environment already exists: {0}")]
    EnvironmentExists(EnvironmentName),

    #[error("Service id already in use: {0}")]
    DuplicateServiceId(ServiceId),

    #[error("Relationship id already in use: {0}")]
    DuplicateRelationshipId(RelationshipId),

    #[error("Relationship already exists: {0}")]
    DuplicateEdge(EdgeKey),

    #[error("Relationship {relationship} references missing service {missing}")]
    DanglingEndpoint {
        relationship: RelationshipId,
        missing: ServiceId,
    },

    #[error("Relationship {relationship} points service {service} at itself")]
    SelfLoop {
        relationship: RelationshipId,
        service: ServiceId,
    },

    #[error("Capacity exceeded: at most {limit} {resource}")]
    CapacityExceeded { resource: &'static str, limit: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Environment {environment} failed integrity checks on load: {}", violations.join("; "))]
    IntegrityCorrupted {
        environment: EnvironmentName,
        violations: Vec<String>,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Graph store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::EnvironmentNotFound(_)
            | StoreError::ServiceNotFound { .. }
            | StoreError::RelationshipNotFound { .. } => ErrorKind::NotFound,
            StoreError::EnvironmentExists(_) => ErrorKind::AlreadyExists,
            StoreError::DuplicateServiceId(_) | StoreError::DuplicateRelationshipId(_) => {
                ErrorKind::DuplicateId
            }
            StoreError::DuplicateEdge(_) => ErrorKind::DuplicateEdge,
            StoreError::DanglingEndpoint { .. } => ErrorKind::DanglingEndpoint,
            StoreError::SelfLoop { .. } => ErrorKind::SelfLoop,
            StoreError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            StoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            StoreError::IntegrityCorrupted { .. } => ErrorKind::IntegrityCorrupted,
            StoreError::Persistence(e) => match e.kind() {
                // A name the backend cannot store is still the caller's to fix.
                ErrorKind::InvalidInput | ErrorKind::AlreadyExists => e.kind(),
                _ => ErrorKind::Persistence,
            },
            StoreError::LockPoisoned => ErrorKind::Internal,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = StoreError::ServiceNotFound {
            environment: "dev".into(),
            id: "a".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            StoreError::DuplicateRelationshipId("r1".into()).kind(),
            ErrorKind::DuplicateId
        );
        assert_eq!(
            StoreError::Persistence(StorageError::Unavailable("disk".into())).kind(),
            ErrorKind::Persistence
        );
        assert_eq!(
            StoreError::Persistence(StorageError::InvalidName {
                name: "a/b".into(),
                reason: "name contains a path separator",
            })
            .kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_integrity_message_lists_violations() {
        let err = StoreError::IntegrityCorrupted {
            environment: "prod".into(),
            violations: vec!["one".into(), "two".into()],
        };
        assert!(err.to_string().contains("one; two"));
    }
}
