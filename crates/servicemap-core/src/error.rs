use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminant carried by every error that crosses the command boundary.
///
/// Callers branch on the kind, never on the message text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    DuplicateId,
    DuplicateEdge,
    DanglingEndpoint,
    SelfLoop,
    CapacityExceeded,
    InvalidInput,
    IntegrityCorrupted,
    Persistence,
    Config,
    Internal,
}

impl ErrorKind {
    /// Expected conditions the caller can fix by retrying with other input.
    pub fn is_recoverable(self) -> bool {
        !matches!(
            self,
            ErrorKind::IntegrityCorrupted | ErrorKind::Persistence | ErrorKind::Internal
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::DuplicateId => "duplicate_id",
            ErrorKind::DuplicateEdge => "duplicate_edge",
            ErrorKind::DanglingEndpoint => "dangling_endpoint",
            ErrorKind::SelfLoop => "self_loop",
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::IntegrityCorrupted => "integrity_corrupted",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Top-level error type for configuration and shared plumbing.
#[derive(Error, Debug)]
pub enum ServiceMapError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceMapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceMapError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<config::ConfigError> for ServiceMapError {
    fn from(e: config::ConfigError) -> Self {
        ServiceMapError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::DanglingEndpoint).unwrap();
        assert_eq!(json, "\"dangling_endpoint\"");
        assert_eq!(ErrorKind::DanglingEndpoint.to_string(), "dangling_endpoint");
    }

    #[test]
    fn fatal_kinds_are_not_recoverable() {
        assert!(ErrorKind::SelfLoop.is_recoverable());
        assert!(ErrorKind::CapacityExceeded.is_recoverable());
        assert!(!ErrorKind::IntegrityCorrupted.is_recoverable());
    }
}
