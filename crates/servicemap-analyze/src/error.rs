//! Error types for the servicemap-analyze crate.

use thiserror::Error;

use servicemap_core::{EnvironmentName, ErrorKind, ServiceId};
use servicemap_graph::StoreError;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Service not found: {id} in environment {environment}")]
    ServiceNotFound {
        environment: EnvironmentName,
        id: ServiceId,
    },

    #[error("No environment given and no current environment is set")]
    NoCurrentEnvironment,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalyzeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyzeError::Store(e) => e.kind(),
            AnalyzeError::ServiceNotFound { .. } | AnalyzeError::NoCurrentEnvironment => {
                ErrorKind::NotFound
            }
            AnalyzeError::InvalidCommand(_) | AnalyzeError::Serialization(_) => {
                ErrorKind::InvalidInput
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyzeError>;
