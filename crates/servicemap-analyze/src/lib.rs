//! servicemap-analyze: Read-side analysis over the service graph store.
//!
//! Neighborhood traversal answers "what is within N hops of this service",
//! the validation engine audits an environment for integrity issues, and
//! [`commands`] exposes every store and analysis operation as a JSON command.

pub mod commands;
pub mod cycles;
pub mod error;
pub mod graph;
pub mod neighborhood;
pub mod types;
pub mod validate;

pub use commands::{Command, Response};
pub use error::AnalyzeError;
pub use types::{IssueKind, IssueSeverity, Neighborhood, ValidationIssue, ValidationReport};

use std::sync::Arc;

use servicemap_core::config::{ValidationConfig, DEFAULT_NEIGHBORHOOD_DEPTH};
use servicemap_core::{EnvironmentName, ServiceId};
use servicemap_graph::GraphStore;

/// Runs traversal and validation against a shared graph store.
pub struct AnalysisEngine {
    store: Arc<GraphStore>,
    validation: ValidationConfig,
}

impl AnalysisEngine {
    /// Create a new engine with default validation settings.
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self {
            store,
            validation: ValidationConfig::default(),
        }
    }

    pub fn with_validation_config(mut self, config: ValidationConfig) -> Self {
        self.validation = config;
        self
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Services within `depth` hops of `center` (default 1), ignoring edge
    /// direction, plus every relationship among them.
    pub fn neighborhood(
        &self,
        env: &EnvironmentName,
        center: &str,
        depth: Option<usize>,
    ) -> error::Result<Neighborhood> {
        let depth = depth.unwrap_or(DEFAULT_NEIGHBORHOOD_DEPTH);
        let graph = self.store.snapshot(env)?;

        let result = neighborhood::compute_neighborhood(&graph, center, depth).ok_or_else(|| {
            AnalyzeError::ServiceNotFound {
                environment: env.clone(),
                id: ServiceId::from(center),
            }
        })?;

        tracing::debug!(
            environment = %env,
            center,
            depth,
            connected = result.connected.len(),
            relationships = result.relationships.len(),
            "Neighborhood computed"
        );
        Ok(result)
    }

    /// Audit one environment. Quarantined environments are audited from the
    /// data as loaded.
    pub fn validate(&self, env: &EnvironmentName) -> error::Result<ValidationReport> {
        let data = self.store.raw_environment(env)?;
        let report = validate::validate(&data, &self.validation);
        tracing::info!(
            environment = %env,
            errors = report.error_count,
            warnings = report.warning_count,
            info = report.info_count,
            "Environment validated"
        );
        Ok(report)
    }
}
