//! Configuration management for servicemap.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`SERVICEMAP__` prefix, `__` as section separator)
//! 2. Config file (`servicemap.toml` by default)
//! 3. Defaults

use serde::Deserialize;

use crate::error::ServiceMapError;

/// Neighborhood depth used when the caller does not give one.
pub const DEFAULT_NEIGHBORHOOD_DEPTH: usize = 1;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceMapConfig {
    pub store: StoreConfig,
    pub storage: StorageConfig,
    pub validation: ValidationConfig,
}

/// Capacity limits enforced by the graph store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_max_environments")]
    pub max_environments: usize,

    #[serde(default = "default_max_services")]
    pub max_services_per_environment: usize,

    #[serde(default = "default_max_relationships")]
    pub max_relationships_per_environment: usize,
}

/// Where and how environments are persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// What to do when a manifest hash does not match the loaded files.
    #[serde(default)]
    pub checksum_policy: ChecksumPolicy,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    Ignore,
    #[default]
    Warn,
    Reject,
}

/// Knobs for the validation engine.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Relationship types treated as hard dependencies for cycle detection.
    #[serde(default = "default_dependency_types")]
    pub dependency_types: Vec<String>,

    /// Services from which every other connected service should be reachable.
    /// Empty disables the reachability check; isolated services are still reported.
    #[serde(default)]
    pub entry_points: Vec<String>,
}

impl ValidationConfig {
    pub fn is_dependency_type(&self, relationship_type: &str) -> bool {
        self.dependency_types.iter().any(|t| t == relationship_type)
    }
}

fn default_max_environments() -> usize {
    64
}

fn default_max_services() -> usize {
    10_000
}

fn default_max_relationships() -> usize {
    50_000
}

fn default_data_dir() -> String {
    "./servicemap-data".to_string()
}

fn default_dependency_types() -> Vec<String> {
    vec!["depends_on".to_string()]
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_environments: default_max_environments(),
            max_services_per_environment: default_max_services(),
            max_relationships_per_environment: default_max_relationships(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            checksum_policy: ChecksumPolicy::default(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            dependency_types: default_dependency_types(),
            entry_points: Vec::new(),
        }
    }
}

/// Load configuration from `{file_prefix}.toml` (optional) and `SERVICEMAP__*`
/// environment variables.
pub fn load(file_prefix: &str) -> Result<ServiceMapConfig, ServiceMapError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("SERVICEMAP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let loaded: ServiceMapConfig = cfg.try_deserialize()?;
    tracing::debug!(
        file_prefix,
        data_dir = %loaded.storage.data_dir,
        dependency_types = ?loaded.validation.dependency_types,
        "Configuration loaded"
    );
    Ok(loaded)
}
