//! servicemap-storage: Durable persistence for environments.
//!
//! The graph store keeps its working state in memory and hands each committed
//! environment to an [`EnvironmentStore`]. Two backends are provided:
//! [`JsonDirStore`] writes human-editable JSON files with a BLAKE3 manifest for
//! tamper evidence, and [`MemoryStore`] keeps everything in process.

pub mod hash;
pub mod memory;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use servicemap_core::EnvironmentName;

pub use memory::MemoryStore;
pub use store::{EnvironmentStore, JsonDirStore, StorageError};

/// Written next to each environment's files on every save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub environment: EnvironmentName,
    pub saved_at: DateTime<Utc>,
    /// BLAKE3 hex digest of the canonical environment content.
    pub content_hash: String,
    pub service_count: usize,
    pub relationship_count: usize,
}
