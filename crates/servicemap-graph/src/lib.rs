//! servicemap-graph: the environment-scoped service graph store.
//!
//! This crate is the single mutation point for service graph state. Every
//! write flows through [`GraphStore`], is checked against the store
//! invariants, committed as one batch, persisted, and only then published to
//! readers as a new immutable snapshot.

pub mod environment;
pub mod error;
pub mod invariants;
pub mod mutations;
pub mod queries;
pub mod store;
pub mod tx;

pub use environment::EnvironmentGraph;
pub use error::{Result, StoreError};
pub use store::GraphStore;
pub use tx::Batch;
