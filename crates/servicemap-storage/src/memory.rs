//! In-memory store for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use servicemap_core::types::sort_environments;
use servicemap_core::{EnvironmentData, EnvironmentName};

use crate::store::{validate_environment_name, EnvironmentStore, Result, StorageError};

/// Keeps every environment in a map. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    environments: RwLock<HashMap<EnvironmentName, EnvironmentData>>,
    current: RwLock<Option<EnvironmentName>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an environment directly, bypassing every check. Used to stage
    /// data that a graph store must later refuse to trust.
    pub fn insert_raw(&self, name: impl Into<EnvironmentName>, data: EnvironmentData) {
        if let Ok(mut envs) = self.environments.write() {
            envs.insert(name.into(), data);
        }
    }

    /// Make every subsequent `save_environment` fail until reset.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `save_environment` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn poisoned() -> StorageError {
        StorageError::Unavailable("memory store lock poisoned".to_string())
    }
}

impl EnvironmentStore for MemoryStore {
    fn list_environments(&self) -> Result<Vec<EnvironmentName>> {
        let envs = self.environments.read().map_err(|_| Self::poisoned())?;
        let mut names: Vec<EnvironmentName> = envs.keys().cloned().collect();
        sort_environments(&mut names);
        Ok(names)
    }

    fn create_environment(&self, name: &EnvironmentName) -> Result<()> {
        validate_environment_name(name.as_str())?;
        let mut envs = self.environments.write().map_err(|_| Self::poisoned())?;
        if envs.contains_key(name) {
            return Err(StorageError::AlreadyExists(name.clone()));
        }
        envs.insert(name.clone(), EnvironmentData::default());
        Ok(())
    }

    fn load_environment(&self, name: &EnvironmentName) -> Result<EnvironmentData> {
        let envs = self.environments.read().map_err(|_| Self::poisoned())?;
        envs.get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.clone()))
    }

    fn save_environment(&self, name: &EnvironmentName, data: &EnvironmentData) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!(
                "injected save failure for {name}"
            )));
        }
        let mut envs = self.environments.write().map_err(|_| Self::poisoned())?;
        envs.insert(name.clone(), data.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_current(&self) -> Result<Option<EnvironmentName>> {
        let current = self.current.read().map_err(|_| Self::poisoned())?;
        Ok(current.clone())
    }

    fn save_current(&self, name: &EnvironmentName) -> Result<()> {
        let mut current = self.current.write().map_err(|_| Self::poisoned())?;
        *current = Some(name.clone());
        Ok(())
    }
}
