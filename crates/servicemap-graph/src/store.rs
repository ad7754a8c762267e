//! The graph store: environments, the current-environment pointer, and the
//! commit path every mutation goes through.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use servicemap_core::config::StoreConfig;
use servicemap_core::types::sort_environments;
use servicemap_core::{EnvironmentData, EnvironmentName, ErrorKind};
use servicemap_storage::EnvironmentStore;

use crate::environment::EnvironmentGraph;
use crate::error::{Result, StoreError};
use crate::tx::Batch;

/// Why an environment was refused at load time.
#[derive(Debug, Clone)]
struct Quarantine {
    violations: Vec<String>,
    /// The data as loaded, if it could be read at all.
    raw: Option<EnvironmentData>,
}

/// Per-environment state. Writers serialize on `writer`; readers clone the
/// `Arc` out of `graph` and never block on a writer's invariant checks.
struct EnvironmentSlot {
    writer: Mutex<()>,
    graph: RwLock<Arc<EnvironmentGraph>>,
    quarantine: Option<Quarantine>,
}

impl EnvironmentSlot {
    fn live(graph: EnvironmentGraph) -> Self {
        Self {
            writer: Mutex::new(()),
            graph: RwLock::new(Arc::new(graph)),
            quarantine: None,
        }
    }

    fn quarantined(violations: Vec<String>, raw: Option<EnvironmentData>) -> Self {
        Self {
            writer: Mutex::new(()),
            graph: RwLock::new(Arc::new(EnvironmentGraph::default())),
            quarantine: Some(Quarantine { violations, raw }),
        }
    }
}

/// Owns every tracked environment and is the sole mutator of their graphs.
///
/// Callers only ever receive clones or shared immutable snapshots, so nothing
/// outside the store can bypass the invariant checks.
pub struct GraphStore {
    config: StoreConfig,
    persistence: Option<Arc<dyn EnvironmentStore>>,
    environments: RwLock<HashMap<EnvironmentName, Arc<EnvironmentSlot>>>,
    current: RwLock<Option<EnvironmentName>>,
}

impl GraphStore {
    /// An empty store that keeps everything in memory.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            persistence: None,
            environments: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
        }
    }

    /// Load every environment from `persistence` and persist to it after each
    /// committed mutation.
    ///
    /// Environments whose data breaks a store invariant are quarantined rather
    /// than repaired: operations on them fail with `IntegrityCorrupted` and
    /// [`GraphStore::raw_environment`] exposes the data for validation.
    pub fn open(config: StoreConfig, persistence: Arc<dyn EnvironmentStore>) -> Result<Self> {
        let names = persistence.list_environments()?;
        let mut environments = HashMap::with_capacity(names.len());

        for name in &names {
            let slot = match persistence.load_environment(name) {
                Ok(data) => match EnvironmentGraph::from_data(&data) {
                    Ok(graph) => EnvironmentSlot::live(graph),
                    Err(violations) => {
                        tracing::warn!(
                            environment = %name,
                            violations = violations.len(),
                            "Environment violates store invariants, quarantined"
                        );
                        EnvironmentSlot::quarantined(violations, Some(data))
                    }
                },
                Err(e) if e.kind() == ErrorKind::IntegrityCorrupted => {
                    tracing::warn!(environment = %name, error = %e, "Environment failed checksum, quarantined");
                    EnvironmentSlot::quarantined(vec![e.to_string()], None)
                }
                Err(e) => {
                    tracing::warn!(environment = %name, error = %e, "Environment unreadable, quarantined");
                    EnvironmentSlot::quarantined(vec![e.to_string()], None)
                }
            };
            environments.insert(name.clone(), Arc::new(slot));
        }

        let current = match persistence.load_current()? {
            Some(name) if environments.contains_key(&name) => Some(name),
            _ => names.first().cloned(),
        };

        tracing::info!(
            environments = environments.len(),
            current = ?current.as_ref().map(EnvironmentName::as_str),
            "Graph store opened"
        );

        Ok(Self {
            config,
            persistence: Some(persistence),
            environments: RwLock::new(environments),
            current: RwLock::new(current),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ── Environments ─────────────────────────────────────────────

    /// Track a new, empty environment. The first environment becomes current.
    pub fn create_environment(&self, name: &EnvironmentName) -> Result<()> {
        if name.is_blank() {
            return Err(StoreError::InvalidInput(
                "environment name must not be empty".to_string(),
            ));
        }

        let mut environments = self.environments.write()?;
        if environments.contains_key(name) {
            return Err(StoreError::EnvironmentExists(name.clone()));
        }
        if environments.len() >= self.config.max_environments {
            return Err(StoreError::CapacityExceeded {
                resource: "environments",
                limit: self.config.max_environments,
            });
        }

        // Pointer first: open ignores a pointer to a missing environment.
        let mut current = self.current.write()?;
        let becomes_current = current.is_none();
        if becomes_current {
            self.persist_current(name)?;
        }
        if let Some(persistence) = &self.persistence {
            persistence.create_environment(name)?;
        }

        environments.insert(
            name.clone(),
            Arc::new(EnvironmentSlot::live(EnvironmentGraph::default())),
        );
        if becomes_current {
            *current = Some(name.clone());
        }

        tracing::info!(environment = %name, "Environment created");
        Ok(())
    }

    /// Point the current-environment pointer at `name`.
    pub fn switch_environment(&self, name: &EnvironmentName) -> Result<()> {
        let environments = self.environments.read()?;
        if !environments.contains_key(name) {
            return Err(StoreError::EnvironmentNotFound(name.clone()));
        }
        let mut current = self.current.write()?;
        self.persist_current(name)?;
        *current = Some(name.clone());

        tracing::info!(environment = %name, "Switched environment");
        Ok(())
    }

    pub fn current_environment(&self) -> Result<Option<EnvironmentName>> {
        Ok(self.current.read()?.clone())
    }

    /// All tracked environments, dev → staging → prod, then by name.
    pub fn list_environments(&self) -> Result<Vec<EnvironmentName>> {
        let mut names: Vec<EnvironmentName> = self.environments.read()?.keys().cloned().collect();
        sort_environments(&mut names);
        Ok(names)
    }

    /// Environments refused at load time, with their violations.
    pub fn quarantined_environments(&self) -> Result<Vec<(EnvironmentName, Vec<String>)>> {
        let environments = self.environments.read()?;
        let mut out: Vec<(EnvironmentName, Vec<String>)> = environments
            .iter()
            .filter_map(|(name, slot)| {
                slot.quarantine
                    .as_ref()
                    .map(|q| (name.clone(), q.violations.clone()))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    // ── Snapshots ────────────────────────────────────────────────

    /// The committed graph of `env`. Holding the snapshot never blocks writers.
    pub fn snapshot(&self, env: &EnvironmentName) -> Result<Arc<EnvironmentGraph>> {
        let slot = self.live_slot(env)?;
        let graph = slot.graph.read()?;
        Ok(Arc::clone(&graph))
    }

    /// The environment's data as plain lists. For a quarantined environment
    /// this is the data exactly as loaded, so it can be audited.
    pub fn raw_environment(&self, env: &EnvironmentName) -> Result<EnvironmentData> {
        let slot = self.slot(env)?;
        match &slot.quarantine {
            None => {
                let graph = slot.graph.read()?;
                Ok(graph.to_data())
            }
            Some(Quarantine { raw: Some(raw), .. }) => Ok(raw.clone()),
            Some(Quarantine { violations, raw: None }) => Err(StoreError::IntegrityCorrupted {
                environment: env.clone(),
                violations: violations.clone(),
            }),
        }
    }

    // ── Commit path ──────────────────────────────────────────────

    /// Run one mutation against `env`.
    ///
    /// `build` sees the committed snapshot and returns the batch to apply plus
    /// a value for the caller. The batch is applied to a draft, the draft is
    /// persisted, and only then does it replace the snapshot. Any failure
    /// leaves the snapshot as it was.
    pub(crate) fn commit<T>(
        &self,
        env: &EnvironmentName,
        build: impl FnOnce(&EnvironmentGraph) -> Result<(Batch, T)>,
    ) -> Result<T> {
        let slot = self.live_slot(env)?;
        let _writer = slot.writer.lock()?;

        let base = Arc::clone(&*slot.graph.read()?);
        let (batch, out) = build(&*base).map_err(|e| in_environment(e, env))?;
        let ops = batch.len();

        let mut draft = (*base).clone();
        batch
            .apply(&mut draft, &self.config)
            .map_err(|e| in_environment(e, env))?;

        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save_environment(env, &draft.to_data()) {
                tracing::error!(environment = %env, error = %e, "Persist failed, mutation rolled back");
                return Err(e.into());
            }
        }

        *slot.graph.write()? = Arc::new(draft);
        tracing::debug!(environment = %env, ops, "Batch committed");
        Ok(out)
    }

    fn slot(&self, env: &EnvironmentName) -> Result<Arc<EnvironmentSlot>> {
        self.environments
            .read()?
            .get(env)
            .cloned()
            .ok_or_else(|| StoreError::EnvironmentNotFound(env.clone()))
    }

    fn live_slot(&self, env: &EnvironmentName) -> Result<Arc<EnvironmentSlot>> {
        let slot = self.slot(env)?;
        if let Some(q) = &slot.quarantine {
            return Err(StoreError::IntegrityCorrupted {
                environment: env.clone(),
                violations: q.violations.clone(),
            });
        }
        Ok(slot)
    }

    fn persist_current(&self, name: &EnvironmentName) -> Result<()> {
        if let Some(persistence) = &self.persistence {
            persistence.save_current(name)?;
        }
        Ok(())
    }
}

/// Fill in the environment on not-found errors raised below the store.
fn in_environment(err: StoreError, env: &EnvironmentName) -> StoreError {
    match err {
        StoreError::ServiceNotFound { id, .. } => StoreError::ServiceNotFound {
            environment: env.clone(),
            id,
        },
        StoreError::RelationshipNotFound { id, .. } => StoreError::RelationshipNotFound {
            environment: env.clone(),
            id,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use servicemap_storage::MemoryStore;

    fn env(name: &str) -> EnvironmentName {
        EnvironmentName::from(name)
    }

    #[test]
    fn test_first_environment_becomes_current() {
        let store = GraphStore::new(StoreConfig::default());
        assert_eq!(store.current_environment().unwrap(), None);

        store.create_environment(&env("staging")).unwrap();
        store.create_environment(&env("dev")).unwrap();
        assert_eq!(store.current_environment().unwrap(), Some(env("staging")));

        store.switch_environment(&env("dev")).unwrap();
        assert_eq!(store.current_environment().unwrap(), Some(env("dev")));
    }

    #[test]
    fn test_create_environment_errors() {
        let store = GraphStore::new(StoreConfig {
            max_environments: 1,
            ..StoreConfig::default()
        });
        store.create_environment(&env("dev")).unwrap();

        let err = store.create_environment(&env("dev")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let err = store.create_environment(&env("prod")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);

        let err = store.create_environment(&env("  ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_switch_to_unknown_environment() {
        let store = GraphStore::new(StoreConfig::default());
        store.create_environment(&env("dev")).unwrap();
        let err = store.switch_environment(&env("prod")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.current_environment().unwrap(), Some(env("dev")));
    }

    #[test]
    fn test_list_environments_in_promotion_order() {
        let store = GraphStore::new(StoreConfig::default());
        for name in ["prod", "qa", "dev", "staging"] {
            store.create_environment(&env(name)).unwrap();
        }
        let names: Vec<String> = store
            .list_environments()
            .unwrap()
            .into_iter()
            .map(|n| n.0)
            .collect();
        assert_eq!(names, vec!["dev", "staging", "prod", "qa"]);
    }

    #[test]
    fn test_open_restores_current_pointer() {
        let backend = Arc::new(MemoryStore::new());
        backend.create_environment(&env("dev")).unwrap();
        backend.create_environment(&env("prod")).unwrap();
        backend.save_current(&env("prod")).unwrap();

        let store = GraphStore::open(StoreConfig::default(), backend.clone()).unwrap();
        assert_eq!(store.current_environment().unwrap(), Some(env("prod")));

        // A pointer naming a vanished environment falls back to the first listed.
        backend.save_current(&env("gone")).unwrap();
        let store = GraphStore::open(StoreConfig::default(), backend).unwrap();
        assert_eq!(store.current_environment().unwrap(), Some(env("dev")));
    }
}
