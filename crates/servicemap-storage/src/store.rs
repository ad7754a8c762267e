//! Environment storage: the persistence trait and a JSON directory implementation.
//!
//! Each environment is a directory holding one JSON file per service and a
//! single relationships file:
//! ```text
//! {root}/
//!   .current
//!   dev/
//!     manifest.json
//!     relationships.json
//!     services/
//!       user-api.json
//!       postgres.json
//! ```
//!
//! A save first writes `journal.json` holding every change it is about to
//! make. The rename of that file is the commit point: once it exists the save
//! has happened, and loads read the environment through it until the changes
//! have been applied to the data files and the journal removed.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use servicemap_core::config::ChecksumPolicy;
use servicemap_core::types::sort_environments;
use servicemap_core::{EnvironmentData, EnvironmentName, ErrorKind, Relationship, Service};

use crate::hash::{compute_environment_hash, short_fingerprint};
use crate::Manifest;

const SERVICES_DIR: &str = "services";
const RELATIONSHIPS_FILE: &str = "relationships.json";
const MANIFEST_FILE: &str = "manifest.json";
const CURRENT_FILE: &str = ".current";
const JOURNAL_FILE: &str = "journal.json";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Environment not found in storage: {0}")]
    NotFound(EnvironmentName),

    #[error("Environment already exists in storage: {0}")]
    AlreadyExists(EnvironmentName),

    #[error("Invalid environment name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Checksum mismatch for environment {environment}: manifest {expected}, content {actual}")]
    ChecksumMismatch {
        environment: EnvironmentName,
        expected: String,
        actual: String,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StorageError::InvalidName { .. } => ErrorKind::InvalidInput,
            StorageError::ChecksumMismatch { .. } => ErrorKind::IntegrityCorrupted,
            StorageError::Unavailable(_) | StorageError::Io(_) | StorageError::Serialization(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for environment persistence backends.
///
/// The graph store treats the backend as authoritative at startup and calls
/// `save_environment` after each committed mutation. Backends are not assumed
/// to be transactional.
pub trait EnvironmentStore: Send + Sync {
    /// Names of all persisted environments, in promotion order.
    fn list_environments(&self) -> Result<Vec<EnvironmentName>>;

    /// Create an empty environment. Fails if it already exists.
    fn create_environment(&self, name: &EnvironmentName) -> Result<()>;

    /// Load the full contents of an environment.
    fn load_environment(&self, name: &EnvironmentName) -> Result<EnvironmentData>;

    /// Replace the full contents of an environment.
    fn save_environment(&self, name: &EnvironmentName, data: &EnvironmentData) -> Result<()>;

    /// The persisted current-environment pointer, if the backend keeps one.
    fn load_current(&self) -> Result<Option<EnvironmentName>> {
        Ok(None)
    }

    /// Persist the current-environment pointer.
    fn save_current(&self, _name: &EnvironmentName) -> Result<()> {
        Ok(())
    }
}

/// On-disk relationships file. Older files may hold a bare array.
#[derive(Serialize, Deserialize)]
struct RelationshipsFile {
    relationships: Vec<Relationship>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RelationshipsDocument {
    Wrapped(RelationshipsFile),
    Bare(Vec<Relationship>),
}

/// Changes made by one save, in the order they are applied.
#[derive(Serialize, Deserialize)]
struct Journal {
    /// Service files to write, by file name.
    upserts: BTreeMap<String, Service>,
    /// Service files to remove.
    removals: Vec<String>,
    relationships: Vec<Relationship>,
    manifest: Manifest,
}

impl Journal {
    fn new(
        name: &EnvironmentName,
        data: &EnvironmentData,
        upserts: BTreeMap<String, Service>,
        removals: Vec<String>,
    ) -> Result<Self> {
        Ok(Self {
            upserts,
            removals,
            relationships: data.relationships.clone(),
            manifest: Manifest {
                environment: name.clone(),
                saved_at: Utc::now(),
                content_hash: compute_environment_hash(data)?,
                service_count: data.services.len(),
                relationship_count: data.relationships.len(),
            },
        })
    }

    /// Write every change into `env_dir`, then drop the journal file.
    /// Safe to repeat after a partial run.
    fn apply(&self, env_dir: &Path) -> Result<()> {
        let services_dir = env_dir.join(SERVICES_DIR);
        fs::create_dir_all(&services_dir)?;

        for (file_name, service) in &self.upserts {
            write_atomic(
                &services_dir.join(file_name),
                &serde_json::to_vec_pretty(service)?,
            )?;
        }
        for file_name in &self.removals {
            remove_if_exists(&services_dir.join(file_name))?;
        }

        let rel_file = RelationshipsFile {
            relationships: self.relationships.clone(),
        };
        write_atomic(
            &env_dir.join(RELATIONSHIPS_FILE),
            &serde_json::to_vec_pretty(&rel_file)?,
        )?;
        write_atomic(
            &env_dir.join(MANIFEST_FILE),
            &serde_json::to_vec_pretty(&self.manifest)?,
        )?;

        remove_if_exists(&env_dir.join(JOURNAL_FILE))
    }
}

/// Content hash of each service file, by file name.
type FileHashes = HashMap<String, blake3::Hash>;

/// File-system backed store, one directory per environment.
///
/// Assumes it is the only writer of `root` while open: service files whose
/// content is unchanged since the last load or save are not rewritten.
pub struct JsonDirStore {
    root: PathBuf,
    checksum_policy: ChecksumPolicy,
    files: Mutex<HashMap<EnvironmentName, FileHashes>>,
}

impl JsonDirStore {
    /// Create a store rooted at the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>, checksum_policy: ChecksumPolicy) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            checksum_policy,
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn env_dir(&self, name: &EnvironmentName) -> Result<PathBuf> {
        validate_environment_name(name.as_str())?;
        Ok(self.root.join(name.as_str()))
    }

    fn read_manifest(&self, env_dir: &Path) -> Result<Option<Manifest>> {
        let path = env_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn read_journal(&self, env_dir: &Path) -> Result<Option<Journal>> {
        let path = env_dir.join(JOURNAL_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&json)?))
    }

    fn check_manifest(
        &self,
        name: &EnvironmentName,
        manifest: Option<Manifest>,
        data: &EnvironmentData,
    ) -> Result<()> {
        if self.checksum_policy == ChecksumPolicy::Ignore {
            return Ok(());
        }
        let Some(manifest) = manifest else {
            return Ok(());
        };

        let actual = compute_environment_hash(data)?;
        if manifest.content_hash == actual {
            return Ok(());
        }

        match self.checksum_policy {
            ChecksumPolicy::Reject => Err(StorageError::ChecksumMismatch {
                environment: name.clone(),
                expected: manifest.content_hash,
                actual,
            }),
            _ => {
                tracing::warn!(
                    environment = %name,
                    expected = %manifest.content_hash,
                    actual = %actual,
                    "Environment files changed outside servicemap since last save"
                );
                Ok(())
            }
        }
    }

    /// File hashes recorded at the last load or save of `name`.
    fn known_files(&self, name: &EnvironmentName) -> Option<FileHashes> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn remember(&self, name: &EnvironmentName, hashes: FileHashes) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), hashes);
    }
}

impl EnvironmentStore for JsonDirStore {
    fn list_environments(&self) -> Result<Vec<EnvironmentName>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                // Skip hidden directories, staging ones included.
                if !name.starts_with('.') {
                    names.push(EnvironmentName::from(name));
                }
            }
        }
        sort_environments(&mut names);
        Ok(names)
    }

    fn create_environment(&self, name: &EnvironmentName) -> Result<()> {
        let env_dir = self.env_dir(name)?;
        if env_dir.exists() {
            return Err(StorageError::AlreadyExists(name.clone()));
        }

        // Build the directory under a hidden name and move it into place, so
        // a failure never leaves a half-created environment behind.
        let staging = self.root.join(format!(".{}.new", name.as_str()));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        Journal::new(name, &EnvironmentData::default(), BTreeMap::new(), Vec::new())?
            .apply(&staging)?;
        fs::rename(&staging, &env_dir)?;
        self.remember(name, FileHashes::new());

        tracing::debug!(environment = %name, path = %env_dir.display(), "Environment directory created");
        Ok(())
    }

    fn load_environment(&self, name: &EnvironmentName) -> Result<EnvironmentData> {
        let env_dir = self.env_dir(name)?;
        if !env_dir.is_dir() {
            return Err(StorageError::NotFound(name.clone()));
        }

        let mut files = read_service_files(&env_dir.join(SERVICES_DIR))?;

        let rel_path = env_dir.join(RELATIONSHIPS_FILE);
        let mut relationships = if rel_path.exists() {
            let json = fs::read_to_string(&rel_path)?;
            match serde_json::from_str::<RelationshipsDocument>(&json)? {
                RelationshipsDocument::Wrapped(file) => file.relationships,
                RelationshipsDocument::Bare(list) => list,
            }
        } else {
            Vec::new()
        };

        let manifest = match self.read_journal(&env_dir)? {
            Some(journal) => {
                tracing::debug!(environment = %name, "Reading through unapplied journal");
                for file_name in &journal.removals {
                    files.remove(file_name);
                }
                files.extend(journal.upserts);
                relationships = journal.relationships;
                Some(journal.manifest)
            }
            None => self.read_manifest(&env_dir)?,
        };

        let mut hashes = FileHashes::with_capacity(files.len());
        for (file_name, service) in &files {
            hashes.insert(file_name.clone(), service_hash(service)?);
        }

        let data = EnvironmentData {
            services: files.into_values().collect(),
            relationships,
        };
        self.check_manifest(name, manifest, &data)?;
        self.remember(name, hashes);

        tracing::debug!(
            environment = %name,
            services = data.services.len(),
            relationships = data.relationships.len(),
            "Environment loaded"
        );
        Ok(data)
    }

    fn save_environment(&self, name: &EnvironmentName, data: &EnvironmentData) -> Result<()> {
        let env_dir = self.env_dir(name)?;
        if !env_dir.is_dir() {
            return Err(StorageError::NotFound(name.clone()));
        }

        // Finish an earlier save whose changes were committed but not applied.
        if let Some(pending) = self.read_journal(&env_dir)? {
            pending.apply(&env_dir)?;
            tracing::debug!(environment = %name, "Pending journal applied");
        }

        let known = self.known_files(name);
        let existing: Vec<String> = match &known {
            Some(files) => files.keys().cloned().collect(),
            None => list_service_files(&env_dir.join(SERVICES_DIR))?,
        };

        let mut upserts = BTreeMap::new();
        let mut hashes = FileHashes::with_capacity(data.services.len());
        for service in &data.services {
            let file_name = service_file_name(service.id.as_str());
            let hash = service_hash(service)?;
            let unchanged = known
                .as_ref()
                .and_then(|files| files.get(&file_name))
                .is_some_and(|previous| *previous == hash);
            if !unchanged {
                upserts.insert(file_name.clone(), service.clone());
            }
            hashes.insert(file_name, hash);
        }
        let removals: Vec<String> = existing
            .into_iter()
            .filter(|file_name| !hashes.contains_key(file_name))
            .collect();

        let journal = Journal::new(name, data, upserts, removals)?;
        write_atomic(&env_dir.join(JOURNAL_FILE), &serde_json::to_vec(&journal)?)?;
        self.remember(name, hashes);

        // Committed. A failure from here on is finished by the next save and
        // masked by the journal on load.
        if let Err(e) = journal.apply(&env_dir) {
            tracing::warn!(environment = %name, error = %e, "Journal committed but not applied");
        }

        tracing::debug!(
            environment = %name,
            content_hash = %journal.manifest.content_hash,
            written = journal.upserts.len(),
            removed = journal.removals.len(),
            "Environment saved"
        );
        Ok(())
    }

    fn load_current(&self) -> Result<Option<EnvironmentName>> {
        let path = self.root.join(CURRENT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        let name = raw.trim();
        if name.is_empty() {
            return Ok(None);
        }
        Ok(Some(EnvironmentName::from(name)))
    }

    fn save_current(&self, name: &EnvironmentName) -> Result<()> {
        write_atomic(&self.root.join(CURRENT_FILE), name.as_str().as_bytes())?;
        Ok(())
    }
}

/// Environment names become directory names.
pub fn validate_environment_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("name is empty")
    } else if name.starts_with('.') {
        Some("name starts with '.'")
    } else if name.contains(['/', '\\']) {
        Some("name contains a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// File name for a service. Ids with characters unsafe in file names are
/// sanitized and suffixed with a fingerprint so distinct ids never collide.
fn service_file_name(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe == id && !id.starts_with('.') && !id.is_empty() {
        format!("{safe}.json")
    } else {
        format!("{safe}-{}.json", short_fingerprint(id))
    }
}

fn service_hash(service: &Service) -> Result<blake3::Hash> {
    Ok(blake3::hash(&serde_json::to_vec_pretty(service)?))
}

/// Names of the `.json` files in `services_dir`.
fn list_service_files(services_dir: &Path) -> Result<Vec<String>> {
    if !services_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(services_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(file_name.to_string());
        }
    }
    Ok(names)
}

/// Every service in `services_dir`, by file name.
fn read_service_files(services_dir: &Path) -> Result<BTreeMap<String, Service>> {
    let mut services = BTreeMap::new();
    for file_name in list_service_files(services_dir)? {
        let json = fs::read_to_string(services_dir.join(&file_name))?;
        let service: Service = serde_json::from_str(&json)?;
        services.insert(file_name, service);
    }
    Ok(services)
}

/// Write via a temporary sibling and rename so readers never see a torn file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
