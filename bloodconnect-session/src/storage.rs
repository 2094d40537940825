//! Session Storage - client-side key/value media
//!
//! Two media hold the serialized identity: a persistent one that survives
//! restarts ("remember me") and a transient one scoped to the browsing
//! session. Only the session manager writes to them.

use crate::identity::IdentityRecord;
use crate::{SessionError, SessionResult};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Synchronous key/value storage medium
pub trait StorageMedium: Send + Sync {
    fn get_item(&self, key: &str) -> SessionResult<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> SessionResult<()>;

    fn remove_item(&self, key: &str) -> SessionResult<()>;
}

/// In-memory medium; clones share the same contents
#[derive(Clone, Debug, Default)]
pub struct MemoryMedium {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageMedium for MemoryMedium {
    fn get_item(&self, key: &str) -> SessionResult<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| SessionError::storage("memory medium lock poisoned"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> SessionResult<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| SessionError::storage("memory medium lock poisoned"))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> SessionResult<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| SessionError::storage("memory medium lock poisoned"))?;
        items.remove(key);
        Ok(())
    }
}

/// Medium backed by a JSON object file
///
/// The file is re-read on every access so separate processes sharing it see
/// each other's writes. A missing file reads as empty.
#[derive(Clone, Debug)]
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> SessionResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                SessionError::storage(format!(
                    "Failed to parse storage file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(SessionError::storage(format!(
                "Failed to read storage file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> SessionResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(items)
            .map_err(|e| SessionError::storage(format!("Failed to encode storage file: {}", e)))?;
        std::fs::write(&self.path, content).map_err(|e| {
            SessionError::storage(format!(
                "Failed to write storage file {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl StorageMedium for FileMedium {
    fn get_item(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> SessionResult<()> {
        // An unreadable file is replaced rather than blocking every later write
        let mut items = self.read_all().unwrap_or_default();
        items.insert(key.to_string(), value.to_string());
        self.write_all(&items)
    }

    fn remove_item(&self, key: &str) -> SessionResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut items = self.read_all().unwrap_or_default();
        items.remove(key);
        self.write_all(&items)
    }
}

/// Which medium an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediumKind {
    Persistent,
    Transient,
}

impl MediumKind {
    pub fn other(self) -> Self {
        match self {
            MediumKind::Persistent => MediumKind::Transient,
            MediumKind::Transient => MediumKind::Persistent,
        }
    }
}

impl std::fmt::Display for MediumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediumKind::Persistent => write!(f, "persistent"),
            MediumKind::Transient => write!(f, "transient"),
        }
    }
}

/// The pair of media plus the fixed key the identity snapshot lives under
#[derive(Clone)]
pub struct SessionStorage {
    persistent: Arc<dyn StorageMedium>,
    transient: Arc<dyn StorageMedium>,
    key: String,
}

impl std::fmt::Debug for SessionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStorage")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl SessionStorage {
    pub fn new(
        persistent: Arc<dyn StorageMedium>,
        transient: Arc<dyn StorageMedium>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            persistent,
            transient,
            key: key.into(),
        }
    }

    /// Two fresh in-memory media
    pub fn in_memory(key: impl Into<String>) -> Self {
        Self::new(
            Arc::new(MemoryMedium::new()),
            Arc::new(MemoryMedium::new()),
            key,
        )
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn medium(&self, kind: MediumKind) -> &dyn StorageMedium {
        match kind {
            MediumKind::Persistent => self.persistent.as_ref(),
            MediumKind::Transient => self.transient.as_ref(),
        }
    }

    /// First stored snapshot, persistent medium first
    ///
    /// An unreadable medium counts as empty.
    pub fn load(&self) -> Option<(MediumKind, String)> {
        [MediumKind::Persistent, MediumKind::Transient]
            .into_iter()
            .find_map(|kind| match self.medium(kind).get_item(&self.key) {
                Ok(Some(raw)) => Some((kind, raw)),
                Ok(None) => None,
                Err(e) => {
                    warn!(medium = %kind, error = %e, "Failed to read session entry");
                    None
                }
            })
    }

    /// Which medium currently holds an entry, persistent preferred
    pub fn locate(&self) -> Option<MediumKind> {
        self.load().map(|(kind, _)| kind)
    }

    /// Write the snapshot into `kind` and drop any entry in the other medium
    ///
    /// At most one medium holds the entry afterwards. Failures are logged,
    /// not raised.
    pub fn store(&self, kind: MediumKind, identity: &IdentityRecord) {
        let result = identity
            .to_snapshot()
            .and_then(|raw| self.medium(kind).set_item(&self.key, &raw));

        match result {
            Ok(()) => debug!(medium = %kind, uid = %identity.uid, "Stored session entry"),
            Err(e) => warn!(medium = %kind, error = %e, "Failed to store session entry"),
        }

        self.clear(kind.other());
    }

    /// Remove the entry from one medium; failures are logged, not raised
    pub fn clear(&self, kind: MediumKind) {
        if let Err(e) = self.medium(kind).remove_item(&self.key) {
            warn!(medium = %kind, error = %e, "Failed to clear session entry");
        }
    }

    /// Remove the entry from both media
    pub fn clear_all(&self) {
        self.clear(MediumKind::Persistent);
        self.clear(MediumKind::Transient);
    }
}
