//! Credential store implementations.
//!
//! Provides the synchronous key/value contract used for the bearer pair:
//! - `save` overwrites both entries
//! - `load` yields a pair only when both entries exist
//! - `clear` removes both entries
//!
//! The file-backed store keeps a small JSON document with the two named
//! entries `access_token` and `refresh_token`.

use crate::auth::models::CredentialPair;
use crate::errors::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Durable storage for the current credential pair.
pub trait CredentialStore: Send + Sync {
    /// Replaces both stored entries with `pair`.
    fn save(&self, pair: &CredentialPair) -> StoreResult<()>;

    /// Returns the stored pair, or `None` when either entry is missing.
    fn load(&self) -> StoreResult<Option<CredentialPair>>;

    /// Removes both entries. Clearing an empty store succeeds.
    fn clear(&self) -> StoreResult<()>;

    /// Current access token, if any.
    fn access_token(&self) -> StoreResult<Option<String>> {
        Ok(self.load()?.map(|pair| pair.access_token))
    }

    /// Current refresh token, if any.
    fn refresh_token(&self) -> StoreResult<Option<String>> {
        Ok(self.load()?.map(|pair| pair.refresh_token))
    }
}

/// On-disk document. Entries are optional so a partially written or hand
/// edited file reads as "no session" instead of failing.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredEntries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl StoredEntries {
    fn into_pair(self) -> Option<CredentialPair> {
        match (self.access_token, self.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(CredentialPair::new(access, refresh))
            }
            _ => None,
        }
    }
}

/// Credential store persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store backed by the file at `path`. The file is created on
    /// the first `save`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> StoreResult<StoredEntries> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoredEntries::default()),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };

        if contents.trim().is_empty() {
            return Ok(StoredEntries::default());
        }

        serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn write_entries(&self, entries: &StoredEntries) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let body =
            serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        // Write next to the target and rename, so readers never see a partial document.
        let tmp_path = self.path.with_extension("tmp");
        let mut file = open_private(&tmp_path).map_err(|e| StoreError::Io(e.to_string()))?;
        file.write_all(&body)
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::Io(e.to_string()))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, pair: &CredentialPair) -> StoreResult<()> {
        self.write_entries(&StoredEntries {
            access_token: Some(pair.access_token.clone()),
            refresh_token: Some(pair.refresh_token.clone()),
        })
    }

    fn load(&self) -> StoreResult<Option<CredentialPair>> {
        Ok(self.read_entries()?.into_pair())
    }

    fn clear(&self) -> StoreResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }

    fn access_token(&self) -> StoreResult<Option<String>> {
        Ok(self.read_entries()?.access_token.filter(|t| !t.is_empty()))
    }

    fn refresh_token(&self) -> StoreResult<Option<String>> {
        Ok(self.read_entries()?.refresh_token.filter(|t| !t.is_empty()))
    }
}

/// In-process credential store, for tests and hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `pair`.
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, pair: &CredentialPair) -> StoreResult<()> {
        let mut slot = self
            .pair
            .write()
            .map_err(|_| StoreError::Io("credential lock poisoned".to_string()))?;
        *slot = Some(pair.clone());
        Ok(())
    }

    fn load(&self) -> StoreResult<Option<CredentialPair>> {
        let slot = self
            .pair
            .read()
            .map_err(|_| StoreError::Io("credential lock poisoned".to_string()))?;
        Ok(slot.clone())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut slot = self
            .pair
            .write()
            .map_err(|_| StoreError::Io("credential lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}
