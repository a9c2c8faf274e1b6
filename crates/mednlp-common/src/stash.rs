//! Key/value response cache.
//!
//! A [`Stash`] maps string keys to JSON values. Entries never expire; callers
//! that need fresh data clear the stash explicitly.
//!
//! Two implementations are provided:
//! - [`MemoryStash`]: process-local, useful for tests and short-lived tools
//! - [`DirectoryStash`]: one JSON file per key under a cache directory, so
//!   lookups survive restarts

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{MedNlpError, Result};

/// Cache collaborator contract: `load` a previously dumped value or `None`.
pub trait Stash: Send + Sync {
    /// Return the value stored under `key`, or `None` if the key was never dumped.
    fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    fn dump(&self, key: &str, value: &Value) -> Result<()>;

    /// Whether a value is stored under `key`.
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.load(key)?.is_some())
    }

    /// Remove every entry.
    fn clear(&self) -> Result<()>;
}

// ── In-memory ─────────────────────────────────────────────────────────────────

/// A stash backed by a `HashMap` guarded by a mutex.
#[derive(Debug, Default)]
pub struct MemoryStash {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>> {
        self.entries
            .lock()
            .map_err(|e| MedNlpError::Stash(format!("memory stash poisoned: {}", e)))
    }
}

impl Stash for MemoryStash {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn dump(&self, key: &str, value: &Value) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

// ── Directory ─────────────────────────────────────────────────────────────────

/// A stash that writes each entry as `<sha256(key)>.json` in a directory.
///
/// Keys are request URLs, which are not safe file names, hence the digest.
#[derive(Debug, Clone)]
pub struct DirectoryStash {
    dir: PathBuf,
}

impl DirectoryStash {
    /// Create a stash rooted at `dir`. The directory is created on first dump.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Stash under the user cache directory, e.g. `~/.cache/mednlp/<name>`.
    pub fn in_cache_dir(name: &str) -> Self {
        let dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("mednlp")
            .join(name);
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }
}

impl Stash for DirectoryStash {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.key_to_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let value = serde_json::from_str(&content)?;
        Ok(Some(value))
    }

    fn dump(&self, key: &str, value: &Value) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.key_to_path(key);
        // write then rename so a crash never leaves a truncated entry
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(value)?)?;
        fs::rename(&tmp, &path)?;
        debug!(key, path = %path.display(), "dumped stash entry");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if !self.dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
