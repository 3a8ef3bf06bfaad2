//! JSON file backed value store
//!
//! The whole store is loaded on open and written back on [`FileValueStore::flush`].
//! Writes go to a temp file first and are renamed into place so a crash
//! never leaves a half-written state file behind.

use super::{MemoryValueStore, StoreScope, ValueStore, ValueStoreKey};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: ValueStoreKey,
    value: Value,
}

/// Value store persisted as a JSON file
#[derive(Debug)]
pub struct FileValueStore {
    path: PathBuf,
    inner: MemoryValueStore,
    dirty: bool,
}

impl FileValueStore {
    /// Open a store, starting empty when the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = if path.exists() {
            load_from_disk(&path)?
        } else {
            debug!(path = %path.display(), "No value store file yet, starting empty");
            MemoryValueStore::new()
        };

        Ok(Self {
            path,
            inner,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Write the store to disk if anything changed since the last flush
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        save_to_disk(&self.path, &self.inner)?;
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.inner.len(), "Value store flushed to disk");
        Ok(())
    }
}

impl ValueStore for FileValueStore {
    fn get(&self, key: &ValueStoreKey) -> Option<&Value> {
        self.inner.get(key)
    }

    fn set(&mut self, key: ValueStoreKey, value: Value) {
        self.inner.set(key, value);
        self.dirty = true;
    }

    fn scope_entries(&self, scope: &StoreScope) -> BTreeMap<String, Value> {
        self.inner.scope_entries(scope)
    }
}

fn save_to_disk(path: &Path, store: &MemoryValueStore) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let entries: Vec<StoredEntry> = store
        .iter()
        .map(|(key, value)| StoredEntry {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();
    let json = serde_json::to_vec_pretty(&entries).context("Failed to serialize value store")?;

    let temp_path = temp_path_for(path);
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;

    file.write_all(&json)
        .context("Failed to write value store")?;
    file.sync_all().context("Failed to sync value store file")?;

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    Ok(())
}

/// Sibling of `path` with `.tmp` appended to the full file name
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn load_from_disk(path: &Path) -> Result<MemoryValueStore> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open value store {:?}", path))?;

    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .context("Failed to read value store")?;

    let entries: Vec<StoredEntry> = if data.iter().all(u8::is_ascii_whitespace) {
        Vec::new()
    } else {
        serde_json::from_slice(&data).context("Failed to deserialize value store")?
    };

    let store: MemoryValueStore = entries
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect();
    info!(path = %path.display(), entries = store.len(), "Loaded value store from disk");
    Ok(store)
}
