//! Recently opened saves, newest first, unique by report fingerprint.
//!
//! `HistoryList` is the pure ordered list. `RecentFiles` pairs it with a
//! `HistoryStorage` and persists after every mutation; storage failures are
//! logged and never reach the caller, since history is a convenience.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::fingerprint::Fingerprint;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
const STORAGE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub fingerprint: Fingerprint,
    pub display_name: String,
    pub document_text: String,
    pub report_text: String,
    pub timestamp_ms: u64,
}

impl HistoryEntry {
    pub fn new(
        display_name: impl Into<String>,
        document_text: impl Into<String>,
        report_text: impl Into<String>,
        timestamp_ms: u64,
    ) -> Self {
        let report_text = report_text.into();
        Self {
            fingerprint: Fingerprint::of(&report_text),
            display_name: display_name.into(),
            document_text: document_text.into(),
            report_text,
            timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryList {
    entries: Vec<HistoryEntry>,
    capacity: usize,
}

impl HistoryList {
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| &e.fingerprint == fingerprint)
    }

    /// Finds the single entry whose fingerprint starts with `prefix`.
    /// Returns `None` when no entry or more than one entry matches.
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&HistoryEntry> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return None;
        }
        let mut matches = self
            .entries
            .iter()
            .filter(|e| e.fingerprint.as_str().starts_with(&prefix));
        let first = matches.next()?;
        match matches.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// Moves a re-inserted fingerprint to the front and evicts from the tail
    /// past capacity. Returns the evicted entries, oldest last.
    pub fn insert(&mut self, entry: HistoryEntry) -> Vec<HistoryEntry> {
        self.entries.retain(|e| e.fingerprint != entry.fingerprint);
        self.entries.insert(0, entry);
        if self.entries.len() > self.capacity {
            self.entries.split_off(self.capacity)
        } else {
            Vec::new()
        }
    }

    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<HistoryEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| &e.fingerprint == fingerprint)?;
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        let persisted = PersistedHistoryRef {
            v: STORAGE_VERSION,
            entries: &self.entries,
        };
        Ok(serde_json::to_vec(&persisted)?)
    }

    /// Restores a list, dropping entries whose fingerprint does not match
    /// their report or repeats an earlier entry, then truncating to capacity.
    pub fn from_bytes(bytes: &[u8], capacity: usize) -> Result<Self, StorageError> {
        let persisted: PersistedHistory = serde_json::from_slice(bytes)?;
        if persisted.v != STORAGE_VERSION {
            return Err(StorageError::UnsupportedVersion(persisted.v));
        }

        let mut list = Self::with_capacity(capacity);
        let mut seen = HashSet::new();
        for entry in persisted.entries {
            if entry.fingerprint != Fingerprint::of(&entry.report_text) {
                warn!(fingerprint = %entry.fingerprint, "dropping history entry with stale fingerprint");
                continue;
            }
            if !seen.insert(entry.fingerprint.clone()) {
                continue;
            }
            list.entries.push(entry);
        }
        list.entries.truncate(list.capacity);
        Ok(list)
    }
}

#[derive(Debug, Deserialize)]
struct PersistedHistory {
    v: u32,
    entries: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
struct PersistedHistoryRef<'a> {
    v: u32,
    entries: &'a [HistoryEntry],
}

/// Durable home of the serialized history.
pub trait HistoryStorage {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError>;
    fn save(&self, bytes: &[u8]) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStorage for FileStorage {
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }
}

/// In-process storage, used by the web front end (which hands the bytes to
/// browser storage itself) and by tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bytes: RefCell<Option<Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: RefCell::new(Some(bytes.into())),
        }
    }

    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.bytes.borrow().clone()
    }
}

impl HistoryStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.snapshot())
    }

    fn save(&self, bytes: &[u8]) -> Result<(), StorageError> {
        *self.bytes.borrow_mut() = Some(bytes.to_vec());
        Ok(())
    }
}

/// History list bound to its storage. Mutation takes `&mut self`, so there is
/// a single writer at a time.
#[derive(Debug)]
pub struct RecentFiles<S: HistoryStorage> {
    list: HistoryList,
    storage: S,
}

impl<S: HistoryStorage> RecentFiles<S> {
    /// Restores from `storage`; missing, malformed or unreadable storage
    /// yields an empty list.
    pub fn open(storage: S, capacity: usize) -> Self {
        let list = match storage.load() {
            Ok(Some(bytes)) => HistoryList::from_bytes(&bytes, capacity).unwrap_or_else(|err| {
                warn!(error = %err, "discarding unreadable history");
                HistoryList::with_capacity(capacity)
            }),
            Ok(None) => HistoryList::with_capacity(capacity),
            Err(err) => {
                warn!(error = %err, "history storage could not be loaded");
                HistoryList::with_capacity(capacity)
            }
        };
        debug!(entries = list.len(), "restored history");
        Self { list, storage }
    }

    pub fn list(&self) -> &HistoryList {
        &self.list
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn insert(&mut self, entry: HistoryEntry) {
        let evicted = self.list.insert(entry);
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted old history entries");
        }
        self.persist();
    }

    pub fn remove(&mut self, fingerprint: &Fingerprint) -> bool {
        let removed = self.list.remove(fingerprint).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.list.clear();
        self.persist();
    }

    /// Writes the current list. Returns whether the write succeeded.
    pub fn persist(&self) -> bool {
        match self.list.to_bytes().and_then(|bytes| self.storage.save(&bytes)) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "history could not be saved");
                false
            }
        }
    }
}
