//! JSON-backed paper store.
//!
//! The store is one JSON array of [`PaperRecord`]s. Every read and every
//! read-modify-write happens while holding an exclusive advisory lock on
//! `<path>.lock`, so any number of processes can share one store file.
//! Writes go to a temporary file in the same directory which is then renamed
//! over the store, so readers never see a half-written document.

mod lock;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;

use crate::models::PaperRecord;
use crate::utils::DedupSet;
use lock::{lock_path_for, StoreLock};

/// Errors raised while loading or saving the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed store {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Size and modification time of the store file, used to notice writes made
/// by other processes since the cache was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

#[derive(Debug)]
struct Cached {
    records: Vec<PaperRecord>,
    fingerprint: Option<Fingerprint>,
}

/// Persistent, lock-guarded collection of paper records.
#[derive(Debug)]
pub struct PaperStore {
    path: PathBuf,
    lock_path: PathBuf,
    cache_enabled: bool,
    cache: Option<Cached>,
    known: DedupSet,
}

impl PaperStore {
    /// Open the store at `path`, creating its directory if needed.
    ///
    /// With `cache_enabled` the collection is kept in memory and only
    /// re-read on save when the file changed on disk in the meantime.
    pub fn open(path: impl Into<PathBuf>, cache_enabled: bool) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
        }

        let mut store = Self {
            lock_path: lock_path_for(&path),
            path,
            cache_enabled,
            cache: None,
            known: DedupSet::new(),
        };

        let (records, fingerprint) = {
            let _lock = StoreLock::acquire(&store.lock_path)?;
            (store.read_unlocked()?, store.fingerprint()?)
        };

        store.known = DedupSet::from_records(&records);
        tracing::debug!(
            "Opened store {} with {} records",
            store.path.display(),
            records.len()
        );

        if cache_enabled {
            store.cache = Some(Cached {
                records,
                fingerprint,
            });
        }
        Ok(store)
    }

    /// Read the full collection from disk.
    pub fn load(&self) -> Result<Vec<PaperRecord>, StoreError> {
        let _lock = StoreLock::acquire(&self.lock_path)?;
        self.read_unlocked()
    }

    /// Append `new_records` to the stored collection and rewrite it.
    pub fn save(&mut self, new_records: &[PaperRecord]) -> Result<(), StoreError> {
        let _lock = StoreLock::acquire(&self.lock_path)?;

        let mut collection = self.current_unlocked()?;
        collection.extend_from_slice(new_records);
        self.known.extend(new_records);
        self.commit_unlocked(collection, new_records.len())
    }

    /// Save the records of `batch` that are not in the store yet and return them.
    ///
    /// The check runs against the collection as it is on disk under the lock,
    /// so a record saved by another instance since this one last looked is
    /// not saved twice. Records with no DOI and no URL are always saved.
    pub fn save_new(&mut self, batch: Vec<PaperRecord>) -> Result<Vec<PaperRecord>, StoreError> {
        if batch.is_empty() {
            return Ok(batch);
        }

        let _lock = StoreLock::acquire(&self.lock_path)?;

        let mut collection = self.current_unlocked()?;
        let fetched = batch.len();
        let fresh = self.known.retain_new(batch);
        tracing::debug!("{} of {} fetched papers are new", fresh.len(), fetched);

        if fresh.is_empty() {
            self.cache_unlocked(collection)?;
            return Ok(fresh);
        }

        collection.extend_from_slice(&fresh);
        self.commit_unlocked(collection, fresh.len())?;
        Ok(fresh)
    }

    /// Identifiers of the records in the store as of the last load or save.
    #[cfg(test)]
    pub(crate) fn known(&self) -> &DedupSet {
        &self.known
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// The collection as it is on disk, served from the cache when the file
    /// is unchanged. Rebuilds `known` from it. Caller holds the lock.
    fn current_unlocked(&mut self) -> Result<Vec<PaperRecord>, StoreError> {
        let collection = match self.cache.take() {
            Some(cached) if cached.fingerprint == self.fingerprint()? => cached.records,
            Some(_) => {
                tracing::debug!("Store {} changed on disk, reloading", self.path.display());
                self.read_unlocked()?
            }
            None => self.read_unlocked()?,
        };
        self.known = DedupSet::from_records(&collection);
        Ok(collection)
    }

    fn commit_unlocked(
        &mut self,
        collection: Vec<PaperRecord>,
        added: usize,
    ) -> Result<(), StoreError> {
        self.write_unlocked(&collection)?;
        tracing::info!(
            "Saved {} new records to {} ({} total)",
            added,
            self.path.display(),
            collection.len()
        );
        self.cache_unlocked(collection)
    }

    fn cache_unlocked(&mut self, collection: Vec<PaperRecord>) -> Result<(), StoreError> {
        if self.cache_enabled {
            self.cache = Some(Cached {
                records: collection,
                fingerprint: self.fingerprint()?,
            });
        }
        Ok(())
    }

    fn fingerprint(&self) -> Result<Option<Fingerprint>, StoreError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(Fingerprint {
                len: meta.len(),
                modified: meta.modified().ok(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path)(e)),
        }
    }

    fn read_unlocked(&self) -> Result<Vec<PaperRecord>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.path)(e)),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn write_unlocked(&self, records: &[PaperRecord]) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(StoreError::io(dir))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let mut serializer = serde_json::Serializer::with_formatter(
                &mut writer,
                PrettyFormatter::with_indent(b"    "),
            );
            records.serialize(&mut serializer)?;
            writer.flush().map_err(StoreError::io(&self.path))?;
        }

        tmp.as_file().sync_all().map_err(StoreError::io(&self.path))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path)(e.error))?;
        Ok(())
    }
}
