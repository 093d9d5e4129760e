//! JSON-file-backed catalog.
//!
//! The whole catalog lives in memory behind a mutex and is written back to
//! disk on every mutation (write to `<file>.tmp`, then rename).

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{CacheEntry, CatalogError};
use crate::cache::normalize_url;
use crate::platform::classify;

/// Entries keyed by normalized source URL.
pub type Entries = HashMap<String, CacheEntry>;

/// Record shape written by earlier versions: `{ "<url>": {title, filename} }`.
#[derive(Debug, Deserialize)]
struct LegacyRecord {
    title: Option<String>,
    filename: String,
}

/// Catalog persisted as a JSON array of [`CacheEntry`].
pub struct JsonCatalog {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl JsonCatalog {
    /// Load the catalog from `path`.
    ///
    /// Never fails: a missing or empty file yields an empty catalog, and a
    /// malformed file is moved aside to `<name>.corrupt`.
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => match parse_catalog(&content, path) {
                Ok(entries) => {
                    info!(path = %path.display(), entries = entries.len(), "Loaded catalog");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Catalog is malformed, starting empty");
                    quarantine(path);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No catalog file yet");
                HashMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read catalog, starting empty");
                HashMap::new()
            }
        };

        Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up an entry by normalized source URL.
    pub fn get(&self, source_url: &str) -> Option<CacheEntry> {
        self.lock().get(source_url).cloned()
    }

    /// Find the entry that owns `filename`.
    pub fn find_by_filename(&self, filename: &str) -> Option<CacheEntry> {
        self.lock().values().find(|e| e.filename == filename).cloned()
    }

    /// Copy of all entries, in no particular order.
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run a read-modify-persist cycle under the catalog lock.
    ///
    /// If `f` fails, or persisting its result fails, the in-memory state is
    /// restored to what it was before the call.
    pub fn mutate<R, E>(&self, f: impl FnOnce(&mut Entries) -> Result<R, E>) -> Result<R, E>
    where
        E: From<CatalogError>,
    {
        let mut guard = self.lock();
        let before = guard.clone();

        let result = match f(&mut *guard) {
            Ok(result) => result,
            Err(e) => {
                *guard = before;
                return Err(e);
            }
        };

        if *guard != before {
            if let Err(e) = write_atomically(&self.path, &guard) {
                *guard = before;
                return Err(e.into());
            }
        }
        Ok(result)
    }

    /// Write the current state to disk unconditionally.
    pub fn persist(&self) -> Result<(), CatalogError> {
        let guard = self.lock();
        write_atomically(&self.path, &guard)
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_catalog(content: &str, path: &Path) -> Result<Entries, CatalogError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| CatalogError::Serialization(e.to_string()))?;

    match value {
        serde_json::Value::Array(_) => {
            let list: Vec<CacheEntry> = serde_json::from_value(value)
                .map_err(|e| CatalogError::Serialization(e.to_string()))?;
            Ok(list
                .into_iter()
                .map(|entry| (entry.source_url.clone(), entry))
                .collect())
        }
        serde_json::Value::Object(_) => {
            let legacy: HashMap<String, LegacyRecord> = serde_json::from_value(value)
                .map_err(|e| CatalogError::Serialization(e.to_string()))?;
            info!(entries = legacy.len(), "Migrating legacy catalog format");
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            Ok(legacy
                .into_iter()
                .map(|(url, record)| {
                    let entry = migrate_legacy(&url, record, dir);
                    (entry.source_url.clone(), entry)
                })
                .collect())
        }
        _ => Err(CatalogError::Serialization(
            "expected a JSON array or object".to_string(),
        )),
    }
}

fn migrate_legacy(url: &str, record: LegacyRecord, dir: &Path) -> CacheEntry {
    let source_url = normalize_url(url).unwrap_or_else(|_| url.trim().to_string());
    let added_at = fs::metadata(dir.join(&record.filename))
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    CacheEntry {
        platform: classify(&source_url),
        title: record.title.unwrap_or_else(|| url.to_string()),
        filename: record.filename,
        added_at,
        file_size: 0,
        content_hash: None,
        source_url,
    }
}

fn quarantine(path: &Path) {
    let mut corrupt = OsString::from(path.as_os_str());
    corrupt.push(".corrupt");
    if let Err(e) = fs::rename(path, &corrupt) {
        warn!(path = %path.display(), error = %e, "Failed to move malformed catalog aside");
    }
}

fn write_atomically(path: &Path, entries: &Entries) -> Result<(), CatalogError> {
    let mut list: Vec<&CacheEntry> = entries.values().collect();
    list.sort_by(|a, b| a.source_url.cmp(&b.source_url));

    let json = serde_json::to_vec_pretty(&list)
        .map_err(|e| CatalogError::Serialization(e.to_string()))?;

    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json).map_err(|e| CatalogError::Io(format!("{}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        CatalogError::Io(format!("{}: {}", path.display(), e))
    })?;

    debug!(path = %path.display(), entries = list.len(), "Persisted catalog");
    Ok(())
}
