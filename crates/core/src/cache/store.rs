//! On-disk cache of media files, indexed by the catalog.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::filename::{normalize_extension, sanitize, unique_filename};
use super::fs::move_file;
use super::types::{CacheError, FileStats, RepairReport, Sidecar};
use super::normalize_url;
use crate::catalog::{self, CacheEntry, CatalogQuery, CatalogStats, Entries, JsonCatalog};
use crate::config::CacheConfig;
use crate::extractor::MediaFile;
use crate::metrics;
use crate::platform::{path_extension, Platform};

/// Suffix of the per-file metadata sidecar.
pub const SIDECAR_SUFFIX: &str = ".metadata.json";

/// Directory (inside the cache dir) holding in-progress downloads.
pub const PARTIAL_DIR: &str = ".partial";

/// The cache directory plus its catalog.
pub struct CacheStore {
    dir: PathBuf,
    catalog_file: String,
    catalog: JsonCatalog,
    min_file_size: u64,
    adopt_orphans: bool,
}

impl CacheStore {
    /// Open the cache directory, creating it if needed.
    ///
    /// Fails if the directory cannot be created or written to. Leftover
    /// partial downloads from a previous run are removed.
    pub fn open(config: &CacheConfig) -> Result<Self, CacheError> {
        let dir = config.resolved_dir();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

        let probe = dir.join(format!(".write-test-{}", Uuid::new_v4()));
        fs::write(&probe, b"ok").map_err(|e| CacheError::io(&dir, e))?;
        let _ = fs::remove_file(&probe);

        let partial = dir.join(PARTIAL_DIR);
        if partial.exists() {
            match fs::remove_dir_all(&partial) {
                Ok(()) => debug!(path = %partial.display(), "Cleared partial downloads"),
                Err(e) => warn!(path = %partial.display(), error = %e, "Failed to clear partial downloads"),
            }
        }

        let catalog = JsonCatalog::load(&dir.join(&config.catalog_file));
        metrics::CATALOG_ENTRIES.set(catalog.len() as i64);

        info!(dir = %dir.display(), entries = catalog.len(), "Opened cache");

        Ok(Self {
            dir,
            catalog_file: config.catalog_file.clone(),
            catalog,
            min_file_size: config.min_file_size,
            adopt_orphans: config.adopt_orphans,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalog(&self) -> &JsonCatalog {
        &self.catalog
    }

    pub fn min_file_size(&self) -> u64 {
        self.min_file_size
    }

    /// Cache key for a raw URL.
    pub fn key(url: &str) -> Result<String, CacheError> {
        normalize_url(url)
    }

    /// Create a fresh work directory for one extraction.
    pub fn create_work_dir(&self) -> Result<PathBuf, CacheError> {
        let path = self.dir.join(PARTIAL_DIR).join(Uuid::new_v4().to_string());
        fs::create_dir_all(&path).map_err(|e| CacheError::io(&path, e))?;
        Ok(path)
    }

    /// Remove a work directory and everything in it.
    pub fn discard_work_dir(&self, path: &Path) {
        if let Err(e) = fs::remove_dir_all(path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove work directory");
            }
        }
    }

    /// Entry for a normalized URL, if its file is still on disk.
    ///
    /// An entry whose file is missing or empty is dropped from the catalog.
    pub fn lookup(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let Some(entry) = self.catalog.get(key) else {
            return Ok(None);
        };
        self.live_or_drop(entry)
    }

    /// Entry owning `filename`, if its file is still on disk.
    pub fn entry_by_filename(&self, filename: &str) -> Result<Option<CacheEntry>, CacheError> {
        let Some(entry) = self.catalog.find_by_filename(filename) else {
            return Ok(None);
        };
        self.live_or_drop(entry)
    }

    fn live_or_drop(&self, mut entry: CacheEntry) -> Result<Option<CacheEntry>, CacheError> {
        if let Some(size) = live_size(&self.dir.join(&entry.filename)) {
            entry.file_size = size;
            return Ok(Some(entry));
        }

        warn!(url = %entry.source_url, filename = %entry.filename, "Dropping entry with missing file");
        self.catalog.mutate(|entries| {
            if entries
                .get(&entry.source_url)
                .is_some_and(|e| e.filename == entry.filename)
            {
                entries.remove(&entry.source_url);
            }
            Ok::<_, CacheError>(())
        })?;
        self.update_gauge();
        Ok(None)
    }

    /// Move a downloaded file into the cache and index it under `key`.
    ///
    /// Returns only after the file is in place and the catalog is persisted.
    /// If the key already has a live entry that entry is returned unchanged.
    pub fn put(
        &self,
        key: &str,
        media: &MediaFile,
        platform: Platform,
    ) -> Result<CacheEntry, CacheError> {
        let size = fs::metadata(&media.path)
            .map_err(|e| CacheError::io(&media.path, e))?
            .len();
        if size < self.min_file_size {
            return Err(CacheError::TooSmall {
                size,
                min: self.min_file_size,
            });
        }

        let title = media
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(key)
            .to_string();
        let stem = sanitize(&title);
        let ext = normalize_extension(
            media
                .extension
                .as_deref()
                .or(path_extension(&media.path.to_string_lossy()).as_deref()),
        );

        let mut moved: Option<PathBuf> = None;
        let mut reused = false;
        let result = self.catalog.mutate(|entries| {
            if let Some(existing) = entries.get(key) {
                if let Some(existing_size) = live_size(&self.dir.join(&existing.filename)) {
                    reused = true;
                    let mut existing = existing.clone();
                    existing.file_size = existing_size;
                    return Ok(existing);
                }
            }

            let taken: HashSet<&str> = entries
                .values()
                .filter(|e| e.source_url != key)
                .map(|e| e.filename.as_str())
                .collect();
            let filename = unique_filename(&stem, &ext, |name| {
                taken.contains(name) || self.is_reserved(name) || self.dir.join(name).exists()
            });

            let destination = self.dir.join(&filename);
            move_file(&media.path, &destination)
                .map_err(|e| CacheError::io(&destination, e))?;
            moved = Some(destination);

            let entry = CacheEntry {
                source_url: key.to_string(),
                filename,
                title,
                platform,
                added_at: Utc::now(),
                file_size: size,
                content_hash: media.content_hash.clone(),
            };
            entries.insert(key.to_string(), entry.clone());
            Ok::<_, CacheError>(entry)
        });

        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                if let Some(path) = moved {
                    let _ = fs::remove_file(&path);
                }
                return Err(e);
            }
        };

        if reused {
            debug!(url = %key, filename = %entry.filename, "Entry already present, keeping existing file");
            return Ok(entry);
        }

        self.write_sidecar(&entry, media);
        self.update_gauge();
        info!(
            url = %key,
            filename = %entry.filename,
            size = entry.file_size,
            platform = %platform,
            "Stored media"
        );
        Ok(entry)
    }

    /// Drop the entry for `key` and delete its file and sidecar.
    ///
    /// Returns `false` if there was no entry.
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self
            .catalog
            .mutate(|entries| Ok::<_, CacheError>(entries.remove(key)))?;

        let Some(entry) = removed else {
            return Ok(false);
        };
        self.update_gauge();

        for path in [
            self.dir.join(&entry.filename),
            self.dir.join(sidecar_name(&entry.filename)),
        ] {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to delete cached file");
                }
            }
        }

        info!(url = %key, filename = %entry.filename, "Removed entry");
        Ok(true)
    }

    /// Reconcile the catalog with the directory contents.
    pub fn repair(&self) -> Result<RepairReport, CacheError> {
        let mut report = RepairReport::default();
        self.catalog
            .mutate(|entries| self.repair_entries(entries, &mut report))?;
        self.update_gauge();

        if report.changed() || !report.orphans.is_empty() {
            info!(
                fixed = report.fixed.len(),
                dropped = report.dropped.len(),
                adopted = report.adopted.len(),
                orphans = report.orphans.len(),
                "Repaired catalog"
            );
        }
        Ok(report)
    }

    fn repair_entries(
        &self,
        entries: &mut Entries,
        report: &mut RepairReport,
    ) -> Result<(), CacheError> {
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();

        for key in keys {
            let Some(filename) = entries.get(&key).map(|e| e.filename.clone()) else {
                continue;
            };
            if live_size(&self.dir.join(&filename)).is_some() {
                continue;
            }

            let (stem, ext) = match filename.rsplit_once('.') {
                Some((stem, ext)) => (stem, Some(ext)),
                None => (filename.as_str(), None),
            };
            let candidate = format!("{}.{}", sanitize(stem), normalize_extension(ext));
            let claimed = entries
                .values()
                .any(|e| e.filename == candidate && e.source_url != key);

            if candidate != filename
                && !claimed
                && live_size(&self.dir.join(&candidate)).is_some()
            {
                if let Some(entry) = entries.get_mut(&key) {
                    entry.filename = candidate.clone();
                }
                report.fixed.push((filename, candidate));
            } else {
                entries.remove(&key);
                report.dropped.push(key);
            }
        }

        let known: HashSet<String> = entries.values().map(|e| e.filename.clone()).collect();
        let mut on_disk = Vec::new();
        for item in fs::read_dir(&self.dir).map_err(|e| CacheError::io(&self.dir, e))? {
            let item = item.map_err(|e| CacheError::io(&self.dir, e))?;
            let name = item.file_name().to_string_lossy().into_owned();
            if self.is_reserved(&name) || known.contains(&name) {
                continue;
            }
            if item.file_type().map(|t| t.is_file()).unwrap_or(false) {
                on_disk.push(name);
            }
        }
        on_disk.sort();

        for name in on_disk {
            let sidecar = if self.adopt_orphans {
                self.read_sidecar(&name)
            } else {
                None
            };
            let size = live_size(&self.dir.join(&name));

            match (sidecar, size) {
                (Some(sidecar), Some(size)) => {
                    let key =
                        normalize_url(&sidecar.source_url).unwrap_or(sidecar.source_url.clone());
                    if entries.contains_key(&key) {
                        report.orphans.push(name);
                        continue;
                    }
                    entries.insert(
                        key.clone(),
                        CacheEntry {
                            source_url: key,
                            filename: name.clone(),
                            title: sidecar.title,
                            platform: sidecar.platform,
                            added_at: sidecar.downloaded_at,
                            file_size: size,
                            content_hash: None,
                        },
                    );
                    report.adopted.push(name);
                }
                _ => report.orphans.push(name),
            }
        }

        Ok(())
    }

    /// Catalog listing over entries whose files exist.
    ///
    /// Dangling entries found along the way are dropped.
    pub fn list(&self, query: &CatalogQuery) -> Result<Vec<CacheEntry>, CacheError> {
        let live = self.live_entries()?;
        Ok(catalog::project(live, query))
    }

    pub fn stats(&self) -> Result<CatalogStats, CacheError> {
        let live = self.live_entries()?;
        Ok(catalog::stats(&live))
    }

    fn live_entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut live = Vec::new();
        let mut dangling = Vec::new();
        for mut entry in self.catalog.snapshot() {
            match live_size(&self.dir.join(&entry.filename)) {
                Some(size) => {
                    entry.file_size = size;
                    live.push(entry);
                }
                None => dangling.push(entry),
            }
        }

        if !dangling.is_empty() {
            warn!(count = dangling.len(), "Dropping entries with missing files");
            self.catalog.mutate(|entries| {
                for entry in &dangling {
                    if entries
                        .get(&entry.source_url)
                        .is_some_and(|e| e.filename == entry.filename)
                    {
                        entries.remove(&entry.source_url);
                    }
                }
                Ok::<_, CacheError>(())
            })?;
            self.update_gauge();
        }
        Ok(live)
    }

    /// Path of a servable file in the cache directory.
    ///
    /// Rejects anything that is not a plain media file name: path separators,
    /// hidden files, sidecars and the catalog itself.
    pub fn media_path(&self, filename: &str) -> Result<PathBuf, CacheError> {
        let invalid = filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains('\0')
            || filename == ".."
            || self.is_reserved(filename);
        if invalid {
            return Err(CacheError::InvalidFilename(filename.to_string()));
        }
        Ok(self.dir.join(filename))
    }

    /// Size, timestamps and sidecar metadata of a cached file.
    pub fn file_stats(&self, filename: &str) -> Result<FileStats, CacheError> {
        let path = self.media_path(filename)?;
        let meta = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(CacheError::NotFound(filename.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::NotFound(filename.to_string()))
            }
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        let enhanced_metadata = self.read_sidecar_value(filename);

        Ok(FileStats {
            size: meta.len(),
            created: meta.created().ok().map(DateTime::<Utc>::from),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
            enhanced_metadata,
        })
    }

    fn is_reserved(&self, name: &str) -> bool {
        name.starts_with('.')
            || name.ends_with(SIDECAR_SUFFIX)
            || name == self.catalog_file
            || name
                .strip_prefix(self.catalog_file.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }

    fn write_sidecar(&self, entry: &CacheEntry, media: &MediaFile) {
        let sidecar = Sidecar {
            source_url: entry.source_url.clone(),
            title: entry.title.clone(),
            platform: entry.platform,
            strategy: Some(media.strategy.clone()),
            media_url: media.media_url.clone(),
            downloaded_at: entry.added_at,
            metadata: media.metadata.clone(),
        };
        let path = self.dir.join(sidecar_name(&entry.filename));
        let result = serde_json::to_vec_pretty(&sidecar)
            .map_err(std::io::Error::other)
            .and_then(|json| fs::write(&path, json));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to write metadata sidecar");
        }
    }

    fn read_sidecar(&self, filename: &str) -> Option<Sidecar> {
        let value = self.read_sidecar_value(filename)?;
        serde_json::from_value(value).ok()
    }

    fn read_sidecar_value(&self, filename: &str) -> Option<serde_json::Value> {
        let path = self.dir.join(sidecar_name(filename));
        let content = fs::read(&path).ok()?;
        match serde_json::from_slice(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable sidecar");
                None
            }
        }
    }

    fn update_gauge(&self) {
        metrics::CATALOG_ENTRIES.set(self.catalog.len() as i64);
    }
}

/// Sidecar file name for a media file.
pub fn sidecar_name(filename: &str) -> String {
    format!("{}{}", filename, SIDECAR_SUFFIX)
}

fn live_size(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|m| m.is_file() && m.len() > 0)
        .map(|m| m.len())
}
