//! Derived views over catalog entries: sorted/filtered listings and stats.

use std::cmp::Ordering;

use super::{CacheEntry, CatalogQuery, CatalogStats, SortKey};

/// Apply `query` to `entries`. Ordering is always derived here, never stored.
pub fn project(entries: Vec<CacheEntry>, query: &CatalogQuery) -> Vec<CacheEntry> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut selected: Vec<CacheEntry> = entries
        .into_iter()
        .filter(|e| query.platform.map_or(true, |p| e.platform == p))
        .filter(|e| match &needle {
            Some(n) => {
                e.title.to_lowercase().contains(n) || e.source_url.to_lowercase().contains(n)
            }
            None => true,
        })
        .collect();

    selected.sort_by(|a, b| compare(a, b, query.sort));

    if let Some(limit) = query.limit {
        selected.truncate(limit);
    }
    selected
}

fn compare(a: &CacheEntry, b: &CacheEntry, key: SortKey) -> Ordering {
    match key {
        SortKey::Title => a
            .title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.added_at.cmp(&b.added_at)),
        SortKey::AddedAt => a
            .added_at
            .cmp(&b.added_at)
            .then_with(|| a.source_url.cmp(&b.source_url)),
        SortKey::Size => b
            .file_size
            .cmp(&a.file_size)
            .then_with(|| a.added_at.cmp(&b.added_at)),
    }
}

/// Aggregate statistics over `entries`.
pub fn stats(entries: &[CacheEntry]) -> CatalogStats {
    let mut stats = CatalogStats::default();
    for entry in entries {
        stats.total_entries += 1;
        stats.total_bytes += entry.file_size;
        *stats
            .by_platform
            .entry(entry.platform.as_str().to_string())
            .or_insert(0) += 1;
        stats.oldest_entry = Some(match stats.oldest_entry {
            Some(t) if t <= entry.added_at => t,
            _ => entry.added_at,
        });
        stats.newest_entry = Some(match stats.newest_entry {
            Some(t) if t >= entry.added_at => t,
            _ => entry.added_at,
        });
    }
    stats
}
