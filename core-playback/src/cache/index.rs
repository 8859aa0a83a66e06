//! In-memory index of cached assets, ordered by recency.

use chrono::{DateTime, Utc};
use lru::LruCache;
use std::collections::HashMap;
use std::path::PathBuf;

use bridge_traits::AssetReference;

/// One finished asset on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub asset_title: String,
    pub local_path: PathBuf,
    pub source_url: String,
    pub last_accessed_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn to_reference(&self) -> AssetReference {
        AssetReference {
            asset_title: self.asset_title.clone(),
            local_path: self.local_path.clone(),
            source_url: self.source_url.clone(),
            last_accessed_at: self.last_accessed_at,
        }
    }
}

impl From<AssetReference> for CacheEntry {
    fn from(reference: AssetReference) -> Self {
        Self {
            asset_title: reference.asset_title,
            local_path: reference.local_path,
            source_url: reference.source_url,
            last_accessed_at: reference.last_accessed_at,
        }
    }
}

/// Recency-ordered entries keyed by asset title, with a URL lookup.
///
/// Capacity is enforced by the manager, not here, so eviction can run the
/// full cleanup path for every victim.
pub struct CacheIndex {
    entries: LruCache<String, CacheEntry>,
    titles_by_url: HashMap<String, String>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            titles_by_url: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, asset_title: &str) -> bool {
        self.entries.contains(asset_title)
    }

    /// Insert as most recently used, replacing any entry with the same title.
    pub fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        let previous = self.remove(&entry.asset_title);
        self.titles_by_url
            .insert(entry.source_url.clone(), entry.asset_title.clone());
        self.entries.put(entry.asset_title.clone(), entry);
        previous
    }

    pub fn remove(&mut self, asset_title: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(asset_title)?;
        if self.titles_by_url.get(&entry.source_url).map(String::as_str) == Some(asset_title) {
            self.titles_by_url.remove(&entry.source_url);
        }
        Some(entry)
    }

    pub fn title_for_url(&self, url: &str) -> Option<&str> {
        self.titles_by_url.get(url).map(String::as_str)
    }

    /// Look up without changing recency.
    pub fn peek(&self, asset_title: &str) -> Option<&CacheEntry> {
        self.entries.peek(asset_title)
    }

    /// Mark an entry as just used.
    pub fn touch(&mut self, asset_title: &str, at: DateTime<Utc>) -> Option<&CacheEntry> {
        let entry = self.entries.get_mut(asset_title)?;
        entry.last_accessed_at = at;
        Some(&*entry)
    }

    /// Remove and return the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<CacheEntry> {
        let (title, _) = self.entries.peek_lru()?;
        let title = title.clone();
        self.remove(&title)
    }

    /// Entries from least to most recently used.
    pub fn entries_lru_first(&self) -> Vec<&CacheEntry> {
        self.entries.iter().rev().map(|(_, entry)| entry).collect()
    }

    pub fn drain(&mut self) -> Vec<CacheEntry> {
        self.titles_by_url.clear();
        let mut drained = Vec::with_capacity(self.entries.len());
        while let Some((_, entry)) = self.entries.pop_lru() {
            drained.push(entry);
        }
        drained
    }
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheIndex")
            .field("len", &self.entries.len())
            .finish()
    }
}
