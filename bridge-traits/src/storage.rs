//! Storage and File System Abstractions
//!
//! Provides platform-agnostic traits for the file operations the asset cache
//! performs and for the key-value store that persists cache references across
//! process restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O operations to support different platforms:
/// - Desktop: Direct filesystem access
/// - iOS/Android: Sandboxed app cache directories
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn promote(fs: &dyn FileSystemAccess, temp: &Path, title: &str) -> Result<PathBuf> {
///     let target = fs.get_cache_directory().await?.join(title);
///     fs.move_file(temp, &target).await?;
///     Ok(target)
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's cache directory
    ///
    /// This directory is suitable for files that can be deleted by the
    /// system when storage is low.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Synchronous probe for a regular file.
    ///
    /// Used by lookups that must answer without suspending. Any error is
    /// reported as "not a file".
    fn is_file(&self, path: &Path) -> bool;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Move a file, replacing `to` if it exists.
    ///
    /// Within one volume this is a rename and never exposes a partially
    /// written destination.
    async fn move_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and all its contents
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Delete `path` if present. Missing files are not an error.
    async fn remove_if_exists(&self, path: &Path) -> Result<bool> {
        if self.exists(path).await? {
            self.delete_file(path).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Persisted record of one cached asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReference {
    /// Logical name of the asset; also its file name in the cache directory.
    pub asset_title: String,
    pub local_path: PathBuf,
    /// Source URL the asset was downloaded from.
    pub source_url: String,
    pub last_accessed_at: DateTime<Utc>,
}

/// Key-value persistence for cache references.
///
/// Durability and on-disk format are up to the host:
/// - iOS: UserDefaults
/// - Android: SharedPreferences / DataStore
/// - Desktop: SQLite
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Insert or replace the reference keyed by its asset title.
    async fn persist_reference(&self, reference: &AssetReference) -> Result<()>;

    async fn resolve_reference(&self, asset_title: &str) -> Result<Option<AssetReference>>;

    /// Removing an unknown title is not an error.
    async fn remove_reference(&self, asset_title: &str) -> Result<()>;

    async fn list_references(&self) -> Result<Vec<AssetReference>>;

    /// Refresh only the access timestamp.
    async fn touch_reference(&self, asset_title: &str, accessed_at: DateTime<Utc>) -> Result<()> {
        if let Some(mut reference) = self.resolve_reference(asset_title).await? {
            reference.last_accessed_at = accessed_at;
            self.persist_reference(&reference).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_reference_roundtrips_through_json() {
        let reference = AssetReference {
            asset_title: "abc.mp4".into(),
            local_path: PathBuf::from("/cache/abc.mp4"),
            source_url: "https://cdn/abc.mp4".into(),
            last_accessed_at: Utc::now(),
        };

        let json = serde_json::to_string(&reference).unwrap();
        let back: AssetReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reference);
    }
}
