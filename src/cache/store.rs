//! Artifact cache service boundary and the filesystem-backed store
//!
//! The orchestrator only sees [`ArtifactCache`]: restore by key with an
//! ordered list of prefix fallbacks, save a set of paths under a key.
//! [`LocalCache`] implements it on a directory, one entry per key:
//!
//! ```text
//! <root>/<key>/manifest.json
//! <root>/<key>/data/0/...   copy of paths[0]
//! <root>/<key>/data/1/...   copy of paths[1]
//! ```

use crate::cache::key::CacheKey;
use crate::error::{SetupError, SetupResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const MANIFEST_FILE: &str = "manifest.json";
const DATA_DIR: &str = "data";

/// Result of a restore attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreResult {
    /// Whether any entry was restored
    pub hit: bool,
    /// The stored key that satisfied the lookup
    pub matched_key: Option<String>,
}

impl RestoreResult {
    pub fn miss() -> Self {
        Self::default()
    }

    pub fn matched(key: impl Into<String>) -> Self {
        Self {
            hit: true,
            matched_key: Some(key.into()),
        }
    }

    /// Whether the match was the primary key rather than a fallback
    pub fn is_exact(&self, key: &CacheKey) -> bool {
        self.matched_key.as_deref() == Some(key.as_str())
    }
}

/// Key-value artifact cache service
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    /// Restore `paths` from the first entry matching `key` exactly or one
    /// of `fallback_keys` by prefix, tried in order
    async fn restore(
        &self,
        key: &CacheKey,
        fallback_keys: &[CacheKey],
        paths: &[PathBuf],
    ) -> SetupResult<RestoreResult>;

    /// Store `paths` under `key`, replacing any existing entry
    async fn save(&self, key: &CacheKey, paths: &[PathBuf]) -> SetupResult<()>;
}

/// Metadata stored alongside each cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryManifest {
    pub key: String,
    pub created_at: DateTime<Utc>,
    /// Original locations, indexed like the `data/` subdirectories
    pub paths: Vec<Option<PathBuf>>,
    pub size_bytes: u64,
}

impl EntryManifest {
    /// Check if this entry is older than the given number of days
    pub fn is_older_than_days(&self, days: u32) -> bool {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        self.created_at < cutoff
    }
}

/// Filesystem-backed cache store
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default store location
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("leo-setup")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// All complete entries, newest first
    pub fn entries(&self) -> SetupResult<Vec<EntryManifest>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let read = fs::read_dir(&self.root)
            .map_err(|e| SetupError::io(format!("reading {}", self.root.display()), e))?;

        let mut entries = Vec::new();
        for item in read {
            let item =
                item.map_err(|e| SetupError::io(format!("reading {}", self.root.display()), e))?;
            let manifest_path = item.path().join(MANIFEST_FILE);
            // Staging directories and half-written entries have no manifest
            let Ok(content) = fs::read_to_string(&manifest_path) else {
                continue;
            };
            match serde_json::from_str::<EntryManifest>(&content) {
                Ok(manifest) => entries.push(manifest),
                Err(e) => debug!("Skipping unreadable manifest {}: {}", manifest_path.display(), e),
            }
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Find the entry for a key: exact match first, then newest prefix match
    fn lookup(&self, entries: &[EntryManifest], key: &CacheKey, exact_only: bool) -> Option<String> {
        if entries.iter().any(|e| e.key == key.as_str()) {
            return Some(key.to_string());
        }
        if exact_only {
            return None;
        }
        entries
            .iter()
            .find(|e| key.is_prefix_of(&e.key))
            .map(|e| e.key.clone())
    }

    /// Remove a single entry
    pub fn remove(&self, key: &str) -> SetupResult<()> {
        let dir = self.entry_dir(key);
        fs::remove_dir_all(&dir)
            .map_err(|e| SetupError::io(format!("removing {}", dir.display()), e))
    }

    fn restore_blocking(
        &self,
        key: &CacheKey,
        fallback_keys: &[CacheKey],
        paths: &[PathBuf],
    ) -> SetupResult<RestoreResult> {
        let entries = self.entries()?;

        let matched = std::iter::once((key, true))
            .chain(fallback_keys.iter().map(|k| (k, false)))
            .find_map(|(candidate, exact_only)| self.lookup(&entries, candidate, exact_only));

        let Some(matched) = matched else {
            debug!("Cache miss for {}", key);
            return Ok(RestoreResult::miss());
        };

        let data = self.entry_dir(&matched).join(DATA_DIR);
        for (index, target) in paths.iter().enumerate() {
            let source = data.join(index.to_string());
            if !source.exists() {
                debug!("Entry {} has no data for {}", matched, target.display());
                continue;
            }
            copy_tree(&source, target).map_err(|e| SetupError::CacheRestore {
                key: matched.clone(),
                reason: e.to_string(),
            })?;
        }

        info!("Restored cache entry {}", matched);
        Ok(RestoreResult::matched(matched))
    }

    fn save_blocking(&self, key: &CacheKey, paths: &[PathBuf]) -> SetupResult<()> {
        let save_err = |reason: String| SetupError::CacheSave {
            key: key.to_string(),
            reason,
        };

        if !paths.iter().any(|p| p.exists()) {
            return Err(save_err("none of the cache paths exist".to_string()));
        }

        fs::create_dir_all(&self.root).map_err(|e| save_err(e.to_string()))?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .map_err(|e| save_err(e.to_string()))?;

        let mut recorded = Vec::with_capacity(paths.len());
        let mut size_bytes = 0;
        for (index, source) in paths.iter().enumerate() {
            if !source.exists() {
                recorded.push(None);
                continue;
            }
            let target = staging.path().join(DATA_DIR).join(index.to_string());
            size_bytes += copy_tree(source, &target).map_err(|e| save_err(e.to_string()))?;
            recorded.push(Some(source.clone()));
        }

        let manifest = EntryManifest {
            key: key.to_string(),
            created_at: Utc::now(),
            paths: recorded,
            size_bytes,
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(staging.path().join(MANIFEST_FILE), json).map_err(|e| save_err(e.to_string()))?;

        let final_dir = self.entry_dir(key.as_str());
        if final_dir.exists() {
            fs::remove_dir_all(&final_dir).map_err(|e| save_err(e.to_string()))?;
        }
        publish_staged(staging, &final_dir).map_err(|e| save_err(e.to_string()))?;

        info!("Saved cache entry {} ({} bytes)", key, size_bytes);
        Ok(())
    }
}

#[async_trait]
impl ArtifactCache for LocalCache {
    async fn restore(
        &self,
        key: &CacheKey,
        fallback_keys: &[CacheKey],
        paths: &[PathBuf],
    ) -> SetupResult<RestoreResult> {
        let store = self.clone();
        let key = key.clone();
        let fallback_keys = fallback_keys.to_vec();
        let paths = paths.to_vec();
        tokio::task::spawn_blocking(move || store.restore_blocking(&key, &fallback_keys, &paths))
            .await
            .map_err(|e| SetupError::User(format!("cache restore task failed: {}", e)))?
    }

    async fn save(&self, key: &CacheKey, paths: &[PathBuf]) -> SetupResult<()> {
        let store = self.clone();
        let key = key.clone();
        let paths = paths.to_vec();
        tokio::task::spawn_blocking(move || store.save_blocking(&key, &paths))
            .await
            .map_err(|e| SetupError::User(format!("cache save task failed: {}", e)))?
    }
}

/// Move a staged entry into place; the staging dir is removed if the move fails
fn publish_staged(staging: tempfile::TempDir, final_dir: &Path) -> std::io::Result<()> {
    fs::rename(staging.path(), final_dir)?;
    // Already moved; disarm the drop cleanup
    let _ = staging.keep();
    Ok(())
}

/// Copy a file or directory tree, returning the number of bytes copied
fn copy_tree(source: &Path, target: &Path) -> std::io::Result<u64> {
    if source.is_file() {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        return fs::copy(source, target);
    }

    let mut bytes = 0;
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(std::io::Error::other)?;
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            bytes += fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(bytes)
}

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::CacheKeySet;
    use crate::params::{InstallRequest, RawParams};
    use tempfile::TempDir;

    fn key_set(toolchain: &str, arch: &str) -> CacheKeySet {
        let req = InstallRequest::from_raw(RawParams {
            toolchain_version: toolchain.to_string(),
            os: "linux".to_string(),
            arch: arch.to_string(),
            ..RawParams::for_version("3.4.0")
        })
        .unwrap();
        CacheKeySet::build(&req).unwrap()
    }

    #[tokio::test]
    async fn save_then_restore_exact() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("store"));
        let bin = dir.path().join("bin").join("leo");
        fs::create_dir_all(bin.parent().unwrap()).unwrap();
        fs::write(&bin, b"leo binary").unwrap();

        let keys = key_set("stable", "x86_64");
        cache.save(&keys.binary_key, &[bin.clone()]).await.unwrap();
        fs::remove_file(&bin).unwrap();

        let result = cache.restore(&keys.binary_key, &[], &[bin.clone()]).await.unwrap();
        assert!(result.hit);
        assert!(result.is_exact(&keys.binary_key));
        assert_eq!(fs::read(&bin).unwrap(), b"leo binary");
    }

    #[tokio::test]
    async fn restore_miss_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path());
        let keys = key_set("stable", "x86_64");

        let result = cache
            .restore(&keys.dependency_key, keys.dependency_fallbacks(), &[])
            .await
            .unwrap();
        assert_eq!(result, RestoreResult::miss());
    }

    #[tokio::test]
    async fn fallback_matches_by_prefix() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("store"));
        let registry = dir.path().join("registry");
        fs::create_dir_all(registry.join("index")).unwrap();
        fs::write(registry.join("index").join("crate"), b"data").unwrap();

        let old = key_set("1.81.0", "x86_64");
        cache.save(&old.dependency_key, &[registry.clone()]).await.unwrap();
        fs::remove_dir_all(&registry).unwrap();

        let new = key_set("1.82.0", "x86_64");
        let result = cache
            .restore(&new.dependency_key, new.dependency_fallbacks(), &[registry.clone()])
            .await
            .unwrap();

        assert!(result.hit);
        assert!(!result.is_exact(&new.dependency_key));
        assert_eq!(result.matched_key.as_deref(), Some(old.dependency_key.as_str()));
        assert!(registry.join("index").join("crate").exists());
    }

    #[tokio::test]
    async fn primary_key_is_exact_only() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("store"));
        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();

        let arm = key_set("stable", "arm64");
        cache.save(&arm.binary_key, &[file.clone()]).await.unwrap();

        let x86 = key_set("stable", "x86_64");
        let result = cache.restore(&x86.binary_key, &[], &[file]).await.unwrap();
        assert!(!result.hit);
    }

    #[tokio::test]
    async fn save_without_existing_paths_fails() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path());
        let keys = key_set("stable", "x86_64");

        let err = cache
            .save(&keys.binary_key, &[dir.path().join("missing")])
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::CacheSave { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn save_replaces_existing_entry() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("store"));
        let file = dir.path().join("leo");
        let keys = key_set("stable", "x86_64");

        fs::write(&file, b"first").unwrap();
        cache.save(&keys.binary_key, &[file.clone()]).await.unwrap();
        fs::write(&file, b"second").unwrap();
        cache.save(&keys.binary_key, &[file.clone()]).await.unwrap();

        let entries = cache.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size_bytes, 6);

        fs::remove_file(&file).unwrap();
        cache.restore(&keys.binary_key, &[], &[file.clone()]).await.unwrap();
        assert_eq!(fs::read(&file).unwrap(), b"second");
    }

    #[test]
    fn failed_publish_removes_staging_dir() {
        let dir = TempDir::new().unwrap();
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(dir.path())
            .unwrap();
        let staged = staging.path().to_path_buf();
        fs::write(staged.join(MANIFEST_FILE), "{}").unwrap();

        let unreachable = dir.path().join("no-such-parent").join("entry");
        assert!(publish_staged(staging, &unreachable).is_err());
        assert!(!staged.exists());
    }

    #[test]
    fn publish_moves_staging_dir() {
        let dir = TempDir::new().unwrap();
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(dir.path())
            .unwrap();
        fs::write(staging.path().join(MANIFEST_FILE), "{}").unwrap();

        let entry = dir.path().join("entry");
        publish_staged(staging, &entry).unwrap();
        assert!(entry.join(MANIFEST_FILE).exists());
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
