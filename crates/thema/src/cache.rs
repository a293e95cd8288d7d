// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiled-unit caching.
//!
//! Every compiled unit is stored under a key derived from the resolved
//! source path ([`cache_key`]). Units carry the modification time of the
//! source they were compiled from, which the engine checks in debug mode.
//!
//! # Cache Implementations
//!
//! - [`MemoryCache`]: In-memory LRU cache
//! - [`FileSystemCache`]: Persistent disk cache with an LRU memory layer
//! - [`NoOpCache`]: Never stores anything (always compile)
//!
//! # Custom Caches
//!
//! Implement the [`Cache`] trait to create custom caching strategies
//! (e.g., a shared network store).

use crate::ast::CompiledUnit;
use crate::error::{Result, ThemaError};
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Trait for compiled-unit caches.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait Cache: Send + Sync + std::fmt::Debug {
    /// Retrieves a unit from the cache.
    fn get(&self, key: &str) -> Result<Option<Arc<CompiledUnit>>>;
    /// Stores a unit in the cache.
    fn set(&self, key: &str, unit: Arc<CompiledUnit>) -> Result<()>;
    /// Removes a unit from the cache.
    fn remove(&self, key: &str) -> Result<()>;
    /// Clears all cached units.
    fn clear(&self) -> Result<()>;
    /// Checks if a key exists in the cache.
    fn contains_key(&self, key: &str) -> bool;
}

/// Derives the cache key of a resolved source path: its SHA-256, hex encoded.
pub fn cache_key(resolved_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(resolved_path.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// In-memory LRU (Least Recently Used) cache.
///
/// # Examples
///
/// ```rust,ignore
/// use thema::MemoryCache;
///
/// // Create a cache with capacity for 100 units
/// let cache = MemoryCache::new(100);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryCache {
    cache: Arc<Mutex<LruCache<String, Arc<CompiledUnit>>>>,
}

impl MemoryCache {
    /// Creates a new memory cache with the given capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, Arc<CompiledUnit>>>> {
        self.cache
            .lock()
            .map_err(|_| ThemaError::CacheError("Failed to acquire cache lock".to_string()))
    }

}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Arc<CompiledUnit>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, unit: Arc<CompiledUnit>) -> Result<()> {
        self.lock()?.put(key.to_string(), unit);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.pop(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn contains_key(&self, key: &str) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.contains(key))
            .unwrap_or(false)
    }
}

/// No-op cache that never stores or retrieves anything.
#[derive(Debug, Clone, Default)]
pub struct NoOpCache;

impl NoOpCache {
    /// Creates a new no-op cache.
    pub fn new() -> Self {
        Self
    }
}

impl Cache for NoOpCache {
    fn get(&self, _key: &str) -> Result<Option<Arc<CompiledUnit>>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _unit: Arc<CompiledUnit>) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn contains_key(&self, _key: &str) -> bool {
        false
    }
}

/// Persistent filesystem-backed cache with memory layer.
///
/// Each unit is one self-contained JSON artifact, `<cache_dir>/<key>.json`.
/// Artifacts are written to a temporary file in the same directory and
/// renamed into place, so concurrent writers never expose a partial file.
/// Artifacts produced by another compiler version are treated as misses.
#[derive(Debug, Clone)]
pub struct FileSystemCache {
    cache_dir: std::path::PathBuf,
    memory_cache: MemoryCache,
}

static TEMP_COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

impl FileSystemCache {
    /// Creates a new filesystem cache.
    ///
    /// # Arguments
    ///
    /// * `cache_dir` - Directory for storing compiled artifacts
    /// * `memory_capacity` - Size of in-memory LRU layer
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new<P: AsRef<std::path::Path>>(cache_dir: P, memory_capacity: usize) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            ThemaError::CacheError(format!("Failed to create cache directory: {}", e))
        })?;

        Ok(Self {
            cache_dir,
            memory_cache: MemoryCache::new(memory_capacity),
        })
    }

    /// Directory holding the artifacts.
    pub fn cache_dir(&self) -> &std::path::Path {
        &self.cache_dir
    }

    /// Location of the artifact stored under `key`.
    pub fn artifact_path(&self, key: &str) -> std::path::PathBuf {
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.cache_dir.join(format!("{}.json", safe_key))
    }

    fn write_atomic(&self, target: &std::path::Path, contents: &[u8]) -> Result<()> {
        let n = TEMP_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let file_name = target
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        let temp = self
            .cache_dir
            .join(format!(".{}.{}.{}.tmp", file_name, std::process::id(), n));

        std::fs::write(&temp, contents).map_err(|e| {
            ThemaError::CacheError(format!("Failed to write cache file: {}", e))
        })?;

        if let Err(e) = std::fs::rename(&temp, target) {
            let _ = std::fs::remove_file(&temp);
            return Err(ThemaError::CacheError(format!(
                "Failed to move cache file into place: {}",
                e
            )));
        }
        Ok(())
    }
}

impl Cache for FileSystemCache {
    fn get(&self, key: &str) -> Result<Option<Arc<CompiledUnit>>> {
        if let Some(unit) = self.memory_cache.get(key)? {
            return Ok(Some(unit));
        }

        let artifact = self.artifact_path(key);
        if !artifact.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&artifact).map_err(|e| {
            ThemaError::CacheError(format!("Failed to read cache file: {}", e))
        })?;

        let unit: CompiledUnit = match serde_json::from_str(&contents) {
            Ok(unit) => unit,
            Err(e) => {
                tracing::warn!("Ignoring unreadable artifact {}: {}", artifact.display(), e);
                return Ok(None);
            }
        };

        if !unit.is_current() {
            tracing::debug!(
                "Ignoring artifact {} from compiler version {}",
                artifact.display(),
                unit.version
            );
            return Ok(None);
        }

        let unit = Arc::new(unit);
        self.memory_cache.set(key, unit.clone())?;

        Ok(Some(unit))
    }

    fn set(&self, key: &str, unit: Arc<CompiledUnit>) -> Result<()> {
        let artifact = self.artifact_path(key);
        let contents = serde_json::to_vec(unit.as_ref())?;
        self.write_atomic(&artifact, &contents)?;

        self.memory_cache.set(key, unit)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.memory_cache.remove(key)?;

        let artifact = self.artifact_path(key);
        if artifact.exists() {
            std::fs::remove_file(&artifact).map_err(|e| {
                ThemaError::CacheError(format!("Failed to remove cache file: {}", e))
            })?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.memory_cache.clear()?;

        for entry in std::fs::read_dir(&self.cache_dir).map_err(|e| {
            ThemaError::CacheError(format!("Failed to read cache directory: {}", e))
        })? {
            let entry = entry.map_err(|e| {
                ThemaError::CacheError(format!("Failed to read directory entry: {}", e))
            })?;

            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext == "json" || ext == "tmp" {
                        std::fs::remove_file(&path).map_err(|e| {
                            ThemaError::CacheError(format!("Failed to remove file: {}", e))
                        })?;
                    }
                }
            }
        }

        Ok(())
    }

    fn contains_key(&self, key: &str) -> bool {
        self.memory_cache.contains_key(key) || self.artifact_path(key).exists()
    }
}
