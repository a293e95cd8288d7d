// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File system watching for theme changes.
//!
//! This module provides `FileWatcher` for monitoring template changes
//! and triggering recompilation.
//!
//! # Features
//!
//! - Debounced file change events (750ms)
//! - Filters on the theme's template extension
//! - Recursive directory watching

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Watches a theme directory for changes to template files.
///
/// Uses debouncing to prevent multiple rapid recompiles and filters
/// events to only trigger on template files.
pub struct FileWatcher {
    #[allow(dead_code)]
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

/// Keeps the paths with extension `extension`, relative to `base_path`,
/// without duplicates.
pub fn relevant_paths(events: &[DebouncedEvent], base_path: &Path, extension: &str) -> Vec<PathBuf> {
    let mut changed: Vec<PathBuf> = Vec::new();
    for path in events.iter().flat_map(|e| e.paths.iter()) {
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let relative = path.strip_prefix(base_path).unwrap_or(path).to_path_buf();
        if !changed.contains(&relative) {
            changed.push(relative);
        }
    }
    changed
}

impl FileWatcher {
    /// Creates a new file watcher for the given directory.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory path to watch recursively
    /// * `extension` - Template extension that triggers the callback
    /// * `on_change` - Callback invoked with the changed paths, relative to `path`
    pub fn new<F>(path: PathBuf, extension: &str, on_change: F) -> anyhow::Result<Self>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let base_path = path.canonicalize().unwrap_or_else(|_| path.clone());
        let extension = extension.to_string();

        let mut debouncer = new_debouncer(
            Duration::from_millis(750),
            None,
            move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                Ok(events) => {
                    let changed_paths = relevant_paths(&events, &base_path, &extension);
                    if !changed_paths.is_empty() {
                        on_change(changed_paths);
                    }
                }
                Err(errors) => {
                    for error in errors {
                        tracing::warn!("Watch error: {}", error);
                    }
                }
            },
        )?;

        // In newer versions, Debouncer implements Watcher trait directly
        debouncer.watch(Path::new(&path), RecursiveMode::Recursive)?;

        Ok(Self { debouncer })
    }
}
