// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Theme template resolution.
//!
//! This module provides the [`ResourceResolver`] trait and implementations
//! for locating and loading template sources of the active theme.
//!
//! # Resolver Implementations
//!
//! - [`FileSystemResolver`]: Loads templates from a theme directory (native builds)
//! - [`MemoryResourceResolver`]: Loads templates from in-memory storage (testing)
//!
//! # Logical Names
//!
//! Templates are addressed by logical names: the path relative to the theme
//! root without the template extension, always with `/` separators
//! (`layouts/base`, `pages/home`). A name that already carries the extension
//! is accepted as well.

use crate::error::{Result, ThemaError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Default template file extension.
pub const DEFAULT_EXTENSION: &str = "tpl";

/// Converts a Path to a normalized string with forward slashes.
/// On Windows, uses path components to rebuild with `/` separators.
#[inline]
pub fn path_to_string<P: AsRef<Path>>(path: P) -> String {
    #[cfg(windows)]
    {
        use std::path::Component;
        let path = path.as_ref();
        let mut result = String::new();
        for (i, component) in path.components().enumerate() {
            if i > 0 {
                result.push('/');
            }
            match component {
                Component::Prefix(p) => result.push_str(&p.as_os_str().to_string_lossy()),
                Component::RootDir => result.push('/'),
                Component::CurDir => result.push('.'),
                Component::ParentDir => result.push_str(".."),
                Component::Normal(s) => result.push_str(&s.to_string_lossy()),
            }
        }
        result
    }
    #[cfg(not(windows))]
    {
        path.as_ref().to_string_lossy().to_string()
    }
}

/// A resolved template with its concrete location and source.
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// Concrete, stable location of the template (canonical path on disk).
    pub path: String,
    /// The template source code.
    pub source: String,
    /// Last modification time of the source, when known.
    pub modified: Option<SystemTime>,
}

/// Trait for resolving and loading theme templates.
///
/// Implement this trait to load templates from other places (database,
/// embedded assets, a parent-theme chain). Implementations must be
/// thread-safe (`Send + Sync`).
pub trait ResourceResolver: Send + Sync + 'static {
    /// Resolves a logical template name and loads its source.
    ///
    /// Fails with [`ThemaError::TemplateNotFound`] when no such template exists.
    fn resolve(&self, name: &str) -> Result<ResolvedResource>;

    /// Returns the concrete location `resolve` would report for `name`,
    /// without loading the source.
    ///
    /// Unlike `resolve` this also succeeds for templates that no longer
    /// exist, so their cache entries can still be found and dropped.
    fn locate(&self, name: &str) -> Result<String> {
        self.resolve(name).map(|resource| resource.path)
    }

    /// Lists the logical names of every template this resolver can serve.
    fn list_templates(&self) -> Result<Vec<String>>;
}

/// Strips a leading `/` and a trailing `.{extension}` from a logical name.
pub fn normalize_name(name: &str, extension: &str) -> String {
    let name = name.trim().trim_start_matches('/');
    let suffix = format!(".{}", extension);
    name.strip_suffix(&suffix).unwrap_or(name).to_string()
}

/// Filesystem-based theme resolver.
///
/// Loads `<root>/<name>.<extension>`; discovery walks the root recursively.
/// Only available with the `filesystem` feature.
///
/// # Examples
///
/// ```rust,ignore
/// use thema::FileSystemResolver;
///
/// let resolver = FileSystemResolver::new("./themes/default");
/// let resource = resolver.resolve("pages/home")?;
/// ```
#[cfg(feature = "filesystem")]
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    /// The theme root directory.
    pub root_dir: String,
    /// Template file extension, without the leading dot.
    pub extension: String,
}

#[cfg(feature = "filesystem")]
impl FileSystemResolver {
    /// Creates a resolver for the theme rooted at `root_dir`.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        Self {
            root_dir: path_to_string(root_dir.as_ref()),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Sets the template file extension (default `tpl`).
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    fn resolve_path(&self, name: &str) -> Result<std::path::PathBuf> {
        let logical = normalize_name(name, &self.extension);
        let candidate = Path::new(&self.root_dir).join(format!("{}.{}", logical, self.extension));
        tracing::debug!("Resolved path for '{}': {}", name, candidate.display());

        if !candidate.is_file() {
            return Err(ThemaError::TemplateNotFound(name.to_string()));
        }

        let canonical_path = std::fs::canonicalize(&candidate).map_err(|e| {
            ThemaError::ResolutionError(format!(
                "Failed to canonicalize path '{}': {}",
                candidate.display(),
                e
            ))
        })?;
        let canonical_root = std::fs::canonicalize(&self.root_dir).map_err(|e| {
            ThemaError::ResolutionError(format!(
                "Failed to canonicalize root '{}': {}",
                self.root_dir, e
            ))
        })?;

        // Reject symlinks and `..` segments that leave the theme.
        if !canonical_path.starts_with(&canonical_root) {
            return Err(ThemaError::ResolutionError(format!(
                "Security: Path '{}' escapes the theme directory",
                name
            )));
        }

        Ok(canonical_path)
    }
}

#[cfg(feature = "filesystem")]
impl ResourceResolver for FileSystemResolver {
    fn resolve(&self, name: &str) -> Result<ResolvedResource> {
        let path = self.resolve_path(name)?;
        let source = std::fs::read_to_string(&path)?;
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        Ok(ResolvedResource {
            path: path_to_string(&path),
            source,
            modified,
        })
    }

    fn locate(&self, name: &str) -> Result<String> {
        match self.resolve_path(name) {
            Ok(path) => Ok(path_to_string(&path)),
            Err(ThemaError::TemplateNotFound(_)) => {
                // Gone from disk: rebuild the path under the canonical root.
                let canonical_root = std::fs::canonicalize(&self.root_dir).map_err(|e| {
                    ThemaError::ResolutionError(format!(
                        "Failed to canonicalize root '{}': {}",
                        self.root_dir, e
                    ))
                })?;
                let logical = normalize_name(name, &self.extension);
                Ok(path_to_string(
                    canonical_root.join(format!("{}.{}", logical, self.extension)),
                ))
            }
            Err(e) => Err(e),
        }
    }

    fn list_templates(&self) -> Result<Vec<String>> {
        let root = Path::new(&self.root_dir);
        if !root.is_dir() {
            return Err(ThemaError::ResolutionError(format!(
                "Theme directory '{}' does not exist",
                self.root_dir
            )));
        }

        let pattern = format!(
            "{}/**/*.{}",
            glob::Pattern::escape(&self.root_dir),
            self.extension
        );
        let paths = glob::glob(&pattern)
            .map_err(|e| ThemaError::ResolutionError(format!("Invalid pattern: {}", e)))?;

        let mut names = Vec::new();
        for path in paths.flatten() {
            if !path.is_file() {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(root) {
                names.push(normalize_name(&path_to_string(relative), &self.extension));
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory theme resolver.
///
/// Stores templates in a shared map; clones share the same storage, so a
/// test can keep a handle and edit templates after handing a clone to an
/// engine. Each template records the time it was last set as its
/// modification time.
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceResolver {
    templates: Arc<Mutex<HashMap<String, (String, SystemTime)>>>,
}

impl MemoryResourceResolver {
    /// Creates an empty memory resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a template.
    pub fn add_template(&self, name: &str, source: &str) {
        self.add_template_at(name, source, SystemTime::now());
    }

    /// Adds or replaces a template with an explicit modification time.
    pub fn add_template_at(&self, name: &str, source: &str, modified: SystemTime) {
        if let Ok(mut templates) = self.templates.lock() {
            templates.insert(
                normalize_name(name, DEFAULT_EXTENSION),
                (source.to_string(), modified),
            );
        }
    }

    /// Removes a template.
    pub fn remove_template(&self, name: &str) {
        if let Ok(mut templates) = self.templates.lock() {
            templates.remove(&normalize_name(name, DEFAULT_EXTENSION));
        }
    }
}

impl ResourceResolver for MemoryResourceResolver {
    fn resolve(&self, name: &str) -> Result<ResolvedResource> {
        let key = normalize_name(name, DEFAULT_EXTENSION);
        let templates = self
            .templates
            .lock()
            .map_err(|_| ThemaError::ResolutionError("Template store lock poisoned".to_string()))?;
        let (source, modified) = templates
            .get(&key)
            .ok_or_else(|| ThemaError::TemplateNotFound(name.to_string()))?;
        Ok(ResolvedResource {
            path: format!("memory:{}", key),
            source: source.clone(),
            modified: Some(*modified),
        })
    }

    fn locate(&self, name: &str) -> Result<String> {
        Ok(format!("memory:{}", normalize_name(name, DEFAULT_EXTENSION)))
    }

    fn list_templates(&self) -> Result<Vec<String>> {
        let templates = self
            .templates
            .lock()
            .map_err(|_| ThemaError::ResolutionError("Template store lock poisoned".to_string()))?;
        let mut names: Vec<String> = templates.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
