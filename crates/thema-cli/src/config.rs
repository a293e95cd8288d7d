// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! THEMA project configuration.
//!
//! Configuration is loaded from `thema.toml` at the project root. Every
//! section and field is optional.
//!
//! # Example Configuration
//!
//! ```toml
//! [theme]
//! dir = "themes/default"
//! extension = "tpl"
//!
//! [cache]
//! dir = "var/cache/templates"
//! memory_size = 256
//!
//! [helpers]
//! base_url = "https://example.com"
//! asset_url = "/themes/default/assets"
//! asset_version = "2024.1"
//!
//! [i18n]
//! dir = "translations"
//! default_locale = "en"
//!
//! [render]
//! debug = true
//! max_include_depth = 32
//! ```

use anyhow::Context as _;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thema::{
    CatalogTranslator, Engine, EngineOptions, FileSystemResolver, HelperRegistry, HelperSettings,
    KeyTranslator, NoOpCache, Translator, DEFAULT_EXTENSION, DEFAULT_MAX_INCLUDE_DEPTH,
};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "thema.toml";

/// Main configuration structure loaded from `thema.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Theme location.
    #[serde(default)]
    pub theme: ThemeConfig,
    /// Compiled-unit cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Built-in helper settings.
    #[serde(default)]
    pub helpers: HelpersConfig,
    /// Translation catalogs.
    #[serde(default)]
    pub i18n: I18nConfig,
    /// Render engine settings.
    #[serde(default)]
    pub render: RenderConfig,
}

/// Theme configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ThemeConfig {
    /// Theme root directory (default: "themes/default").
    #[serde(default = "default_theme_dir")]
    pub dir: String,
    /// Template file extension (default: "tpl").
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Cache configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Cache compiled units (default: true). When false every render
    /// recompiles.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Artifact directory (default: "var/cache/templates").
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    /// In-memory LRU capacity (default: 256).
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
}

/// Helper configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct HelpersConfig {
    /// Prefix for `url` (default: "").
    #[serde(default)]
    pub base_url: String,
    /// Prefix for `asset` (default: "/assets").
    #[serde(default = "default_asset_url")]
    pub asset_url: String,
    /// Cache-busting version appended to assets.
    #[serde(default)]
    pub asset_version: Option<String>,
    /// Context key read by `csrf` (default: "csrf_token").
    #[serde(default = "default_csrf_key")]
    pub csrf_key: String,
}

/// Translation configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct I18nConfig {
    /// Directory of `<locale>.json` catalogs. Keys are echoed when unset.
    #[serde(default)]
    pub dir: Option<String>,
    /// Fallback locale (default: "en").
    #[serde(default = "default_locale")]
    pub default_locale: String,
}

/// Render engine configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    /// Recompile templates whose source changed (default: false).
    #[serde(default)]
    pub debug: bool,
    /// Maximum include nesting (default: 32).
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,
}

fn default_theme_dir() -> String {
    "themes/default".to_string()
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> String {
    "var/cache/templates".to_string()
}

fn default_memory_size() -> usize {
    256
}

fn default_asset_url() -> String {
    "/assets".to_string()
}

fn default_csrf_key() -> String {
    "csrf_token".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_max_include_depth() -> usize {
    DEFAULT_MAX_INCLUDE_DEPTH
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            dir: default_theme_dir(),
            extension: default_extension(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            memory_size: default_memory_size(),
        }
    }
}

impl Default for HelpersConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            asset_url: default_asset_url(),
            asset_version: None,
            csrf_key: default_csrf_key(),
        }
    }
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            dir: None,
            default_locale: default_locale(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_include_depth: default_max_include_depth(),
        }
    }
}

impl Config {
    /// Loads configuration from `thema.toml` in the current directory.
    ///
    /// If no configuration file exists, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config_path = path.as_ref();

        if !config_path.exists() {
            tracing::debug!("No {} found, using defaults", config_path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
        Ok(config)
    }

    /// Builds the translator described by `[i18n]`.
    pub fn translator(&self) -> anyhow::Result<Arc<dyn Translator>> {
        match &self.i18n.dir {
            Some(dir) => {
                let catalogs = CatalogTranslator::from_dir(dir, &self.i18n.default_locale)
                    .with_context(|| format!("Failed to load translations from {}", dir))?;
                Ok(Arc::new(catalogs))
            }
            None => Ok(Arc::new(KeyTranslator)),
        }
    }

    /// Builds the helper table described by `[helpers]` and `[i18n]`.
    pub fn helpers(&self) -> anyhow::Result<HelperRegistry> {
        let settings = HelperSettings {
            base_url: self.helpers.base_url.clone(),
            asset_url: self.helpers.asset_url.clone(),
            asset_version: self.helpers.asset_version.clone(),
            csrf_key: self.helpers.csrf_key.clone(),
        };
        Ok(HelperRegistry::with_defaults(&settings, self.translator()?))
    }

    /// Builds an engine for the configured theme.
    pub fn engine(&self) -> anyhow::Result<Engine<FileSystemResolver>> {
        let resolver =
            FileSystemResolver::new(&self.theme.dir).with_extension(&self.theme.extension);

        let engine = if self.cache.enabled {
            Engine::with_filesystem_cache(resolver, &self.cache.dir, self.cache.memory_size)
                .with_context(|| format!("Failed to open cache directory {}", self.cache.dir))?
        } else {
            Engine::new(resolver, Box::new(NoOpCache::new()))
        };

        Ok(engine
            .with_helpers(self.helpers()?)
            .with_options(EngineOptions {
                debug: self.render.debug,
                max_include_depth: self.render.max_include_depth,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.theme.dir, "themes/default");
        assert_eq!(config.theme.extension, "tpl");
        assert!(config.cache.enabled);
        assert_eq!(config.helpers.csrf_key, "csrf_token");
        assert_eq!(config.render.max_include_depth, 32);
        assert!(!config.render.debug);
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
[theme]
dir = "site/theme"

[helpers]
asset_version = "7"

[render]
debug = true
"#,
        )
        .unwrap();
        assert_eq!(config.theme.dir, "site/theme");
        assert_eq!(config.theme.extension, "tpl");
        assert_eq!(config.helpers.asset_url, "/assets");
        assert_eq!(config.helpers.asset_version.as_deref(), Some("7"));
        assert!(config.render.debug);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load_from("/nonexistent/thema.toml").unwrap();
        assert_eq!(config.cache.dir, "var/cache/templates");
    }
}
