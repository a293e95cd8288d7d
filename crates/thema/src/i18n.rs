// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Translation backend for the `t` tag.
//!
//! The engine only needs the [`Translator`] trait. [`CatalogTranslator`] is a
//! simple implementation holding one flat message catalog per locale, which
//! can be loaded from a directory of `<locale>.json` files:
//!
//! ```json
//! { "greeting": "Hello {name}", "nav": { "home": "Home" } }
//! ```
//!
//! Nested objects are flattened with dots (`nav.home`). Placeholders of the
//! form `{param}` are replaced with the rendered parameter values.

use crate::error::{Result, ThemaError};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Parameters passed to a translation, already resolved against the context.
pub type TranslationParams = BTreeMap<String, Value>;

/// Translation backend.
pub trait Translator: Send + Sync {
    /// Translates `key` for `locale` (or the default locale).
    ///
    /// Implementations return the key itself when no message exists.
    fn translate(&self, key: &str, params: &TranslationParams, locale: Option<&str>) -> String;
}

/// Translator that always returns the key. Used when no catalogs are configured.
#[derive(Debug, Clone, Default)]
pub struct KeyTranslator;

impl Translator for KeyTranslator {
    fn translate(&self, key: &str, _params: &TranslationParams, _locale: Option<&str>) -> String {
        key.to_string()
    }
}

/// Per-locale message catalogs with a default-locale fallback.
#[derive(Debug, Clone)]
pub struct CatalogTranslator {
    default_locale: String,
    catalogs: HashMap<String, HashMap<String, String>>,
}

impl CatalogTranslator {
    /// Creates a translator with no messages.
    pub fn new(default_locale: &str) -> Self {
        Self {
            default_locale: default_locale.to_string(),
            catalogs: HashMap::new(),
        }
    }

    /// Adds a single message.
    pub fn add_message(&mut self, locale: &str, key: &str, message: &str) {
        self.catalogs
            .entry(locale.to_string())
            .or_default()
            .insert(key.to_string(), message.to_string());
    }

    /// Merges a JSON catalog (nested objects are flattened with dots).
    pub fn add_catalog(&mut self, locale: &str, catalog: &serde_json::Value) {
        let mut flat = Vec::new();
        flatten("", catalog, &mut flat);
        for (key, message) in flat {
            self.add_message(locale, &key, &message);
        }
    }

    /// Loads every `<locale>.json` file in `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P, default_locale: &str) -> Result<Self> {
        let mut translator = Self::new(default_locale);
        let dir = dir.as_ref();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(locale) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let contents = std::fs::read_to_string(&path)?;
            let catalog: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
                ThemaError::ResolutionError(format!(
                    "Invalid translation catalog {}: {}",
                    path.display(),
                    e
                ))
            })?;
            tracing::debug!("Loaded translation catalog for locale '{}'", locale);
            translator.add_catalog(locale, &catalog);
        }
        Ok(translator)
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&String> {
        self.catalogs.get(locale).and_then(|c| c.get(key))
    }
}

impl Translator for CatalogTranslator {
    fn translate(&self, key: &str, params: &TranslationParams, locale: Option<&str>) -> String {
        let message = locale
            .and_then(|l| self.lookup(l, key))
            .or_else(|| self.lookup(&self.default_locale, key));

        match message {
            Some(message) => interpolate(message, params),
            None => key.to_string(),
        }
    }
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten(&key, v, out);
            }
        }
        serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        serde_json::Value::Null => {}
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

/// Replaces `{name}` placeholders with raw parameter values.
pub fn interpolate(message: &str, params: &TranslationParams) -> String {
    let mut out = message.to_string();
    for (name, value) in params {
        out = out.replace(&format!("{{{}}}", name), &value.render_raw());
    }
    out
}
