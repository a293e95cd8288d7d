// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Runtime helpers invoked from compiled templates.
//!
//! Tags such as `csrf`, `t`, `url`, `asset` and `menu` compile to helper
//! calls dispatched by name through a [`HelperRegistry`]. Calling a name with
//! no registration produces an empty string, so a theme written against a
//! richer host still renders.
//!
//! `menu` has no built-in implementation; hosts register one:
//!
//! ```rust,ignore
//! engine.register_helper("menu", |call: &HelperCall<'_>| {
//!     format!("<nav data-menu=\"{}\"></nav>", call.arg.unwrap_or_default())
//! });
//! ```

use crate::i18n::{KeyTranslator, TranslationParams, Translator};
use crate::value::Context;
use std::collections::HashMap;
use std::sync::Arc;

/// Arguments of one helper invocation.
#[derive(Debug)]
pub struct HelperCall<'a> {
    /// Literal argument from the tag (key, url, asset path, menu name).
    pub arg: Option<&'a str>,
    /// Named parameters, resolved against the context.
    pub params: TranslationParams,
    /// The render context.
    pub context: &'a Context,
    /// Locale requested for the render.
    pub locale: Option<&'a str>,
}

/// A named runtime helper. Output is escaped by the engine when the tag
/// asks for it, so helpers return plain text or markup.
pub trait Helper: Send + Sync {
    /// Produces the helper output.
    fn call(&self, call: &HelperCall<'_>) -> String;
}

impl<F> Helper for F
where
    F: Fn(&HelperCall<'_>) -> String + Send + Sync,
{
    fn call(&self, call: &HelperCall<'_>) -> String {
        self(call)
    }
}

/// Settings of the built-in helpers.
#[derive(Debug, Clone)]
pub struct HelperSettings {
    /// Prefix for `url` (e.g. `https://example.com` or `/site`).
    pub base_url: String,
    /// Prefix for `asset` (e.g. `/themes/default/assets`).
    pub asset_url: String,
    /// Appended to asset URLs as `v=<version>` for cache busting.
    pub asset_version: Option<String>,
    /// Context path read by `csrf`.
    pub csrf_key: String,
}

impl Default for HelperSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            asset_url: "/assets".to_string(),
            asset_version: None,
            csrf_key: "csrf_token".to_string(),
        }
    }
}

/// Joins `base` and `path` with exactly one `/`. Absolute URLs, fragments
/// and `mailto:` links are returned unchanged.
pub fn join_url(base: &str, path: &str) -> String {
    let is_absolute = ["http://", "https://", "//", "#", "mailto:"]
        .iter()
        .any(|prefix| path.starts_with(prefix));
    if is_absolute {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug)]
struct UrlHelper {
    base_url: String,
}

impl Helper for UrlHelper {
    fn call(&self, call: &HelperCall<'_>) -> String {
        join_url(&self.base_url, call.arg.unwrap_or_default())
    }
}

#[derive(Debug)]
struct AssetHelper {
    asset_url: String,
    version: Option<String>,
}

impl Helper for AssetHelper {
    fn call(&self, call: &HelperCall<'_>) -> String {
        let url = join_url(&self.asset_url, call.arg.unwrap_or_default());
        match &self.version {
            Some(version) => {
                let sep = if url.contains('?') { '&' } else { '?' };
                format!("{}{}v={}", url, sep, version)
            }
            None => url,
        }
    }
}

#[derive(Debug)]
struct CsrfHelper {
    key: String,
}

impl Helper for CsrfHelper {
    fn call(&self, call: &HelperCall<'_>) -> String {
        call.context.resolve(&self.key).render_raw()
    }
}

struct TranslateHelper {
    translator: Arc<dyn Translator>,
}

impl Helper for TranslateHelper {
    fn call(&self, call: &HelperCall<'_>) -> String {
        self.translator
            .translate(call.arg.unwrap_or_default(), &call.params, call.locale)
    }
}

/// Name-to-helper dispatch table.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    helpers: HashMap<String, Arc<dyn Helper>>,
}

impl std::fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.helpers.keys().collect();
        names.sort();
        f.debug_struct("HelperRegistry").field("helpers", &names).finish()
    }
}

impl HelperRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in `url`, `asset`, `csrf` and `t`
    /// helpers.
    pub fn with_defaults(settings: &HelperSettings, translator: Arc<dyn Translator>) -> Self {
        let mut registry = Self::new();
        registry.register(
            "url",
            UrlHelper {
                base_url: settings.base_url.clone(),
            },
        );
        registry.register(
            "asset",
            AssetHelper {
                asset_url: settings.asset_url.clone(),
                version: settings.asset_version.clone(),
            },
        );
        registry.register(
            "csrf",
            CsrfHelper {
                key: settings.csrf_key.clone(),
            },
        );
        registry.register("t", TranslateHelper { translator });
        registry
    }

    /// Built-in helpers with default settings and key-echo translation.
    pub fn standard() -> Self {
        Self::with_defaults(&HelperSettings::default(), Arc::new(KeyTranslator))
    }

    /// Registers or replaces the helper called `name`.
    pub fn register<H: Helper + 'static>(&mut self, name: &str, helper: H) {
        self.helpers.insert(name.to_string(), Arc::new(helper));
    }

    /// Returns true if `name` has a registration.
    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Invokes `name`; unregistered names produce an empty string.
    pub fn call(&self, name: &str, call: &HelperCall<'_>) -> String {
        match self.helpers.get(name) {
            Some(helper) => helper.call(call),
            None => {
                tracing::debug!("No helper registered for '{}', rendering nothing", name);
                String::new()
            }
        }
    }
}
