// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! THEMA render engine.
//!
//! This module provides the core [`Engine`] type that handles the complete
//! template lifecycle: resolution, compilation, caching, inheritance and
//! rendering.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use thema::{Context, Engine, FileSystemResolver, RenderOptions};
//!
//! let resolver = FileSystemResolver::new("./themes/default");
//! let engine = Engine::with_filesystem_cache(resolver, "./var/cache/templates", 256)?;
//!
//! let mut context = Context::from_serialize(serde_json::json!({ "page": { "title": "Home" } }))?;
//! let html = engine.render("pages/home", &mut context, &RenderOptions::default())?;
//! ```
//!
//! # Inheritance
//!
//! A template that `extends` a parent is rendered in two passes. The child
//! runs first in collecting mode, filling the block registry of a fresh
//! [`RenderState`]. The parent then runs in normal mode and every `block`
//! emits the child's override when one was collected, its own default body
//! otherwise. Only the immediate parent is executed.
//!
//! Every render call owns its `RenderState`, so an `include` that itself
//! extends a layout never sees or disturbs the registry of the template
//! that included it.
//!
//! # Caching
//!
//! Compiled units are looked up by the hash of the resolved source path. In
//! production mode a cached unit is always reused; in debug mode it is
//! recompiled when the source modification time differs from the one
//! recorded in the unit at compile time.

use crate::ast::{CompiledUnit, Node};
use crate::cache::{cache_key, Cache, FileSystemCache, MemoryCache};
use crate::compiler::compile;
use crate::error::{Result, ThemaError};
use crate::helpers::{Helper, HelperCall, HelperRegistry};
use crate::resolver::{ResolvedResource, ResourceResolver};
use crate::value::{escape_html, Context, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the block returned by partial renders.
pub const CONTENT_BLOCK: &str = "content";

/// Default limit for nested includes.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// Engine-wide settings.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Recompile cached units whose source changed (development mode).
    pub debug: bool,
    /// Maximum include nesting before rendering fails.
    pub max_include_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            debug: false,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

/// Per-call render options.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// For templates that extend a layout: return only the collected
    /// `content` block instead of the full page.
    pub render_partial: bool,
    /// Execute in collecting mode: blocks fill the registry.
    pub collect_blocks: bool,
    /// Locale passed to the translation helper.
    pub locale: Option<String>,
}

impl RenderOptions {
    /// Options for a partial render.
    pub fn partial() -> Self {
        Self {
            render_partial: true,
            ..Self::default()
        }
    }

    /// Sets the locale.
    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = Some(locale.to_string());
        self
    }
}

/// Mutable state of one render call.
#[derive(Debug, Default)]
pub struct RenderState {
    blocks: HashMap<String, String>,
    collecting: bool,
    locale: Option<String>,
    depth: usize,
}

impl RenderState {
    fn new(collecting: bool, locale: Option<String>, depth: usize) -> Self {
        Self {
            blocks: HashMap::new(),
            collecting,
            locale,
            depth,
        }
    }

    /// The block registry collected so far.
    pub fn blocks(&self) -> &HashMap<String, String> {
        &self.blocks
    }

    /// Whether blocks are being collected.
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }
}

/// Main THEMA template engine.
///
/// The engine is generic over the resource resolver type `R`, which stands
/// for the active theme.
///
/// # Examples
///
/// ```rust,ignore
/// use thema::{Engine, MemoryResourceResolver};
///
/// let resolver = MemoryResourceResolver::new();
/// resolver.add_template("hello", "<h1>Hello, {% name %}!</h1>");
///
/// let engine = Engine::with_memory_cache(resolver, 100);
/// ```
#[derive(Debug)]
pub struct Engine<R: ResourceResolver> {
    resolver: R,
    cache: Box<dyn Cache>,
    helpers: HelperRegistry,
    options: EngineOptions,
}

impl<R: ResourceResolver> Engine<R> {
    /// Creates an engine with the given resolver and cache, the standard
    /// helpers and default options.
    pub fn new(resolver: R, cache: Box<dyn Cache>) -> Self {
        Self {
            resolver,
            cache,
            helpers: HelperRegistry::standard(),
            options: EngineOptions::default(),
        }
    }

    /// Creates an engine with an in-memory LRU cache.
    pub fn with_memory_cache(resolver: R, cache_size: usize) -> Self {
        Self::new(resolver, Box::new(MemoryCache::new(cache_size)))
    }

    /// Creates an engine with a filesystem-backed cache.
    ///
    /// # Arguments
    ///
    /// * `resolver` - Theme resolver
    /// * `cache_dir` - Directory path for storing compiled units
    /// * `memory_size` - Size of in-memory LRU cache on top of disk cache
    pub fn with_filesystem_cache<P: AsRef<std::path::Path>>(
        resolver: R,
        cache_dir: P,
        memory_size: usize,
    ) -> Result<Self> {
        let cache = FileSystemCache::new(cache_dir, memory_size)?;
        Ok(Self::new(resolver, Box::new(cache)))
    }

    /// Replaces the engine options.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the helper table.
    pub fn with_helpers(mut self, helpers: HelperRegistry) -> Self {
        self.helpers = helpers;
        self
    }

    /// Enables or disables debug mode (source modification checks).
    pub fn set_debug(&mut self, enabled: bool) {
        self.options.debug = enabled;
    }

    /// Current options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The theme resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Registers or replaces a runtime helper.
    pub fn register_helper<H: Helper + 'static>(&mut self, name: &str, helper: H) {
        self.helpers.register(name, helper);
    }

    /// Resolves, compiles (or fetches from cache) and returns the unit for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ThemaError::TemplateNotFound`] if the theme has no such template.
    pub fn load(&self, name: &str) -> Result<Arc<CompiledUnit>> {
        let resource = self.resolver.resolve(name)?;
        let (unit, _) = self.load_resolved(name, &resource);
        Ok(unit)
    }

    /// Compile-and-cache path shared by rendering and warmup.
    ///
    /// Returns the unit together with the error of a failed cache write, if
    /// any. The unit is usable either way.
    pub(crate) fn load_resolved(
        &self,
        name: &str,
        resource: &ResolvedResource,
    ) -> (Arc<CompiledUnit>, Option<ThemaError>) {
        let key = cache_key(&resource.path);

        match self.cache.get(&key) {
            Ok(Some(unit)) => {
                if !self.options.debug || unit.source_modified == resource.modified {
                    tracing::debug!("Cache hit for '{}'", name);
                    return (unit, None);
                }
                tracing::debug!("Source of '{}' changed, recompiling", name);
            }
            Ok(None) => tracing::debug!("Cache miss for '{}'", name),
            Err(e) => tracing::warn!("Cache read for '{}' failed: {}", name, e),
        }

        let unit = Arc::new(
            compile(&resource.source)
                .named(name, Some(resource.path.clone()))
                .with_source_modified(resource.modified),
        );
        let store_error = match self.cache.set(&key, unit.clone()) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Serving '{}' uncached, cache write failed: {}", name, e);
                Some(e)
            }
        };
        (unit, store_error)
    }

    /// Renders a template by name.
    ///
    /// Performs the two-pass inheritance render when the template extends a
    /// parent. The context is restored to its original bindings afterwards.
    ///
    /// # Errors
    ///
    /// Fails if the template, its parent, or any included template cannot be
    /// resolved, or if includes nest deeper than the configured limit.
    pub fn render(&self, name: &str, context: &mut Context, options: &RenderOptions) -> Result<String> {
        self.render_at(name, context, options, 0)
    }

    /// Executes a template once with a fresh block registry, without
    /// inheritance. With `collect_blocks` its blocks are collected instead
    /// of resolved against overrides.
    pub fn include_template(
        &self,
        name: &str,
        context: &mut Context,
        options: &RenderOptions,
    ) -> Result<String> {
        let unit = self.load(name)?;
        let mut state = RenderState::new(options.collect_blocks, options.locale.clone(), 0);
        self.execute_unit(&unit, context, &mut state)
    }

    /// Compiles and renders source text directly, bypassing the cache.
    /// `extends` and `include` targets are loaded from the theme.
    pub fn render_source(
        &self,
        source: &str,
        context: &mut Context,
        options: &RenderOptions,
    ) -> Result<String> {
        let unit = compile(source).named("<inline>", None);
        self.render_unit(&unit, context, options, 0)
    }

    fn render_at(
        &self,
        name: &str,
        context: &mut Context,
        options: &RenderOptions,
        depth: usize,
    ) -> Result<String> {
        if depth > self.options.max_include_depth {
            return Err(ThemaError::IncludeDepthExceeded {
                template: name.to_string(),
                depth: self.options.max_include_depth,
            });
        }
        let unit = self.load(name)?;
        self.render_unit(&unit, context, options, depth)
    }

    fn render_unit(
        &self,
        unit: &CompiledUnit,
        context: &mut Context,
        options: &RenderOptions,
        depth: usize,
    ) -> Result<String> {
        let Some(parent) = unit.extends.as_deref() else {
            let mut state = RenderState::new(options.collect_blocks, options.locale.clone(), depth);
            return self.execute_unit(unit, context, &mut state);
        };

        let mut state = RenderState::new(true, options.locale.clone(), depth);
        self.execute_unit(unit, context, &mut state)?;

        if options.render_partial {
            if let Some(content) = state.blocks.remove(CONTENT_BLOCK) {
                return Ok(content);
            }
        }

        tracing::debug!("Rendering '{}' through parent '{}'", unit.name, parent);
        let parent_unit = self.load(parent)?;
        state.collecting = false;
        self.execute_unit(&parent_unit, context, &mut state)
    }

    fn execute_unit(
        &self,
        unit: &CompiledUnit,
        context: &mut Context,
        state: &mut RenderState,
    ) -> Result<String> {
        let mut out = String::new();
        self.execute(&unit.nodes, context, state, &mut out)
            .map_err(|e| e.in_template(&unit.name))?;
        Ok(out)
    }

    fn execute(
        &self,
        nodes: &[Node],
        context: &mut Context,
        state: &mut RenderState,
        out: &mut String,
    ) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Value { path, escape } => {
                    let value = context.resolve(path);
                    if *escape {
                        out.push_str(&value.render_escaped());
                    } else {
                        out.push_str(&value.render_raw());
                    }
                }
                Node::Block { name, body } => {
                    if state.collecting {
                        let mut captured = String::new();
                        self.execute(body, context, state, &mut captured)?;
                        out.push_str(&captured);
                        state.blocks.insert(name.clone(), captured);
                    } else if let Some(content) = state.blocks.get(name) {
                        out.push_str(content);
                    } else {
                        self.execute(body, context, state, out)?;
                    }
                }
                Node::Include { template } => {
                    let options = RenderOptions {
                        locale: state.locale.clone(),
                        ..RenderOptions::default()
                    };
                    let html = self.render_at(template, context, &options, state.depth + 1)?;
                    out.push_str(&html);
                }
                Node::Foreach {
                    scope,
                    path,
                    var,
                    body,
                } => {
                    let items = context.resolve(path).iter_items();
                    tracing::trace!("Loop {} over '{}' with {} item(s)", scope, path, items.len());

                    let saved = context.remove(var);
                    let result = self.run_loop(items, var, body, context, state, out);
                    match saved {
                        Some(previous) => {
                            context.insert(var.clone(), previous);
                        }
                        None => {
                            context.remove(var);
                        }
                    }
                    result?;
                }
                Node::If {
                    path,
                    then_branch,
                    else_branch,
                } => {
                    let branch = if context.resolve(path).is_truthy() {
                        then_branch
                    } else {
                        else_branch
                    };
                    self.execute(branch, context, state, out)?;
                }
                Node::Helper {
                    name,
                    arg,
                    params,
                    escape,
                } => {
                    let call = HelperCall {
                        arg: arg.as_deref(),
                        params: params
                            .iter()
                            .map(|(key, path)| (key.clone(), context.resolve(path)))
                            .collect(),
                        context: &*context,
                        locale: state.locale.as_deref(),
                    };
                    let html = self.helpers.call(name, &call);
                    if *escape {
                        out.push_str(&escape_html(&html));
                    } else {
                        out.push_str(&html);
                    }
                }
            }
        }
        Ok(())
    }

    fn run_loop(
        &self,
        items: Vec<Value>,
        var: &str,
        body: &[Node],
        context: &mut Context,
        state: &mut RenderState,
        out: &mut String,
    ) -> Result<()> {
        for item in items {
            context.insert(var, item);
            self.execute(body, context, state, out)?;
        }
        Ok(())
    }

    /// Checks whether the unit for `name` is cached.
    pub fn cache_contains(&self, name: &str) -> bool {
        match self.resolver.locate(name) {
            Ok(path) => self.cache.contains_key(&cache_key(&path)),
            Err(_) => false,
        }
    }

    /// Clears the compiled-unit cache.
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }

    /// Drops the cached unit of one template, including templates whose
    /// source has been deleted.
    pub fn invalidate(&self, name: &str) -> Result<()> {
        let path = self.resolver.locate(name)?;
        self.cache.remove(&cache_key(&path))
    }
}
