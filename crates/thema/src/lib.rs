// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # THEMA
//!
//! Tag-based theme templating for Rust: a template compiler, a render engine
//! with single-level layout inheritance, and a compiled-unit cache.
//!
//! ## Features
//!
//! - `{% ... %}` tag syntax: `extends`, `block`, `include`, `foreach`, `if`,
//!   `raw`, helpers (`csrf`, `t`, `url`, `asset`, `menu`) and dotted paths
//! - HTML escaping by default, `raw` for trusted markup
//! - Unknown tags render verbatim
//! - Partial renders returning only a page's `content` block
//! - Compiled-unit caching (memory or filesystem) with debug-mode
//!   invalidation
//! - Theme warmup that compiles every template and reports failures
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use thema::{Context, Engine, FileSystemResolver, RenderOptions};
//!
//! let resolver = FileSystemResolver::new("./themes/default");
//! let engine = Engine::with_memory_cache(resolver, 100);
//!
//! let mut context = Context::from_json(serde_json::json!({ "name": "World" }));
//! let html = engine.render("hello", &mut context, &RenderOptions::default())?;
//! ```

/// Compiled unit node tree.
pub mod ast;
/// Tag compiler.
pub mod compiler;
/// Main template engine.
pub mod engine;
/// Resource resolution (filesystem, memory).
pub mod resolver;
/// Error types.
pub mod error;
/// Compiled unit caching.
pub mod cache;
/// Runtime helpers.
pub mod helpers;
/// Translation catalogs.
pub mod i18n;
/// Context and value model.
pub mod value;
/// Theme warmup.
pub mod warmup;

pub use ast::*;
pub use compiler::*;
pub use engine::*;
pub use resolver::*;
pub use error::*;
pub use cache::*;
pub use helpers::*;
pub use i18n::*;
pub use value::*;
pub use warmup::*;

#[cfg(test)]
mod tests;
