// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Cache warmup.
//!
//! Walks every template the theme exposes, follows `extends` chains and
//! `include` targets, and compiles each dependency once through the engine's
//! compile-and-cache path. Failures are collected per template so one broken
//! file never stops the rest of the theme from being compiled.

use crate::compiler::{extract_extends, extract_includes};
use crate::engine::Engine;
use crate::resolver::ResourceResolver;
use std::collections::HashSet;

/// Outcome of a warmup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmupReport {
    /// Templates compiled (or found in the cache) and stored without error.
    pub compiled_count: usize,
    /// One `"<name>: <error>"` entry per failed template.
    pub errors: Vec<String>,
}

impl WarmupReport {
    /// True when no template failed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Compiles every template of the engine's theme.
pub fn warmup<R: ResourceResolver>(engine: &Engine<R>) -> WarmupReport {
    warmup_with_progress(engine, |_, _| {})
}

/// Like [`warmup`], calling `progress(current, total)` after each discovered
/// template has been walked.
pub fn warmup_with_progress<R, F>(engine: &Engine<R>, mut progress: F) -> WarmupReport
where
    R: ResourceResolver,
    F: FnMut(usize, usize),
{
    let mut report = WarmupReport::default();

    let templates = match engine.resolver().list_templates() {
        Ok(templates) => templates,
        Err(e) => {
            report.errors.push(format!("<theme>: {}", e));
            return report;
        }
    };

    let total = templates.len();
    tracing::info!("Warming up {} template(s)", total);

    let mut seen = HashSet::new();
    for (idx, name) in templates.iter().enumerate() {
        visit(engine, name, &mut seen, &mut report);
        progress(idx + 1, total);
    }

    tracing::info!(
        "Warmup finished: {} compiled, {} error(s)",
        report.compiled_count,
        report.errors.len()
    );
    report
}

fn visit<R: ResourceResolver>(
    engine: &Engine<R>,
    name: &str,
    seen: &mut HashSet<String>,
    report: &mut WarmupReport,
) {
    // `partials/nav` and `partials/nav.tpl` name the same template.
    let location = engine
        .resolver()
        .locate(name)
        .unwrap_or_else(|_| name.to_string());
    if !seen.insert(location) {
        return;
    }

    let resource = match engine.resolver().resolve(name) {
        Ok(resource) => resource,
        Err(e) => {
            tracing::debug!("Warmup could not resolve '{}': {}", name, e);
            report.errors.push(format!("{}: {}", name, e));
            return;
        }
    };

    match engine.load_resolved(name, &resource) {
        (_, None) => report.compiled_count += 1,
        (_, Some(e)) => report.errors.push(format!("{}: {}", name, e)),
    }

    if let Some(parent) = extract_extends(&resource.source) {
        visit(engine, &parent, seen, report);
    }
    for include in extract_includes(&resource.source) {
        visit(engine, &include, seen, report);
    }
}

impl<R: ResourceResolver> Engine<R> {
    /// Compiles every template of the theme into the cache.
    ///
    /// See [`warmup`].
    pub fn warmup(&self) -> WarmupReport {
        warmup(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemoryResourceResolver;

    fn engine(templates: &[(&str, &str)]) -> Engine<MemoryResourceResolver> {
        let resolver = MemoryResourceResolver::new();
        for (name, source) in templates {
            resolver.add_template(name, source);
        }
        Engine::with_memory_cache(resolver, 16)
    }

    #[test]
    fn test_warmup_compiles_every_template() {
        let engine = engine(&[
            ("layouts/base", "{% block content %}{% endblock %}"),
            ("pages/home", r#"{% extends "layouts/base" %}{% include "partials/nav" %}"#),
            ("partials/nav", "<nav></nav>"),
        ]);
        let report = engine.warmup();
        assert!(report.is_success(), "{:?}", report.errors);
        assert_eq!(report.compiled_count, 3);
        assert!(engine.cache_contains("layouts/base"));
        assert!(engine.cache_contains("partials/nav"));
    }

    #[test]
    fn test_warmup_collects_errors_and_continues() {
        let engine = engine(&[
            ("a", r#"{% include "missing/one" %}"#),
            ("b", r#"{% extends "missing/two" %}"#),
            ("c", "fine"),
        ]);
        let report = engine.warmup();
        assert_eq!(report.compiled_count, 3);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().any(|e| e.starts_with("missing/one: ")));
        assert!(report.errors.iter().any(|e| e.starts_with("missing/two: ")));
    }

    #[test]
    fn test_shared_dependencies_visited_once() {
        let engine = engine(&[
            ("p1", r#"{% include "shared" %}{% include "shared" %}"#),
            ("p2", r#"{% include "shared" %}"#),
            ("shared", "s"),
        ]);
        let mut calls = Vec::new();
        let report = warmup_with_progress(&engine, |current, total| calls.push((current, total)));
        assert_eq!(report.compiled_count, 3);
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_include_with_extension_is_not_compiled_twice() {
        let engine = engine(&[
            ("pages/home", r#"{% include "partials/nav.tpl" %}{% include "/partials/nav" %}"#),
            ("partials/nav", "<nav></nav>"),
        ]);
        let report = engine.warmup();
        assert!(report.is_success(), "{:?}", report.errors);
        assert_eq!(report.compiled_count, 2);
    }

    #[test]
    fn test_include_cycles_terminate() {
        let engine = engine(&[("a", r#"{% include "b" %}"#), ("b", r#"{% include "a" %}"#)]);
        let report = engine.warmup();
        assert!(report.is_success());
        assert_eq!(report.compiled_count, 2);
    }
}
