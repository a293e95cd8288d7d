// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File watcher command: recompiles templates as they change.

use crate::config::Config;
use crate::watcher::FileWatcher;
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thema::{normalize_name, path_to_string, Engine, FileSystemResolver};
use tokio::signal;

/// Recompiles the templates behind `paths` (relative to the theme root).
///
/// Returns `(name, error)` for each template that failed; deleted templates
/// are dropped from the cache and not reported.
pub fn recompile(
    engine: &Engine<FileSystemResolver>,
    extension: &str,
    paths: &[PathBuf],
) -> Vec<(String, String)> {
    let mut failures = Vec::new();
    for path in paths {
        let name = normalize_name(&path_to_string(path), extension);
        if let Err(e) = engine.invalidate(&name) {
            tracing::warn!("Could not invalidate '{}': {}", name, e);
        }
        match engine.load(&name) {
            Ok(_) => tracing::info!("Recompiled '{}'", name),
            Err(thema::ThemaError::TemplateNotFound(_)) => {
                tracing::info!("Template '{}' was removed", name)
            }
            Err(e) => failures.push((name, e.to_string())),
        }
    }
    failures
}

/// Runs the file watcher to recompile changed templates.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let theme_dir = PathBuf::from(&config.theme.dir);
    if !Path::new(&theme_dir).is_dir() {
        anyhow::bail!("Theme directory {} does not exist", config.theme.dir);
    }

    let engine = Arc::new(config.engine()?);
    let extension = config.theme.extension.clone();

    println!("Watching for changes in: {}", config.theme.dir);
    println!("Press Ctrl+C to stop...");
    println!();

    let watch_engine = Arc::clone(&engine);
    let watch_extension = extension.clone();
    let _watcher = FileWatcher::new(theme_dir, &extension, move |paths: Vec<PathBuf>| {
        let files = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("  File changed: {} - recompiling", files);

        for (name, error) in recompile(&watch_engine, &watch_extension, &paths) {
            eprintln!("  {} {}: {}", style("Error:").red(), name, error);
        }
    })?;

    // Wait for Ctrl+C
    signal::ctrl_c().await?;

    println!("\nStopping file watcher...");
    Ok(())
}
