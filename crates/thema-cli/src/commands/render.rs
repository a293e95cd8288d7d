// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Render command: renders one template of the theme.

use crate::config::Config;
use anyhow::Context as _;
use std::fs;
use std::path::Path;
use thema::{Context, RenderOptions};

/// What to render and how.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    /// Logical template name (e.g. `pages/home`).
    pub name: String,
    /// JSON file holding the render context.
    pub context_file: Option<String>,
    /// Return only the page's `content` block.
    pub partial: bool,
    /// Locale for translations.
    pub locale: Option<String>,
}

/// Reads a JSON context file. The top level must be an object.
pub fn load_context(path: &Path) -> anyhow::Result<Context> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    if !json.is_object() {
        anyhow::bail!("Context file {} must contain a JSON object", path.display());
    }
    Ok(Context::from_json(json))
}

/// Renders the requested template and returns the HTML.
pub fn execute(config: &Config, request: &RenderRequest) -> anyhow::Result<String> {
    let engine = config.engine()?;

    let mut context = match &request.context_file {
        Some(path) => load_context(Path::new(path))?,
        None => Context::new(),
    };

    let options = RenderOptions {
        render_partial: request.partial,
        locale: request.locale.clone(),
        ..RenderOptions::default()
    };

    let html = engine
        .render(&request.name, &mut context, &options)
        .with_context(|| format!("Failed to render {}", request.name))?;
    Ok(html)
}

/// Runs the render command, writing to `output` or stdout.
pub async fn run(config: &Config, request: RenderRequest, output: Option<String>) -> anyhow::Result<()> {
    let html = execute(config, &request)?;
    match output {
        Some(path) => {
            if let Some(parent) = Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(&path, html)?;
            tracing::info!("Wrote {} to {}", request.name, path);
        }
        None => println!("{}", html),
    }
    Ok(())
}
