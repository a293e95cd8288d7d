// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Removes every compiled artifact from the cache directory.

use crate::config::Config;
use console::style;
use std::path::Path;
use thema::{Cache, FileSystemCache};

/// Runs the clear-cache command.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    if !Path::new(&config.cache.dir).exists() {
        println!("Cache directory {} does not exist, nothing to clear", config.cache.dir);
        return Ok(());
    }

    let cache = FileSystemCache::new(&config.cache.dir, 1)?;
    cache.clear()?;

    println!(
        "{} {}",
        style("Cleared cache:").green(),
        config.cache.dir
    );
    Ok(())
}
