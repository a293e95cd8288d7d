// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Warmup command: compiles every template of the theme into the cache.

use crate::config::Config;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use thema::{warmup_with_progress, WarmupReport};

/// Compiles the configured theme, reporting progress on a bar.
pub fn execute(config: &Config, show_progress: bool) -> anyhow::Result<WarmupReport> {
    let engine = config.engine()?;

    let pb = if show_progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} Compiling [{bar:30.cyan/blue}] {pos}/{len}")?
                .progress_chars("━━╺"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    let pb_clone = pb.clone();
    let report = warmup_with_progress(&engine, move |current, total| {
        pb_clone.set_length(total as u64);
        pb_clone.set_position(current as u64);
    });
    pb.finish_and_clear();

    Ok(report)
}

/// Runs the warmup command.
///
/// Fails when any template could not be compiled, after listing every error.
pub async fn run(config: &Config, quiet: bool) -> anyhow::Result<()> {
    println!(
        "{} {}",
        style("Warming up theme:").cyan(),
        config.theme.dir
    );

    let start = Instant::now();
    let report = execute(config, !quiet)?;
    let elapsed = start.elapsed();

    for error in &report.errors {
        eprintln!("  {} {}", style("Error:").red(), error);
    }

    println!(
        "{} {} {} {}",
        style("Compiled").green(),
        report.compiled_count,
        style("template(s) in").dim(),
        style(format!("{}ms", elapsed.as_millis())).cyan()
    );

    if !report.is_success() {
        anyhow::bail!("{} template(s) failed to compile", report.errors.len());
    }
    Ok(())
}
