// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! THEMA CLI library.
//!
//! This crate provides the command-line interface for the THEMA template
//! engine: warming the compiled-unit cache, rendering single templates and
//! watching a theme during development.
//!
//! # Usage
//!
//! This crate is primarily used through the `thema` binary:
//!
//! ```bash
//! thema warmup                      # Compile the whole theme
//! thema render pages/home --partial # Render one template
//! thema clear-cache                 # Drop compiled artifacts
//! thema watch                       # Recompile on change
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `thema.toml` at the project root.

/// CLI commands (warmup, render, clear-cache, watch).
pub mod commands;
/// Project configuration from `thema.toml`.
pub mod config;
/// File system watching for theme changes.
pub mod watcher;
