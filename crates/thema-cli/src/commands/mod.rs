// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! This module contains the implementations for all THEMA CLI commands:
//!
//! - `warmup`: Compile every template of the theme into the cache
//! - `render`: Render one template to stdout or a file
//! - `clear-cache`: Remove all compiled artifacts
//! - `watch`: Recompile templates as they change

/// Cache clearing command.
pub mod clear_cache;
/// Single template render command.
pub mod render;
/// Theme warmup command.
pub mod warmup;
/// File watch command.
pub mod watch;
