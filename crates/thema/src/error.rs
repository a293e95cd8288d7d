// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the THEMA template engine.
//!
//! This module defines [`ThemaError`], the main error enum shared by the
//! resolver, the compiled-unit cache and the render engine.
//!
//! # Error Categories
//!
//! - **Resolution errors**: template not found, path escapes the theme root
//! - **Cache errors**: compiled artifacts that cannot be read or written
//! - **Render errors**: failures raised while executing a compiled unit
//!
//! Template *syntax* never produces an error: unknown tags pass through as
//! literal text and unbalanced close tags are ignored by the compiler.

use thiserror::Error;

/// The main error type for THEMA operations.
#[derive(Error, Debug)]
pub enum ThemaError {
    /// The logical template name could not be resolved by the theme.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The template was located but could not be accepted (e.g. it escapes
    /// the theme root or cannot be canonicalized).
    #[error("Resolution error: {0}")]
    ResolutionError(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Compiled-unit cache operation failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Includes nested deeper than the configured limit, usually a cycle.
    #[error("Include depth of {depth} exceeded while rendering {template}")]
    IncludeDepthExceeded {
        /// The template whose include crossed the limit.
        template: String,
        /// The configured maximum depth.
        depth: usize,
    },

    /// Runtime failure while executing a compiled template.
    #[error("Render error in {template}: {message}")]
    RenderError {
        /// The template being executed.
        template: String,
        /// Error message.
        message: String,
    },
}

impl ThemaError {
    /// Wraps this error with the template in which it surfaced.
    ///
    /// Not-found and depth errors already name their template and are
    /// returned unchanged.
    pub fn in_template(self, template: &str) -> Self {
        match self {
            e @ (ThemaError::TemplateNotFound(_)
            | ThemaError::IncludeDepthExceeded { .. }
            | ThemaError::RenderError { .. }) => e,
            other => ThemaError::RenderError {
                template: template.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Convenience type alias for Results with [`ThemaError`].
pub type Result<T> = std::result::Result<T, ThemaError>;
