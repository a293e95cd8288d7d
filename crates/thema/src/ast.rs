// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiled-unit node tree.
//!
//! The compiler turns template source into a [`CompiledUnit`]: a flat list of
//! [`Node`]s where control-flow tags own their bodies. The render engine
//! walks this tree directly; there is no intermediate source generation.
//!
//! Units are serializable so they can be persisted by the filesystem cache
//! and reloaded without recompiling.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Version stamp written into every compiled unit.
///
/// Cached artifacts carrying a different stamp are recompiled.
pub const COMPILER_VERSION: u32 = 2;

/// A compiled template node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Literal text copied verbatim, including passed-through unknown tags.
    Text(String),
    /// A dotted-path lookup written to the output.
    Value {
        /// Dotted path, e.g. `page.title`.
        path: String,
        /// Whether the resolved value is HTML-escaped (`false` for `raw`).
        escape: bool,
    },
    /// A named, overridable block (`block NAME` ... `endblock`).
    Block {
        /// Block name.
        name: String,
        /// Default body.
        body: Vec<Node>,
    },
    /// `include "name"`.
    Include {
        /// Logical template name.
        template: String,
    },
    /// `foreach PATH as VAR` ... `endforeach`.
    Foreach {
        /// Per-compile loop id, unique within the unit.
        scope: usize,
        /// Dotted path of the iterated value.
        path: String,
        /// Loop variable bound for each element.
        var: String,
        /// Loop body.
        body: Vec<Node>,
    },
    /// `if PATH` ... `else` ... `endif`.
    If {
        /// Dotted path whose truthiness selects the branch.
        path: String,
        /// Nodes rendered when the value is truthy.
        then_branch: Vec<Node>,
        /// Nodes rendered otherwise.
        else_branch: Vec<Node>,
    },
    /// A call into the runtime helper table (`csrf`, `t`, `url`, ...).
    Helper {
        /// Helper name.
        name: String,
        /// Literal argument (translation key, url, asset path, menu name).
        arg: Option<String>,
        /// Named parameters as `(name, dotted path)`, resolved at render time.
        params: Vec<(String, String)>,
        /// Whether the helper output is HTML-escaped.
        escape: bool,
    },
}

/// The executable artifact produced by compiling one template source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
    /// Compiler version that produced the unit.
    pub version: u32,
    /// Logical template name.
    #[serde(default)]
    pub name: String,
    /// Resolved source path, when compiled from a resolver.
    #[serde(default)]
    pub path: Option<String>,
    /// Modification time of the source the unit was compiled from.
    #[serde(default)]
    pub source_modified: Option<SystemTime>,
    /// Parent template declared with `extends`.
    pub extends: Option<String>,
    /// Templates referenced with `include`, in source order, deduplicated.
    pub dependencies: Vec<String>,
    /// Root nodes.
    pub nodes: Vec<Node>,
}

impl CompiledUnit {
    /// Attaches the logical name and resolved path.
    pub fn named(mut self, name: &str, path: Option<String>) -> Self {
        self.name = name.to_string();
        self.path = path;
        self
    }

    /// Records the modification time of the compiled source.
    pub fn with_source_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.source_modified = modified;
        self
    }

    /// Returns true if the unit was produced by the running compiler.
    pub fn is_current(&self) -> bool {
        self.version == COMPILER_VERSION
    }
}
