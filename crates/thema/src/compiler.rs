// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tag compiler.
//!
//! Turns template source into a [`CompiledUnit`]. Text outside `{% ... %}`
//! is copied verbatim; each tag body is matched against the instruction set
//! in priority order:
//!
//! | Tag | Node |
//! |-----|------|
//! | `extends "name"` | nothing, recorded as the unit's parent |
//! | `block NAME` / `endblock` | [`Node::Block`] |
//! | `include "name"` | [`Node::Include`] |
//! | `foreach PATH as VAR` / `endforeach` | [`Node::Foreach`] |
//! | `if PATH` / `else` / `endif` | [`Node::If`] |
//! | `raw PATH` | unescaped [`Node::Value`] |
//! | `csrf`, `t "key" a=b`, `url "x"`, `asset "x"`, `menu "x"` | [`Node::Helper`] |
//! | `dotted.path` | escaped [`Node::Value`] |
//!
//! Anything else is kept as literal text, delimiters included, so templates
//! using tags this compiler does not know about still render.
//!
//! Compilation never fails. Close tags without a matching open tag are
//! ignored and tags left open at the end of the source are closed there.
//! Open tags nested deeper than [`MAX_NESTING_DEPTH`] are kept as literal
//! text, together with their `else` and close tags.

use crate::ast::{CompiledUnit, Node, COMPILER_VERSION};
use lazy_static::lazy_static;
use regex::Regex;

const OPEN: &str = "{%";
const CLOSE: &str = "%}";

/// Maximum number of `block`, `foreach` and `if` frames open at once.
///
/// Keeps the node tree shallow enough for the recursive interpreter and for
/// serde_json's recursion limit when artifacts are read back.
pub const MAX_NESTING_DEPTH: usize = 32;

lazy_static! {
    static ref EXTENDS_RE: Regex = Regex::new(r#"^extends\s+(?:"([^"]*)"|'([^']*)')$"#).unwrap();
    static ref BLOCK_RE: Regex = Regex::new(r"^block\s+([A-Za-z0-9_\-]+)$").unwrap();
    static ref ENDBLOCK_RE: Regex = Regex::new(r"^endblock(?:\s+[A-Za-z0-9_\-]+)?$").unwrap();
    static ref INCLUDE_RE: Regex = Regex::new(r#"^include\s+(?:"([^"]*)"|'([^']*)')$"#).unwrap();
    static ref FOREACH_RE: Regex = Regex::new(
        r"^foreach\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s+as\s+([A-Za-z_][A-Za-z0-9_]*)$"
    )
    .unwrap();
    static ref IF_RE: Regex =
        Regex::new(r"^if\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)$").unwrap();
    static ref RAW_RE: Regex =
        Regex::new(r"^raw\s+([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)$").unwrap();
    static ref TRANSLATE_RE: Regex =
        Regex::new(r#"^t\s+(?:"([^"]*)"|'([^']*)')(?:\s+(.*))?$"#).unwrap();
    static ref PARAM_RE: Regex = Regex::new(
        r"^([A-Za-z_][A-Za-z0-9_]*)=([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)$"
    )
    .unwrap();
    static ref LITERAL_HELPER_RE: Regex =
        Regex::new(r#"^(url|asset|menu)\s+(?:"([^"]*)"|'([^']*)')$"#).unwrap();
    static ref PATH_RE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*$").unwrap();
    static ref INCLUDE_SCAN_RE: Regex =
        Regex::new(r#"\{%\s*include\s+(?:"([^"]*)"|'([^']*)')\s*%\}"#).unwrap();
}

/// A lexical piece of template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text outside any tag.
    Text(&'a str),
    /// A complete `{% ... %}` region.
    Tag {
        /// Trimmed inner text.
        body: &'a str,
        /// The full region, delimiters included.
        raw: &'a str,
    },
}

/// Splits source into text and tag segments, left to right.
///
/// A `{%` without a matching `%}` is returned as text together with the
/// rest of the source.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `source`.
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.source[self.pos..];
        if rest.is_empty() {
            return None;
        }

        let Some(open) = rest.find(OPEN) else {
            self.pos = self.source.len();
            return Some(Segment::Text(rest));
        };

        if open > 0 {
            self.pos += open;
            return Some(Segment::Text(&rest[..open]));
        }

        match rest[OPEN.len()..].find(CLOSE) {
            Some(close) => {
                let end = OPEN.len() + close + CLOSE.len();
                self.pos += end;
                Some(Segment::Tag {
                    body: rest[OPEN.len()..OPEN.len() + close].trim(),
                    raw: &rest[..end],
                })
            }
            None => {
                self.pos = self.source.len();
                Some(Segment::Text(rest))
            }
        }
    }
}

/// Returns the parent template named by the first `extends` tag, if any.
pub fn extract_extends(source: &str) -> Option<String> {
    Lexer::new(source).find_map(|segment| match segment {
        Segment::Tag { body, .. } => EXTENDS_RE.captures(body).map(|caps| quoted(&caps, 1)),
        Segment::Text(_) => None,
    })
}

/// Returns every template named by an `include` tag, in source order.
pub fn extract_includes(source: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in INCLUDE_SCAN_RE.captures_iter(source) {
        let name = quoted(&caps, 1);
        if !found.contains(&name) {
            found.push(name);
        }
    }
    found
}

/// Compiles template source into a [`CompiledUnit`].
pub fn compile(source: &str) -> CompiledUnit {
    let mut compiler = Compiler::default();
    for segment in Lexer::new(source) {
        match segment {
            Segment::Text(text) => compiler.push_text(text),
            Segment::Tag { body, raw } => compiler.tag(body, raw),
        }
    }
    compiler.finish()
}

/// Reads the quoted literal captured at `first` (double quotes) or
/// `first + 1` (single quotes).
fn quoted(caps: &regex::Captures<'_>, first: usize) -> String {
    caps.get(first)
        .or_else(|| caps.get(first + 1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Block,
    Foreach,
    If,
}

#[derive(Debug)]
enum Frame {
    Block {
        name: String,
        body: Vec<Node>,
    },
    Foreach {
        scope: usize,
        path: String,
        var: String,
        body: Vec<Node>,
    },
    If {
        path: String,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
        in_else: bool,
    },
}

impl Frame {
    fn kind(&self) -> FrameKind {
        match self {
            Frame::Block { .. } => FrameKind::Block,
            Frame::Foreach { .. } => FrameKind::Foreach,
            Frame::If { .. } => FrameKind::If,
        }
    }

    fn body_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Frame::Block { body, .. } | Frame::Foreach { body, .. } => body,
            Frame::If {
                then_branch,
                else_branch,
                in_else,
                ..
            } => {
                if *in_else {
                    else_branch
                } else {
                    then_branch
                }
            }
        }
    }

    fn into_node(self) -> Node {
        match self {
            Frame::Block { name, body } => Node::Block { name, body },
            Frame::Foreach {
                scope,
                path,
                var,
                body,
            } => Node::Foreach {
                scope,
                path,
                var,
                body,
            },
            Frame::If {
                path,
                then_branch,
                else_branch,
                ..
            } => Node::If {
                path,
                then_branch,
                else_branch,
            },
        }
    }
}

#[derive(Debug, Default)]
struct Compiler {
    root: Vec<Node>,
    stack: Vec<Frame>,
    // Open tags past the nesting limit, emitted as text.
    overflow: Vec<FrameKind>,
    loop_counter: usize,
    extends: Option<String>,
    dependencies: Vec<String>,
}

impl Compiler {
    fn current(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(frame) => frame.body_mut(),
            None => &mut self.root,
        }
    }

    fn push(&mut self, node: Node) {
        self.current().push(node);
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let nodes = self.current();
        if let Some(Node::Text(last)) = nodes.last_mut() {
            last.push_str(text);
        } else {
            nodes.push(Node::Text(text.to_string()));
        }
    }

    /// Opens `frame`, or keeps `raw` as text once the nesting limit is reached.
    fn open(&mut self, frame: Frame, raw: &str) {
        if self.stack.len() >= MAX_NESTING_DEPTH {
            tracing::debug!(
                "Nesting deeper than {} levels, keeping '{}' as text",
                MAX_NESTING_DEPTH,
                raw
            );
            self.overflow.push(frame.kind());
            self.push_text(raw);
            return;
        }
        self.stack.push(frame);
    }

    /// Closes the innermost open frame of `kind`, and any frames opened
    /// inside it. Does nothing when no such frame is open.
    fn close(&mut self, kind: FrameKind, raw: &str) {
        if let Some(idx) = self.overflow.iter().rposition(|k| *k == kind) {
            self.overflow.truncate(idx);
            self.push_text(raw);
            return;
        }
        let Some(idx) = self.stack.iter().rposition(|f| f.kind() == kind) else {
            return;
        };
        // Tags kept as text all sit inside the frames being closed.
        self.overflow.clear();
        while self.stack.len() > idx {
            if let Some(frame) = self.stack.pop() {
                let node = frame.into_node();
                self.push(node);
            }
        }
    }

    fn tag(&mut self, body: &str, raw: &str) {
        if let Some(caps) = EXTENDS_RE.captures(body) {
            if self.extends.is_none() {
                self.extends = Some(quoted(&caps, 1));
            }
        } else if let Some(caps) = BLOCK_RE.captures(body) {
            let frame = Frame::Block {
                name: caps[1].to_string(),
                body: Vec::new(),
            };
            self.open(frame, raw);
        } else if ENDBLOCK_RE.is_match(body) {
            self.close(FrameKind::Block, raw);
        } else if let Some(caps) = INCLUDE_RE.captures(body) {
            let template = quoted(&caps, 1);
            if !self.dependencies.contains(&template) {
                self.dependencies.push(template.clone());
            }
            self.push(Node::Include { template });
        } else if let Some(caps) = FOREACH_RE.captures(body) {
            let scope = self.loop_counter;
            self.loop_counter += 1;
            let frame = Frame::Foreach {
                scope,
                path: caps[1].to_string(),
                var: caps[2].to_string(),
                body: Vec::new(),
            };
            self.open(frame, raw);
        } else if body == "endforeach" {
            self.close(FrameKind::Foreach, raw);
        } else if let Some(caps) = IF_RE.captures(body) {
            let frame = Frame::If {
                path: caps[1].to_string(),
                then_branch: Vec::new(),
                else_branch: Vec::new(),
                in_else: false,
            };
            self.open(frame, raw);
        } else if body == "else" {
            if self.overflow.contains(&FrameKind::If) {
                self.push_text(raw);
            } else if let Some(Frame::If { in_else, .. }) = self
                .stack
                .iter_mut()
                .rev()
                .find(|f| f.kind() == FrameKind::If)
            {
                *in_else = true;
            }
        } else if body == "endif" {
            self.close(FrameKind::If, raw);
        } else if let Some(caps) = RAW_RE.captures(body) {
            self.push(Node::Value {
                path: caps[1].to_string(),
                escape: false,
            });
        } else if body == "csrf" {
            self.push(Node::Helper {
                name: "csrf".to_string(),
                arg: None,
                params: Vec::new(),
                escape: true,
            });
        } else if let Some(caps) = TRANSLATE_RE.captures(body) {
            let params = caps
                .get(3)
                .map(|m| parse_params(m.as_str()))
                .unwrap_or_default();
            self.push(Node::Helper {
                name: "t".to_string(),
                arg: Some(quoted(&caps, 1)),
                params,
                escape: true,
            });
        } else if let Some(caps) = LITERAL_HELPER_RE.captures(body) {
            let name = caps[1].to_string();
            let escape = name != "menu";
            self.push(Node::Helper {
                name,
                arg: Some(quoted(&caps, 2)),
                params: Vec::new(),
                escape,
            });
        } else if PATH_RE.is_match(body) {
            self.push(Node::Value {
                path: body.to_string(),
                escape: true,
            });
        } else {
            self.push_text(raw);
        }
    }

    fn finish(mut self) -> CompiledUnit {
        while let Some(frame) = self.stack.pop() {
            let node = frame.into_node();
            self.push(node);
        }
        CompiledUnit {
            version: COMPILER_VERSION,
            name: String::new(),
            path: None,
            source_modified: None,
            extends: self.extends,
            dependencies: self.dependencies,
            nodes: self.root,
        }
    }
}

/// Parses `name=path` pairs, dropping anything that does not fit the grammar.
fn parse_params(input: &str) -> Vec<(String, String)> {
    input
        .split_whitespace()
        .filter_map(|pair| {
            PARAM_RE
                .captures(pair)
                .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        })
        .collect()
}
