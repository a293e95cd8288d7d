// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Dynamically-typed template values and the render context.
//!
//! Templates see their data as a [`Context`]: a map from variable name to
//! [`Value`]. Values are built from Rust data through `serde`
//! ([`Value::from_serialize`]) or from `serde_json::Value` directly, and
//! application types can be exposed lazily through the [`Object`] trait.
//!
//! Dotted paths (`page.author.name`, `items.0.title`) are resolved with
//! [`Context::lookup`], which never fails: any missing segment yields `None`.

use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Key-ordered map used for [`Value::Map`].
pub type ValueMap = BTreeMap<String, Value>;

/// Object-like application value exposed to templates.
///
/// Implement this for types that should be navigable with dotted paths
/// without being converted to a map up front (e.g. lazily loaded records).
pub trait Object: fmt::Debug + Send + Sync {
    /// Returns the attribute `key`, or `None` if it does not exist.
    fn get(&self, key: &str) -> Option<Value>;

    /// Items yielded when the object is the subject of a `foreach`.
    fn iter(&self) -> Vec<Value> {
        Vec::new()
    }

    /// Text written when the object itself is output.
    fn render(&self) -> String {
        String::new()
    }

    /// Truthiness of the object in an `if` tag.
    fn is_truthy(&self) -> bool {
        true
    }
}

/// A dynamically-typed template value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent / null.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Any number.
    Number(f64),
    /// Text.
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Ordered string-keyed map.
    Map(ValueMap),
    /// Application object resolved on demand.
    Object(Arc<dyn Object>),
}

impl Value {
    /// Converts any serializable value through its JSON representation.
    pub fn from_serialize<T: serde::Serialize>(value: T) -> Result<Self> {
        Ok(Value::from(serde_json::to_value(value)?))
    }

    /// Wraps an application object.
    pub fn object<O: Object + 'static>(object: O) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Returns true if this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by `if`: null, false, zero, NaN, empty strings and
    /// empty collections are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(obj) => obj.is_truthy(),
        }
    }

    /// Coerces the value into the sequence iterated by `foreach`.
    ///
    /// Lists yield their items, maps their values, objects whatever
    /// [`Object::iter`] returns. Everything else is an empty sequence.
    pub fn iter_items(&self) -> Vec<Value> {
        match self {
            Value::List(items) => items.clone(),
            Value::Map(map) => map.values().cloned().collect(),
            Value::Object(obj) => obj.iter(),
            _ => Vec::new(),
        }
    }

    /// Looks up a single path segment.
    pub fn get(&self, segment: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(segment).cloned(),
            Value::List(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx))
                .cloned(),
            Value::Object(obj) => obj.get(segment),
            _ => None,
        }
    }

    /// Verbatim string form, as written by `raw`.
    pub fn render_raw(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::List(_) | Value::Map(_) => self.to_json().to_string(),
            Value::Object(obj) => obj.render(),
        }
    }

    /// Escaped string form, as written by a bare path.
    pub fn render_escaped(&self) -> String {
        escape_html(&self.render_raw())
    }

    /// JSON form of the value. Objects serialize as their rendered text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if is_integral(*n) {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(out)
            }
            Value::Object(obj) => serde_json::Value::String(obj.render()),
        }
    }
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15
}

fn format_number(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Escapes `&`, `<`, `>`, `"` and `'` for HTML output.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

/// Variable bindings available to one render call.
///
/// The context is mutable during rendering: `foreach` rebinds its loop
/// variable and restores it when the loop ends.
#[derive(Debug, Clone, Default)]
pub struct Context {
    vars: BTreeMap<String, Value>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from a serializable map-like value.
    ///
    /// Top-level non-object values produce an empty context.
    pub fn from_serialize<T: serde::Serialize>(value: T) -> Result<Self> {
        Ok(Self::from_json(serde_json::to_value(value)?))
    }

    /// Builds a context from a JSON object.
    pub fn from_json(value: serde_json::Value) -> Self {
        let mut ctx = Context::new();
        if let serde_json::Value::Object(map) = value {
            for (k, v) in map {
                ctx.insert(k, Value::from(v));
            }
        }
        ctx
    }

    /// Binds `name`, returning its previous value.
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, name: K, value: V) -> Option<Value> {
        self.vars.insert(name.into(), value.into())
    }

    /// Removes `name`, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    /// Returns the top-level binding `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Returns true if `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Resolves a dotted path such as `page.author.name`.
    ///
    /// Returns `None` when any segment is missing.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.vars.get(first)?.clone();
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Resolves a dotted path, mapping absence to [`Value::Null`].
    pub fn resolve(&self, path: &str) -> Value {
        self.lookup(path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Context {
        Context::from_json(json!({
            "page": { "title": "Home", "tags": ["a", "b"], "author": { "name": "Ada" } },
            "count": 0,
            "empty": "",
            "items": []
        }))
    }

    #[test]
    fn test_lookup_nested_paths() {
        let ctx = sample();
        assert_eq!(ctx.resolve("page.title").render_raw(), "Home");
        assert_eq!(ctx.resolve("page.author.name").render_raw(), "Ada");
        assert_eq!(ctx.resolve("page.tags.1").render_raw(), "b");
    }

    #[test]
    fn test_lookup_missing_segments_are_absent() {
        let ctx = sample();
        assert!(ctx.lookup("page.missing").is_none());
        assert!(ctx.lookup("page.title.deeper").is_none());
        assert!(ctx.lookup("nothing.at.all").is_none());
        assert!(ctx.lookup("page.tags.7").is_none());
        assert!(ctx.resolve("nothing").is_null());
    }

    #[test]
    fn test_truthiness() {
        let ctx = sample();
        assert!(!ctx.resolve("count").is_truthy());
        assert!(!ctx.resolve("empty").is_truthy());
        assert!(!ctx.resolve("items").is_truthy());
        assert!(!ctx.resolve("missing").is_truthy());
        assert!(ctx.resolve("page").is_truthy());
        assert!(ctx.resolve("page.tags").is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::from("0").is_truthy());
    }

    #[test]
    fn test_render_raw_formats() {
        assert_eq!(Value::Number(3.0).render_raw(), "3");
        assert_eq!(Value::Number(2.5).render_raw(), "2.5");
        assert_eq!(Value::Null.render_raw(), "");
        assert_eq!(Value::Bool(true).render_raw(), "true");
        assert_eq!(Value::from(vec![1i64, 2]).render_raw(), "[1,2]");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_iter_items_coercion() {
        let ctx = Context::from_json(json!({ "map": { "x": 1, "y": 2 }, "text": "abc" }));
        assert_eq!(ctx.resolve("map").iter_items().len(), 2);
        assert!(ctx.resolve("text").iter_items().is_empty());
        assert!(ctx.resolve("missing").iter_items().is_empty());
    }

    #[derive(Debug)]
    struct Author;

    impl Object for Author {
        fn get(&self, key: &str) -> Option<Value> {
            (key == "name").then(|| Value::from("Grace"))
        }

        fn render(&self) -> String {
            "author".to_string()
        }
    }

    #[test]
    fn test_object_values() {
        let mut ctx = Context::new();
        ctx.insert("author", Value::object(Author));
        assert_eq!(ctx.resolve("author.name").render_raw(), "Grace");
        assert!(ctx.lookup("author.email").is_none());
        assert_eq!(ctx.resolve("author").render_raw(), "author");
    }
}
