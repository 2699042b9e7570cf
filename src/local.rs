//! The per-process attribute bag: a tree-structured namespace where reading
//! an unset attribute auto-creates an intermediate node.
//!
//! Grounded on `greensim`'s `local`, a `dict`-like namespace object that
//! materializes a child namespace for any attribute that has not yet been
//! set. Since Rust has no dynamic attribute access, the dotted-path style
//! (`local.a.b = 5`) becomes a chain of `.child("a").child("b")` calls on a
//! cursor that addresses a path into the tree; the auto-vivify behaviour is
//! preserved exactly.

use std::collections::HashMap;

/// A value stored at one point of the namespace tree.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalValue {
    /// An unset attribute that has only ever been read, never assigned:
    /// the auto-created default.
    Unset,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// An intermediate namespace node.
    Node(HashMap<String, LocalValue>),
}

impl LocalValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LocalValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LocalValue::Float(n) => Some(*n),
            LocalValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LocalValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LocalValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn child_mut(&mut self, key: &str) -> &mut LocalValue {
        if !matches!(self, LocalValue::Node(_)) {
            *self = LocalValue::Node(HashMap::new());
        }
        match self {
            LocalValue::Node(map) => map.entry(key.to_string()).or_insert(LocalValue::Unset),
            _ => unreachable!(),
        }
    }

    fn child(&self, key: &str) -> LocalValue {
        match self {
            LocalValue::Node(map) => map.get(key).cloned().unwrap_or(LocalValue::Unset),
            _ => LocalValue::Unset,
        }
    }
}

impl From<bool> for LocalValue {
    fn from(v: bool) -> Self {
        LocalValue::Bool(v)
    }
}
impl From<i64> for LocalValue {
    fn from(v: i64) -> Self {
        LocalValue::Int(v)
    }
}
impl From<f64> for LocalValue {
    fn from(v: f64) -> Self {
        LocalValue::Float(v)
    }
}
impl From<String> for LocalValue {
    fn from(v: String) -> Self {
        LocalValue::Text(v)
    }
}
impl From<&str> for LocalValue {
    fn from(v: &str) -> Self {
        LocalValue::Text(v.to_string())
    }
}

/// A cursor addressing one path into a process's local namespace tree.
///
/// Obtained from [`crate::process::local`] or [`crate::Process::local`].
/// Reading via [`LocalCursor::get`] auto-creates every intermediate node
/// along the path (matching the source namespace's behaviour), so that
/// `local().child("a").child("b").set(5.0)` works from a process that has
/// never touched `a` before.
pub struct LocalCursor<'a> {
    pub(crate) root: &'a mut LocalValue,
    pub(crate) path: Vec<String>,
}

impl<'a> LocalCursor<'a> {
    pub(crate) fn new(root: &'a mut LocalValue) -> Self {
        LocalCursor {
            root,
            path: Vec::new(),
        }
    }

    fn navigate_mut(&mut self) -> &mut LocalValue {
        let mut node = self.root as &mut LocalValue;
        for key in &self.path {
            node = node.child_mut(key);
        }
        node
    }

    /// Descend to a named child, auto-creating the path as needed once read
    /// or written.
    pub fn child(mut self, key: &str) -> Self {
        self.path.push(key.to_string());
        self
    }

    /// Read the value at this path, without mutating. Returns `Unset` if the
    /// path has never been written (mirrors the auto-create-on-read
    /// contract: the caller observes an empty node, even though nothing is
    /// persisted until a `set`).
    pub fn get(&self) -> LocalValue {
        let mut node = self.root.clone();
        for key in &self.path {
            node = node.child(key);
        }
        node
    }

    /// Write a value at this path, auto-creating intermediate nodes.
    pub fn set(mut self, value: impl Into<LocalValue>) {
        let leaf = self.navigate_mut();
        *leaf = value.into();
    }
}
