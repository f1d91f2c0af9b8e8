//! Property values
//!
//! Props are read-only snapshots from a component's point of view: the
//! engine clones them into the body and never mutates them afterwards.

use std::fmt;

use indexmap::IndexMap;

use super::Child;

/// A single property value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / null value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    Str(String),
    /// List of values
    List(Vec<Value>),
    /// A renderable subtree (e.g. a `fallback` prop)
    Node(Box<Child>),
}

impl Value {
    /// Get as boolean, if it is one.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer, if it is one.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float; integers widen.
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string slice.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as renderable node.
    #[inline]
    pub fn as_node(&self) -> Option<&Child> {
        match self {
            Value::Node(child) => Some(child),
            _ => None,
        }
    }

    /// Check for null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Node(_) => f.write_str("[node]"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(i as i64)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Child> for Value {
    fn from(child: Child) -> Self {
        Value::Node(Box::new(child))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Property set handed to a component or host node.
///
/// Children are carried alongside the named properties so that component
/// bodies can read them like any other prop.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Props {
    values: IndexMap<String, Value>,
    children: Vec<Child>,
}

impl Props {
    /// Create an empty property set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a property.
    #[inline]
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.values.get(name)
    }

    /// Look up an integer property.
    #[inline]
    pub fn int(
        &self,
        name: &str,
    ) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    /// Look up a string property.
    #[inline]
    pub fn str(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Look up a renderable property; missing values render as empty.
    pub fn node(
        &self,
        name: &str,
    ) -> Child {
        self.get(name)
            .and_then(Value::as_node)
            .cloned()
            .unwrap_or_default()
    }

    /// Set a property.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style `set`.
    pub fn with(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.set(name, value);
        self
    }

    /// Children passed to the element.
    #[inline]
    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Children as a single renderable.
    pub fn children_node(&self) -> Child {
        match self.children.len() {
            0 => Child::Empty,
            1 => self.children[0].clone(),
            _ => Child::Fragment(self.children.clone()),
        }
    }

    /// Replace the children.
    #[inline]
    pub fn set_children(
        &mut self,
        children: Vec<Child>,
    ) {
        self.children = children;
    }

    /// Append a child.
    #[inline]
    pub fn push_child(
        &mut self,
        child: Child,
    ) {
        self.children.push(child);
    }

    /// Iterate named properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of named properties.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check for an empty property set (children ignored).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Named properties only, without children.
    pub(crate) fn attributes(&self) -> Props {
        Props {
            values: self.values.clone(),
            children: Vec::new(),
        }
    }
}
