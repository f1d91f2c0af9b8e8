//! Element trees
//!
//! An element tree is an immutable description of what to render. A fresh
//! tree is built on every render; the engine reconciles it against the
//! retained instance tree.
//!
//! - [`Child`] - anything renderable (text, elements, fragments, nothing)
//! - [`Element`] - a tagged node with a key and props
//! - [`Tag`] - host primitive name, component reference, or fragment
//! - [`Key`] - explicit identity overriding positional matching

pub mod value;

pub use value::{Props, Value};

use std::borrow::Cow;
use std::fmt;

use crate::runtime::component::Component;

/// What an element renders as.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    /// Host primitive, opaque to the engine
    Host(Cow<'static, str>),
    /// User component, compared by identity
    Component(Component),
    /// Transparent grouping
    Fragment,
}

impl Tag {
    /// Display name for diagnostics.
    pub fn name(&self) -> &str {
        match self {
            Tag::Host(name) => name,
            Tag::Component(c) => c.name(),
            Tag::Fragment => "Fragment",
        }
    }
}

/// Explicit sibling identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// String key
    Str(String),
    /// Integer key
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Key::Str(s) => write!(f, "{:?}", s),
            Key::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i as i64)
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Int(i as i64)
    }
}

/// A tagged element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: Tag,
    key: Option<Key>,
    props: Props,
}

impl Element {
    /// Create an element with the given tag.
    #[inline]
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            key: None,
            props: Props::new(),
        }
    }

    /// Create a host element.
    #[inline]
    pub fn host(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Tag::Host(name.into()))
    }

    /// Create a fragment element.
    #[inline]
    pub fn fragment() -> Self {
        Self::new(Tag::Fragment)
    }

    /// Set the key.
    #[inline]
    pub fn key(
        mut self,
        key: impl Into<Key>,
    ) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set a property.
    #[inline]
    pub fn prop(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.props.set(name, value);
        self
    }

    /// Append a child.
    #[inline]
    pub fn child(
        mut self,
        child: impl Into<Child>,
    ) -> Self {
        self.props.push_child(child.into());
        self
    }

    /// Append several children.
    pub fn children<I, C>(
        mut self,
        children: I,
    ) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        for child in children {
            self.props.push_child(child.into());
        }
        self
    }

    /// Get the tag.
    #[inline]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Get the key, if any.
    #[inline]
    pub fn get_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Get the props (children included).
    #[inline]
    pub fn props(&self) -> &Props {
        &self.props
    }

    pub(crate) fn into_parts(self) -> (Tag, Option<Key>, Props) {
        (self.tag, self.key, self.props)
    }
}

/// Anything that can appear in a child position.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Child {
    /// Renders nothing but still occupies its slot
    #[default]
    Empty,
    /// Text content
    Text(String),
    /// An element
    Element(Element),
    /// An inline list of children
    Fragment(Vec<Child>),
}

impl Child {
    /// Explicit key of this child, if it is a keyed element.
    #[inline]
    pub fn key(&self) -> Option<&Key> {
        match self {
            Child::Element(el) => el.get_key(),
            _ => None,
        }
    }

    /// Flatten a component's output into a sibling list.
    pub(crate) fn into_list(self) -> Vec<Child> {
        match self {
            Child::Fragment(children) => children,
            child => vec![child],
        }
    }
}

impl From<Element> for Child {
    fn from(el: Element) -> Self {
        Child::Element(el)
    }
}

impl From<&str> for Child {
    fn from(s: &str) -> Self {
        Child::Text(s.to_string())
    }
}

impl From<String> for Child {
    fn from(s: String) -> Self {
        Child::Text(s)
    }
}

impl From<i64> for Child {
    fn from(i: i64) -> Self {
        Child::Text(i.to_string())
    }
}

impl From<i32> for Child {
    fn from(i: i32) -> Self {
        Child::Text(i.to_string())
    }
}

impl From<usize> for Child {
    fn from(i: usize) -> Self {
        Child::Text(i.to_string())
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or_default()
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Child::Fragment(items.into_iter().map(Into::into).collect())
    }
}
