//! Host boundary
//!
//! The engine never draws anything. Every commit is expressed as an ordered
//! list of [`HostEffect`]s that an output renderer applies through [`Host`].

pub mod memory;

pub use memory::MemoryHost;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::runtime::element::{Props, Value};

/// Identifier of a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub usize);

impl HostId {
    /// Returns the inner value.
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "HostId({})", self.0)
    }
}

/// Allocates host ids for one renderer.
#[derive(Debug, Default)]
pub struct HostIdGenerator {
    next_id: AtomicUsize,
}

impl HostIdGenerator {
    /// Create a new generator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh id.
    #[inline]
    pub fn generate(&self) -> HostId {
        HostId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// One committed host-level side effect.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEffect {
    /// A mount target was created.
    Root {
        /// Target id
        id: HostId,
    },
    /// Create a detached host element.
    Create {
        /// New node id
        id: HostId,
        /// Host tag
        tag: String,
        /// Initial attributes
        props: Props,
    },
    /// Create a detached text node.
    CreateText {
        /// New node id
        id: HostId,
        /// Text content
        text: String,
    },
    /// Replace a text node's content.
    SetText {
        /// Text node id
        id: HostId,
        /// New content
        text: String,
    },
    /// Replace an element's attributes.
    Update {
        /// Element id
        id: HostId,
        /// New attributes
        props: Props,
    },
    /// Set the ordered children of an element or mount target.
    Arrange {
        /// Parent id
        parent: HostId,
        /// Children in document order
        children: Vec<HostId>,
    },
    /// Drop a node.
    Remove {
        /// Node id
        id: HostId,
    },
}

/// An output renderer.
pub trait Host {
    /// Apply one effect. Effects arrive in commit order.
    fn apply(
        &mut self,
        effect: &HostEffect,
    );

    /// Read the current value of a host node (e.g. an input's text) so a
    /// component can preserve it across re-renders.
    fn read(
        &self,
        _id: HostId,
    ) -> Option<Value> {
        None
    }
}
