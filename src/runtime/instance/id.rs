//! Instance identifiers
//!
//! Every retained node (component instance, host node, text, fragment) gets
//! a unique id used for diagnostics and error reports.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A unique identifier for a retained node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub usize);

impl InstanceId {
    /// Create a new id with the given value.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratchet::runtime::instance::InstanceId;
    ///
    /// let id = InstanceId::new(42);
    /// assert_eq!(id.value(), 42);
    /// ```
    #[inline]
    pub fn new(value: usize) -> Self {
        InstanceId(value)
    }

    /// Returns the inner value.
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Instance({})", self.0)
    }
}

/// Generator for instance ids, one per renderer.
///
/// # Examples
///
/// ```
/// use ratchet::runtime::instance::InstanceIdGenerator;
///
/// let generator = InstanceIdGenerator::new();
/// let a = generator.generate();
/// let b = generator.generate();
/// assert_ne!(a, b);
/// ```
#[derive(Debug)]
pub struct InstanceIdGenerator {
    next_id: AtomicUsize,
}

impl InstanceIdGenerator {
    /// Create a new generator.
    #[inline]
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(0),
        }
    }

    /// Generate a new unique id.
    #[inline]
    pub fn generate(&self) -> InstanceId {
        InstanceId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for InstanceIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
