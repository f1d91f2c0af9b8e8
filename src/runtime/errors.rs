//! Runtime errors

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::runtime::element::Key;
use crate::runtime::host::HostId;
use crate::runtime::instance::InstanceId;

/// Render result
pub type RenderResult<T> = Result<T, RenderError>;

/// Faults raised by the engine itself.
///
/// These are programming errors (misuse of the scheduler or malformed
/// element trees). They are never delivered to component handlers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Duplicate key {key} among children of {parent}")]
    DuplicateKey {
        /// The offending key
        key: Key,
        /// Node whose children collided
        parent: InstanceId,
    },

    #[error("{0} is unmounted")]
    Unmounted(InstanceId),

    #[error("{id} exceeded {limit} resumptions in a single render")]
    RunawayGenerator {
        /// The runaway instance
        id: InstanceId,
        /// Configured limit
        limit: usize,
    },

    #[error("Unknown mount target {0}")]
    UnknownRoot(HostId),
}

/// A thrown value travelling through the component tree.
///
/// Cloning shares the same underlying error, so identity survives the trip
/// from the throwing component to whichever caller finally observes it.
#[derive(Clone)]
pub struct RenderError(Rc<anyhow::Error>);

impl RenderError {
    /// Wrap any error.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self(Rc::new(error.into()))
    }

    /// Build an error from a message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Rc::new(anyhow::Error::msg(message)))
    }

    /// Whether both handles refer to the same thrown value.
    #[inline]
    pub fn same(
        &self,
        other: &RenderError,
    ) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Downcast the underlying error.
    #[inline]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Engine faults bypass component handlers.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.downcast_ref::<EngineError>().is_some()
    }

    /// Borrow the underlying `anyhow` error.
    #[inline]
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<EngineError> for RenderError {
    fn from(error: EngineError) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for RenderError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for RenderError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}
