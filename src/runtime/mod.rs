//! Runtime system
//!
//! The component execution engine: element trees, component instances and
//! their contexts, the render scheduler, and the error propagator. Output is
//! handed to a [`host::Host`].

pub mod component;
pub mod context;
pub mod element;
pub mod errors;
pub mod host;
pub mod instance;
pub mod propagate;
pub mod scheduler;
