//! Components built on the core
//!
//! Nothing here has engine support beyond what any user component gets:
//! these are ordinary async functions and async generators.

pub mod suspense;

pub use suspense::{delayed, suspense, DEFAULT_TIMEOUT_MS};
