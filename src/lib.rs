//! Ratchet - a renderer-agnostic component execution engine
//!
//! Components are plain functions, generators, async functions, or async
//! generators. Each mount point keeps a component instance whose body is
//! resumed on every render, with overlapping renders coalesced per instance
//! and failures raised into the nearest ancestor suspended inside a handler.
//!
//! # Example
//!
//! ```
//! use ratchet::{Child, Component, Element, MemoryHost, Renderer, Resume, Step};
//!
//! let counter = Component::generator("Counter", |_ctx, _props| {
//!     let mut count = 0;
//!     move |_ctx: &ratchet::Context, input: Resume| match input {
//!         Resume::Next(_) => {
//!             count += 1;
//!             Step::Yield(Element::host("p").child(count).into())
//!         }
//!         Resume::Throw(err) => Step::Throw(err),
//!         _ => Step::Return(Child::Empty),
//!     }
//! });
//!
//! let host = MemoryHost::new();
//! let renderer = Renderer::new(host.clone());
//! let root = renderer.create_root();
//! let _ = renderer.render(counter.element().into(), root).unwrap();
//! let _ = renderer.render(counter.element().into(), root).unwrap();
//! assert_eq!(host.html(root), "<p>2</p>");
//! ```
//!
//! Renders that involve pending async work return [`Settled::Pending`] and
//! must run inside a [`tokio::task::LocalSet`].

#![doc(html_root_url = "https://docs.rs/ratchet")]
#![warn(rust_2018_idioms)]

pub mod components;
pub mod runtime;
pub mod scenarios;
pub mod util;

pub use runtime::component::{
    AsyncGenerator, AsyncGeneratorFn, AsyncResumption, Component, ComponentKind, Generator,
    Resume, Step,
};
pub use runtime::context::{Context, Event, HandlerMarker, ListenerId};
pub use runtime::element::{Child, Element, Key, Props, Tag, Value};
pub use runtime::errors::{EngineError, RenderError, RenderResult};
pub use runtime::host::{Host, HostEffect, HostId, MemoryHost};
pub use runtime::instance::{InstanceId, RenderState};
pub use runtime::scheduler::{RenderHandle, RenderStats, Renderer, Settled};
pub use util::config::EngineConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "Ratchet";
