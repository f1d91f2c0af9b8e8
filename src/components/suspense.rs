//! Suspense-style placeholder
//!
//! [`suspense`] renders its `fallback` after `timeout` milliseconds unless
//! its children settle first. Each iteration yields the delayed fallback as
//! an interim output, then the children. Whichever list settles first wins;
//! a fallback that settles after the children have committed is dropped, so
//! the output never flips back to the placeholder.

use std::time::Duration;

use futures::future;
use futures::FutureExt;

use crate::runtime::component::{AsyncGenerator, AsyncResumption, Component, Resume, Step};
use crate::runtime::context::Context;
use crate::runtime::element::{Child, Props};
use crate::runtime::errors::RenderError;

/// Fallback delay used when no `timeout` prop is given.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

thread_local! {
    static DELAYED: Component = Component::async_function("Delayed", |_ctx, props: Props| async move {
        let timeout = timeout_of(&props);
        tokio::time::sleep(Duration::from_millis(timeout)).await;
        Ok::<_, RenderError>(props.children_node())
    });

    static SUSPENSE: Component = Component::async_generator("Suspense", |_ctx, _props| SuspenseBody {
        children: Child::Empty,
    });
}

fn timeout_of(props: &Props) -> u64 {
    props
        .int("timeout")
        .and_then(|ms| u64::try_from(ms).ok())
        .unwrap_or(DEFAULT_TIMEOUT_MS)
}

/// Renders its children after `timeout` milliseconds.
pub fn delayed() -> Component {
    DELAYED.with(Component::clone)
}

/// Shows `fallback` while `children` are pending for longer than `timeout`.
///
/// ```ignore
/// suspense()
///     .element()
///     .prop("fallback", Child::from(Element::host("span").child("Loading...")))
///     .prop("timeout", 100)
///     .child(slow.element())
/// ```
pub fn suspense() -> Component {
    SUSPENSE.with(Component::clone)
}

struct SuspenseBody {
    children: Child,
}

impl AsyncGenerator for SuspenseBody {
    fn resume(
        mut self: Box<Self>,
        _ctx: Context,
        input: Resume,
    ) -> AsyncResumption {
        let step = match input {
            Resume::Next(props) => {
                self.children = props.children_node();
                let placeholder = delayed()
                    .element()
                    .prop("timeout", timeout_of(&props))
                    .child(props.node("fallback"));
                Step::Interim(placeholder.into())
            }
            Resume::Continue => Step::Yield(std::mem::take(&mut self.children)),
            Resume::Throw(err) => Step::Throw(err),
            Resume::Return => Step::Return(Child::Empty),
        };
        future::ready((self as Box<dyn AsyncGenerator>, step)).boxed_local()
    }
}
