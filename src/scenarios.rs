//! Bundled scenarios
//!
//! Small end-to-end runs on a [`MemoryHost`], used by the `ratchet` binary.
//! Each one records every distinct output of its mount target.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::info;

use crate::components::suspense;
use crate::runtime::component::{AsyncGeneratorFn, Component, Resume, Step};
use crate::runtime::context::Context;
use crate::runtime::element::{Child, Element, Props};
use crate::runtime::errors::{RenderError, RenderResult};
use crate::runtime::host::MemoryHost;
use crate::runtime::scheduler::Renderer;
use crate::util::config::EngineConfig;

/// A bundled scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// A generator that throws on its third render
    Errors,
    /// A loop that catches a failing child and restarts it
    Restart,
    /// A placeholder racing a slow child
    Suspense,
    /// Overlapping refreshes folded into one follow-up
    Coalesce,
}

impl fmt::Display for Scenario {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Scenario::Errors => "errors",
            Scenario::Restart => "restart",
            Scenario::Suspense => "suspense",
            Scenario::Coalesce => "coalesce",
        };
        f.write_str(name)
    }
}

/// What a scenario observed.
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Distinct committed outputs, oldest first
    pub frames: Vec<String>,
    /// Render outcomes worth reporting
    pub notes: Vec<String>,
    /// Component executions started
    pub executions: usize,
}

fn lift<T>(result: RenderResult<T>) -> anyhow::Result<T> {
    result.map_err(|err| anyhow::anyhow!("{}", err))
}

/// Run `scenario` to completion. Must be called inside a `LocalSet`.
pub async fn run(
    scenario: Scenario,
    config: EngineConfig,
) -> anyhow::Result<Report> {
    let host = MemoryHost::new();
    let renderer = Renderer::with_config(host.clone(), config);
    let root = renderer.create_root();
    host.watch(root);
    info!(%scenario, "running scenario");

    let mut notes = Vec::new();
    match scenario {
        Scenario::Errors => {
            let thrower = counter_until(2);
            for attempt in 1..=3 {
                match renderer.render(thrower.element().into(), root) {
                    Ok(_) => notes.push(format!("render {}: ok", attempt)),
                    Err(err) => notes.push(format!("render {}: {}", attempt, err)),
                }
            }
        }
        Scenario::Restart => {
            let caught = Rc::new(Cell::new(0));
            let app = restarter(caught.clone());
            for attempt in 1..=5 {
                lift(lift(renderer.render(app.element().into(), root))?.await)?;
                notes.push(format!("render {}: caught {}", attempt, caught.get()));
            }
        }
        Scenario::Suspense => {
            let tree: Child = suspense()
                .element()
                .prop("fallback", Child::from(Element::host("span").child("Loading...")))
                .prop("timeout", 100)
                .child(slow().element().prop("timeout", 200))
                .into();
            lift(lift(renderer.render(tree, root))?.await)?;
            notes.push(format!("settled at: {}", host.html(root)));
            sleep(Duration::from_millis(250)).await;
            notes.push(format!("after 250ms: {}", host.html(root)));
        }
        Scenario::Coalesce => {
            let handle: Rc<RefCell<Option<Context>>> = Rc::new(RefCell::new(None));
            let ticker = ticker(handle.clone());
            lift(lift(renderer.render(ticker.element().into(), root))?.await)?;
            let ctx = handle
                .borrow()
                .clone()
                .ok_or_else(|| anyhow::anyhow!("ticker never mounted"))?;
            let first = lift(ctx.refresh())?;
            let second = lift(ctx.refresh())?;
            let third = lift(ctx.refresh())?;
            lift(first.await)?;
            lift(second.await)?;
            lift(third.await)?;
            notes.push(format!("three refreshes, output {}", host.html(root)));
        }
    }

    Ok(Report {
        frames: host.history(root),
        notes,
        executions: renderer.stats().executions(),
    })
}

/// Yields 0, 1, ... and throws once it reaches `limit`.
pub fn counter_until(limit: i64) -> Component {
    Component::generator("Counter", move |_ctx, _props| {
        let mut i = 0;
        move |_ctx: &Context, input: Resume| match input {
            Resume::Next(_) if i >= limit => Step::Throw(RenderError::msg("sync generator throws")),
            Resume::Next(_) => {
                let step = Step::Yield(Child::from(i));
                i += 1;
                step
            }
            Resume::Throw(err) => Step::Throw(err),
            Resume::Continue | Resume::Return => Step::Return(Child::Empty),
        }
    })
}

/// Yields 1, 2, 3, then throws.
fn three_then_fail() -> Component {
    Component::generator("Thrower", |_ctx, _props| {
        let mut n = 0;
        move |_ctx: &Context, input: Resume| match input {
            Resume::Next(_) if n < 3 => {
                n += 1;
                Step::Yield(Child::from(n))
            }
            Resume::Next(_) => Step::Throw(RenderError::msg("restart")),
            Resume::Throw(err) => Step::Throw(err),
            Resume::Continue | Resume::Return => Step::Return(Child::Empty),
        }
    })
}

fn restarter(caught: Rc<Cell<usize>>) -> Component {
    let thrower = three_then_fail();
    Component::generator("Restarter", move |_ctx, _props| {
        let thrower = thrower.clone();
        let caught = caught.clone();
        move |ctx: &Context, input: Resume| match input {
            Resume::Next(_) => {
                ctx.pop_handler();
                ctx.push_handler();
                Step::Yield(Element::host("div").child(thrower.element()).into())
            }
            Resume::Throw(_) => {
                caught.set(caught.get() + 1);
                Step::Yield(Element::host("div").child("Restarting").into())
            }
            Resume::Continue | Resume::Return => Step::Return(Child::Empty),
        }
    })
}

fn slow() -> Component {
    Component::async_function("Slow", |_ctx, props: Props| async move {
        let ms = props.int("timeout").unwrap_or(0);
        sleep(Duration::from_millis(ms.max(0) as u64)).await;
        Ok::<Child, RenderError>(Element::host("span").child(format!("Child {}", ms)).into())
    })
}

fn ticker(handle: Rc<RefCell<Option<Context>>>) -> Component {
    Component::async_generator("Ticker", move |ctx, _props| {
        *handle.borrow_mut() = Some(ctx.clone());
        let count = Rc::new(Cell::new(0i64));
        AsyncGeneratorFn(move |_ctx: Context, input: Resume| {
            let count = count.clone();
            async move {
                match input {
                    Resume::Next(_) => {
                        sleep(Duration::from_millis(50)).await;
                        count.set(count.get() + 1);
                        Step::Yield(Child::from(count.get()))
                    }
                    Resume::Throw(err) => Step::Throw(err),
                    Resume::Continue | Resume::Return => Step::Return(Child::Empty),
                }
            }
        })
    })
}
