//! Component body driver
//!
//! Runs component bodies and reacts to what they produce. Generators are
//! resumed one [`Step`] at a time; async bodies are polled once in place and
//! parked on the local task set only if they are actually pending.

use std::rc::Rc;
use std::task::Poll;

use tracing::{debug, trace, warn};

use super::{commit, poll_now, Engine, Settle};
use crate::runtime::component::{Component, Definition, Resume, Step};
use crate::runtime::context::Context;
use crate::runtime::element::{Child, Props};
use crate::runtime::errors::{EngineError, RenderError, RenderResult};
use crate::runtime::instance::{Body, Execution, NodeRef, Origin, RenderState};
use crate::runtime::propagate;

struct Prepared {
    component: Component,
    ctx: Context,
    props: Props,
    body: Body,
}

fn prepare(node: &NodeRef) -> Option<Prepared> {
    let mut n = node.borrow_mut();
    let label = n.label();
    let inst = n.instance_mut()?;
    debug!(node = %label, "execute");
    inst.resumptions = 0;
    inst.failure = None;
    inst.state = RenderState::Executing;
    Some(Prepared {
        component: inst.component.clone(),
        ctx: inst.ctx.clone(),
        props: inst.props.clone(),
        body: std::mem::replace(&mut inst.body, Body::Running),
    })
}

/// Start the active execution of a component node.
pub(crate) fn begin(
    engine: &Rc<Engine>,
    node: &NodeRef,
) {
    let Some(Prepared {
        component,
        ctx,
        props,
        body,
    }) = prepare(node)
    else {
        return;
    };
    engine.stats.record_execution();

    match component.definition() {
        Definition::Function(render) => {
            let output = render(&ctx, &props);
            finish_function(engine, node, output);
        }
        Definition::AsyncFunction(render) => {
            set_state(node, RenderState::AwaitingAsync);
            let mut fut = render(ctx, props);
            match poll_now(&mut fut) {
                Poll::Ready(output) => finish_function(engine, node, output),
                Poll::Pending => {
                    let engine = engine.clone();
                    let node = node.clone();
                    tokio::task::spawn_local(async move {
                        let output = fut.await;
                        finish_function(&engine, &node, output);
                    });
                }
            }
        }
        Definition::Generator(factory) => {
            let body = match body {
                Body::Sync(gen) => Body::Sync(gen),
                _ => {
                    ctx.clear_handlers();
                    Body::Sync(factory(&ctx, &props))
                }
            };
            resume(engine, node, body, Resume::Next(props));
        }
        Definition::AsyncGenerator(factory) => {
            let body = match body {
                Body::Async(gen) => Body::Async(gen),
                _ => {
                    ctx.clear_handlers();
                    Body::Async(factory(&ctx, &props))
                }
            };
            resume(engine, node, body, Resume::Next(props));
        }
    }
}

fn set_state(
    node: &NodeRef,
    state: RenderState,
) {
    if let Some(inst) = node.borrow_mut().instance_mut() {
        inst.state = state;
    }
}

/// Put a body back and record where it rests.
fn store(
    node: &NodeRef,
    body: Body,
    state: RenderState,
) {
    if let Some(inst) = node.borrow_mut().instance_mut() {
        inst.body = body;
        inst.state = state;
    }
}

fn finish_function(
    engine: &Rc<Engine>,
    node: &NodeRef,
    output: RenderResult<Child>,
) {
    let deferred = {
        let mut n = node.borrow_mut();
        if n.unmounted {
            return;
        }
        let Some(inst) = n.instance_mut() else {
            return;
        };
        inst.body = Body::Empty;
        inst.state = match output {
            Ok(_) => RenderState::Idle,
            Err(_) => RenderState::Errored,
        };
        inst.deferred_throw.take()
    };
    match (output, deferred) {
        (Err(err), _) | (Ok(_), Some(err)) => fail_execution(engine, node, err),
        (Ok(child), None) => {
            let _ = commit::produce(engine, node, child.into_list(), false);
            maybe_advance(engine, node);
        }
    }
}

/// Resume a generator body with `input`.
pub(crate) fn resume(
    engine: &Rc<Engine>,
    node: &NodeRef,
    body: Body,
    input: Resume,
) {
    let limit = engine.config.max_resumptions;
    let (ctx, unmounted, runaway) = {
        let mut n = node.borrow_mut();
        let id = n.id;
        let unmounted = n.unmounted;
        let Some(inst) = n.instance_mut() else {
            return;
        };
        inst.resumptions += 1;
        let runaway = inst.resumptions > limit;
        if runaway {
            inst.body = Body::Empty;
            inst.state = RenderState::Errored;
        } else if !unmounted {
            inst.body = Body::Running;
            inst.state = match body {
                Body::Async(_) => RenderState::AwaitingAsync,
                _ => RenderState::Executing,
            };
        }
        let runaway = runaway.then(|| RenderError::from(EngineError::RunawayGenerator { id, limit }));
        (inst.ctx.clone(), unmounted, runaway)
    };
    if unmounted {
        force_return(ctx, body);
        return;
    }
    if let Some(err) = runaway {
        warn!(error = %err, "stopping generator");
        fail_execution(engine, node, err);
        return;
    }
    trace!(id = %ctx.id(), ?input, "resume");

    match body {
        Body::Sync(mut gen) => {
            let step = gen.resume(&ctx, input);
            on_step(engine, node, Body::Sync(gen), step);
        }
        Body::Async(gen) => {
            let mut fut = gen.resume(ctx, input);
            match poll_now(&mut fut) {
                Poll::Ready((gen, step)) => on_step(engine, node, Body::Async(gen), step),
                Poll::Pending => {
                    let engine = engine.clone();
                    let node = node.clone();
                    tokio::task::spawn_local(async move {
                        let (gen, step) = fut.await;
                        on_step(&engine, &node, Body::Async(gen), step);
                    });
                }
            }
        }
        Body::Empty | Body::Running | Body::Returned => {}
    }
}

/// Raise `err` at the suspension point, leaving the innermost protected
/// region.
///
/// Whatever raised `err` below `node` is dropped from reuse first, so the
/// recovery render mounts fresh instances in its place.
pub(crate) fn throw_into(
    engine: &Rc<Engine>,
    node: &NodeRef,
    ctx: &Context,
    body: Body,
    err: RenderError,
) {
    commit::discard_failed(engine, node, &err);
    ctx.pop_handler();
    engine.stats.record_caught();
    debug!(id = %ctx.id(), error = %err, "delivering failure to handler");
    resume(engine, node, body, Resume::Throw(err));
}

fn on_step(
    engine: &Rc<Engine>,
    node: &NodeRef,
    body: Body,
    step: Step,
) {
    let (ctx, unmounted, deferred) = {
        let mut n = node.borrow_mut();
        let unmounted = n.unmounted;
        let Some(inst) = n.instance_mut() else {
            return;
        };
        (inst.ctx.clone(), unmounted, inst.deferred_throw.take())
    };
    if unmounted {
        // output of an unmounted instance is never committed
        if matches!(step, Step::Yield(_) | Step::Interim(_)) {
            force_return(ctx, body);
        }
        return;
    }

    if let Some(err) = deferred {
        match step {
            Step::Yield(_) | Step::Interim(_) if ctx.has_handler() => {
                throw_into(engine, node, &ctx, body, err);
            }
            Step::Throw(own) => {
                store(node, Body::Empty, RenderState::Errored);
                fail_execution(engine, node, own);
            }
            _ => {
                store(node, Body::Empty, RenderState::Errored);
                fail_execution(engine, node, err);
            }
        }
        return;
    }

    match step {
        Step::Yield(child) => {
            store(node, body, RenderState::AwaitingIteration);
            let _ = commit::produce(engine, node, child.into_list(), false);
            maybe_advance(engine, node);
        }
        Step::Interim(child) => {
            store(node, body, RenderState::Executing);
            let _ = commit::produce(engine, node, child.into_list(), true);
            let (body, deferred) = {
                let mut n = node.borrow_mut();
                if n.unmounted {
                    return;
                }
                let Some(inst) = n.instance_mut() else {
                    return;
                };
                if !inst.body.is_suspended_generator() {
                    return;
                }
                (
                    std::mem::replace(&mut inst.body, Body::Running),
                    inst.deferred_throw.take(),
                )
            };
            match deferred {
                None => resume(engine, node, body, Resume::Continue),
                Some(err) if ctx.has_handler() => throw_into(engine, node, &ctx, body, err),
                Some(err) => {
                    store(node, Body::Empty, RenderState::Errored);
                    fail_execution(engine, node, err);
                }
            }
        }
        Step::Return(child) => {
            store(node, Body::Returned, RenderState::Idle);
            let _ = commit::produce(engine, node, child.into_list(), false);
            maybe_advance(engine, node);
        }
        Step::Throw(err) => {
            store(node, Body::Empty, RenderState::Errored);
            fail_execution(engine, node, err);
        }
    }
}

/// Drive a suspended body to completion, discarding its output.
pub(crate) fn force_return(
    ctx: Context,
    body: Body,
) {
    match body {
        Body::Sync(mut gen) => {
            let _ = gen.resume(&ctx, Resume::Return);
        }
        Body::Async(gen) => {
            let mut fut = gen.resume(ctx, Resume::Return);
            if poll_now(&mut fut).is_pending() {
                tokio::task::spawn_local(async move {
                    let _ = fut.await;
                });
            }
        }
        Body::Empty | Body::Running | Body::Returned => {}
    }
}

/// The active execution failed.
///
/// A parent-driven execution reports to the parent's child list, which runs
/// the handler search from there. Anything else walks the ancestors itself.
pub(crate) fn fail_execution(
    engine: &Rc<Engine>,
    node: &NodeRef,
    err: RenderError,
) {
    let exec = node.borrow_mut().instance_mut().and_then(|inst| {
        inst.failure = Some(err.clone());
        inst.active.take()
    });
    match exec {
        Some(exec) if exec.origin == Origin::Parent => {
            debug!(error = %err, "render failed, reporting to parent");
            exec.resolve(Err(err));
        }
        exec => {
            let settle = propagate::propagate(engine, node, err);
            deliver(engine, exec, settle);
        }
    }
    maybe_advance(engine, node);
}

fn deliver(
    engine: &Rc<Engine>,
    exec: Option<Execution>,
    settle: Settle,
) {
    fn conclude(
        engine: &Engine,
        exec: Option<Execution>,
        result: RenderResult<()>,
    ) {
        match (exec, result) {
            (Some(exec), result) => engine.finish(exec, result),
            (None, Err(err)) => engine.record_uncaught(err),
            (None, Ok(())) => {}
        }
    }

    match settle {
        Settle::Ready(result) => conclude(engine, exec, result),
        Settle::Pending(fut) => {
            let engine = engine.clone();
            tokio::task::spawn_local(async move {
                let result = fut.await;
                conclude(&engine, exec, result);
            });
        }
    }
}

/// A child list of `node` failed.
pub(crate) fn list_failed(
    engine: &Rc<Engine>,
    node: &NodeRef,
    seq: u64,
    err: RenderError,
) {
    enum Action {
        Done,
        Catch(Body, Context),
        Fail,
    }

    let (action, released) = {
        let mut n = node.borrow_mut();
        if n.unmounted {
            return;
        }
        let Some(pos) = n.lists.pending.iter().position(|list| list.seq == seq) else {
            return;
        };
        let mut list = n.lists.pending.remove(pos);
        let released = std::mem::take(&mut list.nodes);
        let stale = n.lists.committed_seq > seq;
        let action = if stale {
            trace!(seq, error = %err, "dropping failure of a stale list");
            list.settle(Ok(()));
            Action::Done
        } else {
            match n.instance_mut() {
                None => {
                    list.settle(Err(err.clone()));
                    Action::Done
                }
                Some(_) if err.is_fatal() => Action::Fail,
                Some(inst) if inst.can_catch() => Action::Catch(
                    std::mem::replace(&mut inst.body, Body::Running),
                    inst.ctx.clone(),
                ),
                Some(inst) if !inst.state.is_resting() => {
                    inst.deferred_throw.get_or_insert_with(|| err.clone());
                    Action::Done
                }
                Some(inst) => {
                    inst.body = Body::Empty;
                    inst.state = RenderState::Errored;
                    Action::Fail
                }
            }
        };
        (action, released)
    };
    commit::sweep(engine, node, released);

    match action {
        Action::Done => {}
        Action::Catch(body, ctx) => throw_into(engine, node, &ctx, body, err),
        Action::Fail => fail_execution(engine, node, err),
    }
}

/// Start the queued execution once the instance is free.
pub(crate) fn maybe_advance(
    engine: &Rc<Engine>,
    node: &NodeRef,
) {
    let next = {
        let mut n = node.borrow_mut();
        if n.unmounted {
            return;
        }
        let Some(inst) = n.instance_mut() else {
            return;
        };
        if inst.active.is_some() || !inst.state.is_resting() {
            return;
        }
        let Some(queued) = inst.queued.take() else {
            return;
        };
        let props = inst.pending_props.take();
        if inst.is_frozen() {
            Err(queued)
        } else {
            if let Some(props) = props {
                inst.props = props;
            }
            inst.active = Some(queued);
            Ok(())
        }
    };
    match next {
        Ok(()) => begin(engine, node),
        Err(frozen) => frozen.resolve(Ok(())),
    }
}
