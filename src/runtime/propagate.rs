//! Error propagation
//!
//! A failure that no caller is positioned to receive (a refresh, or a body
//! that failed after its render already settled) walks the ancestor chain.
//! The first ancestor suspended inside a handler gets the error raised at
//! its suspension point. Generators passed on the way have no handler at
//! their suspension point, so the error leaves them closed, the same way an
//! uncaught throw ends a generator.
//!
//! Failures travelling up through a parent's pending child list take the
//! list path in the scheduler instead; both paths end in the same handler
//! check.

use std::rc::Rc;

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::runtime::component::Resume;
use crate::runtime::errors::{RenderError, RenderResult};
use crate::runtime::instance::{Body, Execution, Instance, NodeRef, Origin, RenderState};
use crate::runtime::scheduler::{self, Engine, Settle};

enum Walk {
    Next(Option<NodeRef>),
    Catch(Body, oneshot::Receiver<RenderResult<()>>),
    Wait(oneshot::Receiver<RenderResult<()>>),
    Stop,
}

/// Attach a waiter to whatever execution the ancestor will settle next.
fn watch(inst: &mut Instance) -> oneshot::Receiver<RenderResult<()>> {
    let (tx, rx) = oneshot::channel();
    match inst.active.as_mut() {
        Some(exec) => exec.waiters.push(tx),
        None => {
            let mut exec = Execution::new(Origin::Detached);
            exec.waiters.push(tx);
            inst.active = Some(exec);
        }
    }
    rx
}

/// Deliver `err`, raised by `node`, to the nearest ancestor able to catch
/// it.
///
/// Settles `Ok` once the catching ancestor commits its recovery, or with the
/// error itself when the walk reaches the mount target.
pub(crate) fn propagate(
    engine: &Rc<Engine>,
    node: &NodeRef,
    err: RenderError,
) -> Settle {
    if err.is_fatal() {
        return Settle::Ready(Err(err));
    }

    let mut cursor = node.borrow().parent.upgrade();
    while let Some(ancestor) = cursor {
        let walk = {
            let mut a = ancestor.borrow_mut();
            let next = a.parent.upgrade();
            let unmounted = a.unmounted;
            let label = a.label();
            match a.instance_mut() {
                None => Walk::Next(next),
                Some(_) if unmounted => Walk::Stop,
                Some(inst) if inst.can_catch() => {
                    let rx = watch(inst);
                    inst.resumptions = 0;
                    Walk::Catch(std::mem::replace(&mut inst.body, Body::Running), rx)
                }
                Some(inst) if !inst.state.is_resting() => {
                    trace!(node = %label, "ancestor busy, deferring failure");
                    inst.deferred_throw.get_or_insert_with(|| err.clone());
                    Walk::Wait(watch(inst))
                }
                Some(inst) => {
                    if inst.body.is_suspended_generator() {
                        trace!(node = %label, "closing generator without handler");
                        inst.body = Body::Empty;
                        inst.state = RenderState::Errored;
                    }
                    Walk::Next(next)
                }
            }
        };

        match walk {
            Walk::Next(next) => cursor = next,
            Walk::Stop => break,
            Walk::Wait(rx) => return scheduler::settle_from(rx),
            Walk::Catch(body, rx) => {
                let ctx = ancestor
                    .borrow()
                    .instance()
                    .map(|inst| inst.ctx.clone());
                match ctx {
                    Some(ctx) => {
                        debug!(id = %ctx.id(), "failure caught by ancestor");
                        scheduler::throw_into(engine, &ancestor, &ctx, body, err);
                    }
                    None => scheduler::resume(engine, &ancestor, body, Resume::Throw(err)),
                }
                return scheduler::settle_from(rx);
            }
        }
    }
    Settle::Ready(Err(err))
}
