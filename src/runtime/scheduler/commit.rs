//! Child list racing and host effects
//!
//! Every reconciliation of a node's children produces a numbered list. Lists
//! settle independently and race to commit:
//!
//! ```text
//! seq <= committed_seq            too old, discarded
//! interim && epoch != commits     placeholder overtaken, discarded
//! otherwise                       committed; older pending lists retire
//! ```
//!
//! Nodes that end up in no list at all are unmounted.

use std::rc::Rc;

use hashbrown::HashSet;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::{driver, reconcile, settle_from, Engine, Settle};
use crate::runtime::element::Child;
use crate::runtime::errors::{RenderError, RenderResult};
use crate::runtime::host::HostEffect;
use crate::runtime::instance::{self, Body, NodeKind, NodeRef, PendingList, RenderState};

/// Reconcile `children` under `node` and race the resulting list.
///
/// The returned settlement reports when this list committed (or lost its
/// race), for owners whose parent list waits on them.
pub(crate) fn produce(
    engine: &Rc<Engine>,
    node: &NodeRef,
    children: Vec<Child>,
    interim: bool,
) -> Settle {
    let (seq, epoch) = {
        let mut n = node.borrow_mut();
        let seq = n.lists.reserve();
        let epoch = n.lists.commits;
        if let Some(exec) = n.instance_mut().and_then(|inst| inst.active.as_mut()) {
            exec.first_seq.get_or_insert(seq);
        }
        (seq, epoch)
    };

    let (tx, rx) = oneshot::channel();
    let (settle, replaced) = match reconcile::update_children(engine, node, children) {
        Ok((nodes, settle)) => {
            let mut n = node.borrow_mut();
            n.lists.pending.push(PendingList {
                seq,
                interim,
                epoch,
                nodes: nodes.clone(),
                notify: Some(tx),
            });
            (settle, std::mem::replace(&mut n.lists.current, nodes))
        }
        Err(err) => {
            node.borrow_mut().lists.pending.push(PendingList {
                seq,
                interim,
                epoch,
                nodes: Vec::new(),
                notify: Some(tx),
            });
            (Settle::Ready(Err(err)), Vec::new())
        }
    };
    sweep(engine, node, replaced);

    match settle {
        Settle::Ready(result) => list_settled(engine, node, seq, result),
        Settle::Pending(fut) => {
            trace!(seq, "list pending");
            let engine = engine.clone();
            let node = node.clone();
            tokio::task::spawn_local(async move {
                let result = fut.await;
                list_settled(&engine, &node, seq, result);
            });
        }
    }
    settle_from(rx)
}

fn list_settled(
    engine: &Rc<Engine>,
    node: &NodeRef,
    seq: u64,
    result: RenderResult<()>,
) {
    match result {
        Ok(()) => commit_list(engine, node, seq),
        Err(err) => driver::list_failed(engine, node, seq, err),
    }
}

enum Outcome {
    Discarded(Vec<NodeRef>),
    Committed {
        released: Vec<NodeRef>,
        notify: Option<oneshot::Sender<RenderResult<()>>>,
    },
}

fn commit_list(
    engine: &Rc<Engine>,
    node: &NodeRef,
    seq: u64,
) {
    let outcome = {
        let mut n = node.borrow_mut();
        if n.unmounted {
            return;
        }
        let Some(pos) = n.lists.pending.iter().position(|list| list.seq == seq) else {
            return;
        };
        let mut list = n.lists.pending.remove(pos);
        let lists = &mut n.lists;
        if seq <= lists.committed_seq || (list.interim && list.epoch != lists.commits) {
            list.settle(Ok(()));
            Outcome::Discarded(list.nodes)
        } else {
            let mut released = std::mem::replace(&mut lists.committed, list.nodes);
            lists.committed_seq = seq;
            lists.commits += 1;
            let (older, newer): (Vec<PendingList>, Vec<PendingList>) = lists
                .pending
                .drain(..)
                .partition(|pending| pending.seq < seq);
            lists.pending = newer;
            for mut retired in older {
                retired.settle(Ok(()));
                released.append(&mut retired.nodes);
            }
            Outcome::Committed {
                released,
                notify: list.notify.take(),
            }
        }
    };

    match outcome {
        Outcome::Discarded(nodes) => {
            trace!(seq, "list lost its race");
            engine.stats.record_discard();
            sweep(engine, node, nodes);
        }
        Outcome::Committed { released, notify } => {
            debug!(node = %node.borrow().label(), seq, "commit");
            engine.stats.record_commit();
            flush(engine, node);
            arrange(engine, node);
            sweep(engine, node, released);
            settle_commit(node, seq);
            if let Some(tx) = notify {
                let _ = tx.send(Ok(()));
            }
            driver::maybe_advance(engine, node);
        }
    }
}

/// Send text and attribute changes made visible by this commit.
fn flush(
    engine: &Engine,
    node: &NodeRef,
) {
    let mut effects = Vec::new();
    {
        let mut n = node.borrow_mut();
        let host = n.host;
        if let (Some(id), NodeKind::Host { props, committed, .. }) = (host, &mut n.kind) {
            if props != committed {
                *committed = props.clone();
                effects.push(HostEffect::Update {
                    id,
                    props: props.clone(),
                });
            }
        }
        for child in &n.lists.committed {
            let mut c = child.borrow_mut();
            let host = c.host;
            if let (Some(id), NodeKind::Text { text, committed }) = (host, &mut c.kind) {
                if committed.as_ref() != Some(text) {
                    *committed = Some(text.clone());
                    effects.push(HostEffect::SetText {
                        id,
                        text: text.clone(),
                    });
                }
            }
        }
    }
    for effect in effects {
        engine.emit(effect);
    }
}

/// Re-send the host children of the anchor that shows `node`'s output.
fn arrange(
    engine: &Engine,
    node: &NodeRef,
) {
    let anchor = if node.borrow().is_anchor() {
        Some(node.clone())
    } else {
        instance::host_anchor(node)
    };
    let Some(anchor) = anchor else {
        return;
    };
    let children = instance::host_children(&anchor);
    let effect = {
        let mut a = anchor.borrow_mut();
        if a.unmounted || a.arranged == children {
            None
        } else {
            a.arranged = children.clone();
            a.host.map(|parent| HostEffect::Arrange { parent, children })
        }
    };
    if let Some(effect) = effect {
        engine.emit(effect);
    }
}

/// Resolve the active execution if this commit belongs to it, then run the
/// callbacks scheduled for this commit.
fn settle_commit(
    node: &NodeRef,
    seq: u64,
) {
    let (scheduled, exec) = {
        let mut n = node.borrow_mut();
        match n.instance_mut() {
            Some(inst) => {
                let settles = inst
                    .active
                    .as_ref()
                    .and_then(|exec| exec.first_seq)
                    .is_some_and(|first| seq >= first);
                let exec = if settles { inst.active.take() } else { None };
                (inst.ctx.take_scheduled(), exec)
            }
            None => return,
        }
    };
    for callback in scheduled {
        callback();
    }
    if let Some(exec) = exec {
        exec.resolve(Ok(()));
    }
}

/// Unmount every candidate that no list of `node` still references.
pub(crate) fn sweep(
    engine: &Rc<Engine>,
    node: &NodeRef,
    candidates: Vec<NodeRef>,
) {
    if candidates.is_empty() {
        return;
    }
    let live = {
        let n = node.borrow();
        if n.unmounted {
            return;
        }
        n.lists.live_ids()
    };
    let mut seen = HashSet::new();
    for candidate in candidates {
        let id = candidate.borrow().id;
        if !live.contains(&id) && seen.insert(id) {
            unmount(engine, &candidate);
        }
    }
}

/// Stop reusing the instances below `node` whose last execution ended in
/// `err`.
///
/// An instance that never reached the screen is torn down right away. One
/// that is still displayed stays until its parent commits again, so the
/// recovery output replaces it in a single arrangement.
pub(crate) fn discard_failed(
    engine: &Rc<Engine>,
    node: &NodeRef,
    err: &RenderError,
) {
    let candidates = node.borrow().lists.all_nodes();
    for candidate in candidates {
        let (id, unmounted, failed) = {
            let c = candidate.borrow();
            let failed = c
                .instance()
                .and_then(|inst| inst.failure.as_ref())
                .is_some_and(|failure| failure.same(err));
            (c.id, c.unmounted, failed)
        };
        if unmounted {
            continue;
        }
        if !failed {
            discard_failed(engine, &candidate, err);
            continue;
        }
        trace!(%id, "discarding failed instance");
        let displayed = node.borrow_mut().lists.forget(id);
        if !displayed {
            unmount(engine, &candidate);
        }
    }
}

/// Tear down `node` and everything under it.
///
/// Suspended generators are driven to completion, cleanups run exactly once,
/// and anyone still waiting on the instance is released.
pub(crate) fn unmount(
    engine: &Rc<Engine>,
    node: &NodeRef,
) {
    let (lists, host, teardown) = {
        let mut n = node.borrow_mut();
        if n.unmounted {
            return;
        }
        n.unmounted = true;
        let lists = std::mem::take(&mut n.lists);
        let host = n.host;
        let teardown = n.instance_mut().map(|inst| {
            inst.state = RenderState::Unmounted;
            inst.deferred_throw = None;
            let execs = [inst.active.take(), inst.queued.take()];
            (
                inst.ctx.clone(),
                std::mem::replace(&mut inst.body, Body::Empty),
                execs,
            )
        });
        (lists, host, teardown)
    };
    trace!(id = %node.borrow().id, "unmount");

    if let Some((ctx, body, execs)) = teardown {
        for exec in execs.into_iter().flatten() {
            exec.resolve(Ok(()));
        }
        driver::force_return(ctx.clone(), body);
        ctx.run_cleanups();
    }
    for child in lists.all_nodes() {
        unmount(engine, &child);
    }
    if let Some(id) = host {
        engine.emit(HostEffect::Remove { id });
    }
}
