//! Render scheduler
//!
//! This module owns the [`Engine`] behind a [`Renderer`] and the request path
//! shared by `render` and `refresh`:
//!
//! - `request` admits a render into an instance, coalescing overlapping
//!   requests into at most one queued follow-up;
//! - `driver` runs component bodies and reacts to their steps;
//! - `reconcile` matches a produced child list against the retained tree;
//! - `commit` races child lists and applies host effects.
//!
//! Everything here is single-threaded. Work that cannot settle synchronously
//! is parked on `tokio::task::spawn_local`, so renders that go asynchronous
//! must happen inside a [`tokio::task::LocalSet`].

mod commit;
mod driver;
mod reconcile;

use std::cell::RefCell;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context as TaskContext, Poll};

use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use hashbrown::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

use crate::runtime::element::{Child, Props, Value};
use crate::runtime::errors::{EngineError, RenderError, RenderResult};
use crate::runtime::host::{Host, HostEffect, HostId, HostIdGenerator};
use crate::runtime::instance::{
    self, Execution, InstanceIdGenerator, Node, NodeKind, NodeRef, Origin,
};
use crate::util::config::EngineConfig;

pub(crate) use commit::unmount;
pub(crate) use driver::{resume, throw_into};

/// Engine statistics.
#[derive(Debug, Default)]
pub struct RenderStats {
    /// Component executions started.
    pub executions: AtomicUsize,
    /// Child lists committed.
    pub commits: AtomicUsize,
    /// Child lists dropped after losing a race.
    pub discarded: AtomicUsize,
    /// Failures delivered into a handler.
    pub caught: AtomicUsize,
}

impl RenderStats {
    #[inline]
    pub(crate) fn record_execution(&self) {
        self.executions.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn record_caught(&self) {
        self.caught.fetch_add(1, Ordering::SeqCst);
    }

    /// Executions started so far.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Lists committed so far.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Lists discarded so far.
    pub fn discarded(&self) -> usize {
        self.discarded.load(Ordering::SeqCst)
    }

    /// Failures caught so far.
    pub fn caught(&self) -> usize {
        self.caught.load(Ordering::SeqCst)
    }
}

/// Shared engine state. One per [`Renderer`].
pub(crate) struct Engine {
    config: EngineConfig,
    host: RefCell<Box<dyn Host>>,
    instance_ids: InstanceIdGenerator,
    host_ids: HostIdGenerator,
    /// Mount targets of this renderer, never shared across renderers.
    roots: RefCell<HashMap<HostId, NodeRef>>,
    uncaught: RefCell<Vec<RenderError>>,
    stats: RenderStats,
    this: Weak<Engine>,
}

impl Engine {
    fn new(
        host: Box<dyn Host>,
        config: EngineConfig,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            config,
            host: RefCell::new(host),
            instance_ids: InstanceIdGenerator::new(),
            host_ids: HostIdGenerator::new(),
            roots: RefCell::new(HashMap::new()),
            uncaught: RefCell::new(Vec::new()),
            stats: RenderStats::default(),
            this: this.clone(),
        })
    }

    #[inline]
    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Apply one effect to the host.
    pub(crate) fn emit(
        &self,
        effect: HostEffect,
    ) {
        if self.config.trace_effects {
            trace!(?effect, "host effect");
        }
        self.host.borrow_mut().apply(&effect);
    }

    /// Read a host node back through the host.
    pub(crate) fn read_host(
        &self,
        id: HostId,
    ) -> Option<Value> {
        self.host.borrow().read(id)
    }

    /// Keep an unhandled failure nobody was waiting for.
    pub(crate) fn record_uncaught(
        &self,
        err: RenderError,
    ) {
        error!(error = %err, "uncaught render error");
        self.uncaught.borrow_mut().push(err);
    }

    /// Resolve an execution, keeping the failure if nobody hears it.
    pub(crate) fn finish(
        &self,
        exec: Execution,
        result: RenderResult<()>,
    ) {
        match result {
            Err(err) if exec.waiters.is_empty() => self.record_uncaught(err),
            result => exec.resolve(result),
        }
    }
}

/// How a render settled, as seen by the engine.
pub(crate) enum Settle {
    Ready(RenderResult<()>),
    Pending(LocalBoxFuture<'static, RenderResult<()>>),
}

impl Settle {
    /// Wait for several settlements; the first failure wins.
    pub(crate) fn all(settles: Vec<Settle>) -> Settle {
        let mut pending = Vec::new();
        for settle in settles {
            match settle {
                Settle::Ready(Ok(())) => {}
                Settle::Ready(Err(err)) => return Settle::Ready(Err(err)),
                Settle::Pending(fut) => pending.push(fut),
            }
        }
        if pending.is_empty() {
            Settle::Ready(Ok(()))
        } else {
            Settle::Pending(
                future::try_join_all(pending)
                    .map(|result| result.map(|_| ()))
                    .boxed_local(),
            )
        }
    }
}

/// Turn a waiter into a settlement without blocking.
///
/// A dropped sender means the instance went away before settling, which
/// counts as success.
pub(crate) fn settle_from(mut rx: oneshot::Receiver<RenderResult<()>>) -> Settle {
    match rx.try_recv() {
        Ok(result) => Settle::Ready(result),
        Err(oneshot::error::TryRecvError::Empty) => {
            Settle::Pending(rx.map(|result| result.unwrap_or(Ok(()))).boxed_local())
        }
        Err(oneshot::error::TryRecvError::Closed) => Settle::Ready(Ok(())),
    }
}

/// Poll a future once with a no-op waker.
pub(crate) fn poll_now<F>(fut: &mut F) -> Poll<F::Output>
where
    F: Future + Unpin,
{
    let mut cx = TaskContext::from_waker(futures::task::noop_waker_ref());
    fut.poll_unpin(&mut cx)
}

/// Outcome of a `render` or `refresh` call.
#[must_use = "a pending render reports failures through its handle"]
pub enum Settled {
    /// Everything committed synchronously.
    Done,
    /// Some descendant is still pending.
    Pending(RenderHandle),
}

impl Settled {
    pub(crate) fn from_settle(settle: Settle) -> RenderResult<Self> {
        match settle {
            Settle::Ready(Ok(())) => Ok(Settled::Done),
            Settle::Ready(Err(err)) => Err(err),
            Settle::Pending(fut) => Ok(Settled::Pending(RenderHandle(fut))),
        }
    }

    /// Whether settlement is deferred.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Settled::Pending(_))
    }
}

impl IntoFuture for Settled {
    type Output = RenderResult<()>;
    type IntoFuture = RenderHandle;

    fn into_future(self) -> RenderHandle {
        match self {
            Settled::Done => RenderHandle(future::ready(Ok(())).boxed_local()),
            Settled::Pending(handle) => handle,
        }
    }
}

impl std::fmt::Debug for Settled {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Settled::Done => f.write_str("Done"),
            Settled::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Deferred result of a render; resolves once the matching commit lands.
pub struct RenderHandle(LocalBoxFuture<'static, RenderResult<()>>);

impl Future for RenderHandle {
    type Output = RenderResult<()>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

/// Admit a render into a component node.
///
/// Starts an execution if the instance is resting, otherwise folds the
/// request into the single queued follow-up.
pub(crate) fn request(
    engine: &Rc<Engine>,
    node: &NodeRef,
    origin: Origin,
    props: Option<Props>,
) -> Settle {
    let (tx, rx) = oneshot::channel();
    let start = {
        let mut n = node.borrow_mut();
        let id = n.id;
        if n.unmounted {
            return Settle::Ready(Err(EngineError::Unmounted(id).into()));
        }
        let Some(inst) = n.instance_mut() else {
            return Settle::Ready(Ok(()));
        };
        if inst.active.is_some() || !inst.state.is_resting() {
            trace!(%id, ?origin, "coalescing render");
            if props.is_some() {
                inst.pending_props = props;
            }
            match inst.queued.as_mut() {
                Some(queued) => queued.absorb(origin, tx),
                None => {
                    let mut queued = Execution::new(origin);
                    queued.waiters.push(tx);
                    inst.queued = Some(queued);
                }
            }
            false
        } else if inst.is_frozen() {
            return Settle::Ready(Ok(()));
        } else {
            if let Some(props) = props {
                inst.props = props;
            }
            let mut exec = Execution::new(origin);
            exec.waiters.push(tx);
            inst.active = Some(exec);
            true
        }
    };
    if start {
        driver::begin(engine, node);
    }
    settle_from(rx)
}

/// Re-run a component with its current props.
pub(crate) fn refresh(
    engine: &Rc<Engine>,
    node: &NodeRef,
) -> RenderResult<Settled> {
    Settled::from_settle(request(engine, node, Origin::Refresh, None))
}

/// Drives element trees into a [`Host`].
///
/// ```ignore
/// let host = MemoryHost::new();
/// let renderer = Renderer::new(host.clone());
/// let root = renderer.create_root();
/// renderer.render(Element::host("p").child("hi").into(), root)?;
/// assert_eq!(host.html(root), "<p>hi</p>");
/// ```
pub struct Renderer {
    engine: Rc<Engine>,
}

impl Renderer {
    /// Create a renderer with the default configuration.
    pub fn new<H>(host: H) -> Self
    where
        H: Host + 'static,
    {
        Self::with_config(host, EngineConfig::default())
    }

    /// Create a renderer with an explicit configuration.
    pub fn with_config<H>(
        host: H,
        config: EngineConfig,
    ) -> Self
    where
        H: Host + 'static,
    {
        Self {
            engine: Engine::new(Box::new(host), config),
        }
    }

    /// Allocate a new mount target.
    pub fn create_root(&self) -> HostId {
        let engine = &self.engine;
        let host = engine.host_ids.generate();
        engine.emit(HostEffect::Root { id: host });
        let mut node = Node::new(
            engine.instance_ids.generate(),
            None,
            Weak::new(),
            NodeKind::Root,
        );
        node.host = Some(host);
        engine
            .roots
            .borrow_mut()
            .insert(host, Rc::new(RefCell::new(node)));
        debug!(%host, "created mount target");
        host
    }

    fn root(
        &self,
        root: HostId,
    ) -> RenderResult<NodeRef> {
        self.engine
            .roots
            .borrow()
            .get(&root)
            .cloned()
            .ok_or_else(|| EngineError::UnknownRoot(root).into())
    }

    /// Reconcile `tree` into `root`.
    ///
    /// Returns `Done` when the whole tree committed synchronously, or a
    /// handle that resolves once every async descendant has committed.
    /// Unrecovered failures surface here, identity intact.
    pub fn render(
        &self,
        tree: Child,
        root: HostId,
    ) -> RenderResult<Settled> {
        let node = self.root(root)?;
        debug!(%root, "render");
        Settled::from_settle(commit::produce(&self.engine, &node, tree.into_list(), false))
    }

    /// Tear down everything under `root` and forget the mount target.
    pub fn unmount(
        &self,
        root: HostId,
    ) -> RenderResult<()> {
        let node = self
            .engine
            .roots
            .borrow_mut()
            .remove(&root)
            .ok_or(EngineError::UnknownRoot(root))?;
        debug!(%root, "unmount");
        commit::unmount(&self.engine, &node);
        Ok(())
    }

    /// The committed tree under `root`, rebuilt as elements.
    pub fn snapshot(
        &self,
        root: HostId,
    ) -> Option<Child> {
        self.root(root).ok().map(|node| instance::snapshot(&node))
    }

    /// Failures no handler or caller observed.
    pub fn take_uncaught(&self) -> Vec<RenderError> {
        std::mem::take(&mut *self.engine.uncaught.borrow_mut())
    }

    /// Engine statistics.
    #[inline]
    pub fn stats(&self) -> &RenderStats {
        self.engine.stats()
    }

    /// Active configuration.
    #[inline]
    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let roots: Vec<NodeRef> = self.engine.roots.borrow_mut().drain().map(|(_, n)| n).collect();
        for node in roots {
            commit::unmount(&self.engine, &node);
        }
    }
}

#[cfg(test)]
mod tests;
