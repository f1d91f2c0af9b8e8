//! Component context
//!
//! One [`Context`] is created with each component instance and handed to its
//! body on every resumption. It is the body's only handle on the engine:
//! reading props, refreshing, handler markers, events, post-commit callbacks,
//! cleanup, and ancestor-chained provisions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::runtime::element::{Props, Value};
use crate::runtime::errors::{EngineError, RenderResult};
use crate::runtime::instance::{self, InstanceId, NodeRef, RenderState, WeakNode};
use crate::runtime::scheduler::{self, Engine, Settled};

/// Record that the body's current suspension point is inside a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerMarker(pub usize);

/// Listener registration id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub usize);

type Listener = Rc<dyn Fn(&Event)>;

/// An event dispatched through the component tree.
pub struct Event {
    name: String,
    detail: Value,
    target: Cell<Option<InstanceId>>,
    stopped: Cell<bool>,
}

impl Event {
    /// Create an event.
    pub fn new(
        name: impl Into<String>,
        detail: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
            target: Cell::new(None),
            stopped: Cell::new(false),
        }
    }

    /// Event name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event payload.
    #[inline]
    pub fn detail(&self) -> &Value {
        &self.detail
    }

    /// Instance that dispatched the event.
    #[inline]
    pub fn target(&self) -> Option<InstanceId> {
        self.target.get()
    }

    /// Stop bubbling after the current listeners.
    #[inline]
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    /// Whether bubbling was stopped.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

impl fmt::Debug for Event {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("detail", &self.detail)
            .field("stopped", &self.stopped.get())
            .finish()
    }
}

struct ContextInner {
    id: InstanceId,
    name: String,
    node: WeakNode,
    engine: Weak<Engine>,
    handlers: RefCell<SmallVec<[HandlerMarker; 2]>>,
    listeners: RefCell<IndexMap<String, Vec<(ListenerId, Listener)>>>,
    next_listener: Cell<usize>,
    scheduled: RefCell<Vec<Box<dyn FnOnce()>>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    provisions: RefCell<IndexMap<String, Value>>,
}

/// Capability handle passed to a component body.
#[derive(Clone)]
pub struct Context(Rc<ContextInner>);

impl Context {
    pub(crate) fn new(
        id: InstanceId,
        name: &str,
        node: WeakNode,
        engine: Weak<Engine>,
    ) -> Self {
        Self(Rc::new(ContextInner {
            id,
            name: name.to_string(),
            node,
            engine,
            handlers: RefCell::new(SmallVec::new()),
            listeners: RefCell::new(IndexMap::new()),
            next_listener: Cell::new(0),
            scheduled: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            provisions: RefCell::new(IndexMap::new()),
        }))
    }

    /// Instance id.
    #[inline]
    pub fn id(&self) -> InstanceId {
        self.0.id
    }

    /// Component name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    fn node(&self) -> Option<NodeRef> {
        self.0.node.upgrade()
    }

    fn live(&self) -> RenderResult<(Rc<Engine>, NodeRef)> {
        let unmounted = || EngineError::Unmounted(self.0.id).into();
        let engine = self.0.engine.upgrade().ok_or_else(unmounted)?;
        let node = self.node().ok_or_else(unmounted)?;
        if node.borrow().unmounted {
            return Err(unmounted());
        }
        Ok((engine, node))
    }

    /// Props of the render in flight, or of the last one.
    ///
    /// Props handed to a render that is still queued behind a busy body
    /// show up here once that render starts.
    pub fn props(&self) -> Props {
        self.node()
            .and_then(|node| node.borrow().instance().map(|inst| inst.props.clone()))
            .unwrap_or_default()
    }

    /// Lifecycle state of the instance.
    pub fn state(&self) -> RenderState {
        self.node()
            .and_then(|node| node.borrow().instance().map(|inst| inst.state))
            .unwrap_or(RenderState::Unmounted)
    }

    /// Whether the instance has been torn down.
    pub fn is_unmounted(&self) -> bool {
        self.state() == RenderState::Unmounted
    }

    /// Re-run the body with its current props.
    ///
    /// Overlapping refreshes coalesce: while a render is in flight, later
    /// requests share a single follow-up execution.
    pub fn refresh(&self) -> RenderResult<Settled> {
        let (engine, node) = self.live()?;
        scheduler::refresh(&engine, &node)
    }

    /// Mark the current suspension point as protected by a handler.
    pub fn push_handler(&self) -> HandlerMarker {
        let mut handlers = self.0.handlers.borrow_mut();
        let marker = HandlerMarker(handlers.len());
        handlers.push(marker);
        marker
    }

    /// Leave the innermost protected region.
    pub fn pop_handler(&self) -> Option<HandlerMarker> {
        self.0.handlers.borrow_mut().pop()
    }

    /// Whether a child failure would be raised inside the body.
    pub fn has_handler(&self) -> bool {
        !self.0.handlers.borrow().is_empty()
    }

    /// Drop the markers of a body that no longer exists.
    pub(crate) fn clear_handlers(&self) {
        self.0.handlers.borrow_mut().clear();
    }

    /// Register a listener for events named `name`.
    pub fn add_listener<F>(
        &self,
        name: impl Into<String>,
        listener: F,
    ) -> ListenerId
    where
        F: Fn(&Event) + 'static,
    {
        let id = ListenerId(self.0.next_listener.get());
        self.0.next_listener.set(id.0 + 1);
        self.0
            .listeners
            .borrow_mut()
            .entry(name.into())
            .or_default()
            .push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_listener(
        &self,
        name: &str,
        id: ListenerId,
    ) -> bool {
        let mut listeners = self.0.listeners.borrow_mut();
        match listeners.get_mut(name) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|(entry, _)| *entry != id);
                before != entries.len()
            }
            None => false,
        }
    }

    fn notify(
        &self,
        event: &Event,
    ) {
        let targets: Vec<Listener> = self
            .0
            .listeners
            .borrow()
            .get(event.name())
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        for listener in targets {
            listener(event);
        }
    }

    /// Deliver `event` here, then to each ancestor until stopped.
    pub fn dispatch(
        &self,
        event: &Event,
    ) {
        event.target.set(Some(self.0.id));
        self.notify(event);
        for ctx in self.ancestors() {
            if event.is_stopped() {
                break;
            }
            ctx.notify(event);
        }
    }

    /// Run `callback` once, right after this instance's next commit.
    pub fn schedule<F>(
        &self,
        callback: F,
    ) where
        F: FnOnce() + 'static,
    {
        self.0.scheduled.borrow_mut().push(Box::new(callback));
    }

    /// Run `callback` exactly once when the instance unmounts.
    pub fn cleanup<F>(
        &self,
        callback: F,
    ) where
        F: FnOnce() + 'static,
    {
        self.0.cleanups.borrow_mut().push(Box::new(callback));
    }

    /// Make `value` visible to descendants under `key`.
    pub fn provide(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.0
            .provisions
            .borrow_mut()
            .insert(key.into(), value.into());
    }

    /// Nearest ancestor provision for `key`.
    pub fn consume(
        &self,
        key: &str,
    ) -> Option<Value> {
        self.ancestors()
            .into_iter()
            .find_map(|ctx| ctx.0.provisions.borrow().get(key).cloned())
    }

    /// Current value of the first committed host node rendered by this
    /// instance, read back through the host.
    pub fn host_value(&self) -> Option<Value> {
        let (engine, node) = self.live().ok()?;
        let first = instance::host_children(&node).into_iter().next()?;
        engine.read_host(first)
    }

    /// Contexts of ancestor components, nearest first.
    fn ancestors(&self) -> Vec<Context> {
        let mut out = Vec::new();
        let mut cursor = self.node().and_then(|node| node.borrow().parent.upgrade());
        while let Some(node) = cursor {
            let n = node.borrow();
            if let Some(inst) = n.instance() {
                out.push(inst.ctx.clone());
            }
            cursor = n.parent.upgrade();
        }
        out
    }

    pub(crate) fn take_scheduled(&self) -> Vec<Box<dyn FnOnce()>> {
        std::mem::take(&mut *self.0.scheduled.borrow_mut())
    }

    pub(crate) fn run_cleanups(&self) {
        let cleanups = std::mem::take(&mut *self.0.cleanups.borrow_mut());
        trace!(id = %self.0.id, count = cleanups.len(), "running cleanups");
        for cleanup in cleanups {
            cleanup();
        }
        self.0.listeners.borrow_mut().clear();
        self.clear_handlers();
    }
}

impl fmt::Debug for Context {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("handlers", &self.0.handlers.borrow().len())
            .finish()
    }
}
