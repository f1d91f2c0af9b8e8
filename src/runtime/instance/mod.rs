//! Retained instance tree
//!
//! The engine keeps one [`Node`] per mounted child position. Component
//! positions additionally carry an [`Instance`]: the generator body, the
//! coalescing slots for in-flight renders, and the context handed to the
//! body.
//!
//! Ownership is tree-shaped: a node owns its children through `Rc`, and the
//! only back-edge is the non-owning `parent` pointer used for error bubbling
//! and context chaining.
//!
//! # Child lists
//!
//! Each node tracks three views of its children:
//!
//! ```text
//! current    last reconciled list, used to match the next render
//! committed  list the host currently shows
//! pending    reconciled lists still waiting on async descendants
//! ```
//!
//! Lists are numbered. A pending list commits only if it is newer than the
//! committed one; an interim list is also dropped once anything else has
//! committed since it was produced.

pub mod id;

pub use id::{InstanceId, InstanceIdGenerator};

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashSet;
use tokio::sync::oneshot;

use crate::runtime::component::{AsyncGenerator, Component, Generator};
use crate::runtime::context::Context;
use crate::runtime::element::{Child, Element, Key, Props, Tag};
use crate::runtime::errors::{RenderError, RenderResult};
use crate::runtime::host::HostId;

pub(crate) type NodeRef = Rc<RefCell<Node>>;
pub(crate) type WeakNode = Weak<RefCell<Node>>;

/// Lifecycle state of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Not executing; functions and finished generators rest here.
    Idle,
    /// Body is running synchronously.
    Executing,
    /// Generator paused at its iteration point, waiting for props.
    AwaitingIteration,
    /// Body is waiting on an internal await.
    AwaitingAsync,
    /// Last execution threw; the next render starts a fresh body.
    Errored,
    /// Torn down.
    Unmounted,
}

impl RenderState {
    /// Whether a new execution may start from this state.
    #[inline]
    pub fn is_resting(&self) -> bool {
        matches!(
            self,
            RenderState::Idle | RenderState::AwaitingIteration | RenderState::Errored
        )
    }

    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderState::Idle => "idle",
            RenderState::Executing => "executing",
            RenderState::AwaitingIteration => "awaiting-iteration",
            RenderState::AwaitingAsync => "awaiting-async",
            RenderState::Errored => "errored",
            RenderState::Unmounted => "unmounted",
        }
    }
}

impl fmt::Display for RenderState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The suspended body of a component.
pub(crate) enum Body {
    /// Nothing retained (functions, fresh or errored generators).
    Empty,
    Sync(Box<dyn Generator>),
    Async(Box<dyn AsyncGenerator>),
    /// Taken out while a resumption is in progress.
    Running,
    /// Generator returned; the instance is frozen.
    Returned,
}

impl Body {
    pub(crate) fn is_suspended_generator(&self) -> bool {
        matches!(self, Body::Sync(_) | Body::Async(_))
    }
}

/// Who asked for an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// A parent reconciliation; the parent owns failure handling.
    Parent,
    /// `Context::refresh`; failures walk the ancestors.
    Refresh,
    /// Started by the engine itself (error delivery).
    Detached,
}

/// One logical render of an instance.
pub(crate) struct Execution {
    pub origin: Origin,
    /// First list sequence produced for this execution.
    pub first_seq: Option<u64>,
    pub waiters: Vec<oneshot::Sender<RenderResult<()>>>,
}

impl Execution {
    pub(crate) fn new(origin: Origin) -> Self {
        Self {
            origin,
            first_seq: None,
            waiters: Vec::new(),
        }
    }

    /// Resolve every waiter with `result`.
    pub(crate) fn resolve(
        self,
        result: RenderResult<()>,
    ) {
        for waiter in self.waiters {
            let _ = waiter.send(result.clone());
        }
    }

    /// Fold a later request into this one.
    pub(crate) fn absorb(
        &mut self,
        origin: Origin,
        waiter: oneshot::Sender<RenderResult<()>>,
    ) {
        if origin == Origin::Parent {
            self.origin = Origin::Parent;
        }
        self.waiters.push(waiter);
    }
}

/// Per-mount state of a component.
pub(crate) struct Instance {
    pub component: Component,
    pub ctx: Context,
    pub props: Props,
    /// Props handed to the queued render, applied when it starts.
    pub pending_props: Option<Props>,
    pub body: Body,
    pub state: RenderState,
    /// The render in flight, if any.
    pub active: Option<Execution>,
    /// At most one coalesced follow-up render.
    pub queued: Option<Execution>,
    /// Failure that arrived while the body was running.
    pub deferred_throw: Option<RenderError>,
    /// Body resumptions since the last execution began.
    pub resumptions: usize,
    /// Error the last execution ended with.
    pub failure: Option<RenderError>,
}

impl Instance {
    pub(crate) fn new(
        component: Component,
        ctx: Context,
        props: Props,
    ) -> Self {
        Self {
            component,
            ctx,
            props,
            pending_props: None,
            body: Body::Empty,
            state: RenderState::Idle,
            active: None,
            queued: None,
            deferred_throw: None,
            resumptions: 0,
            failure: None,
        }
    }

    /// A returned generator never runs again.
    #[inline]
    pub(crate) fn is_frozen(&self) -> bool {
        matches!(self.body, Body::Returned)
    }

    /// Whether a child failure can be raised inside the body right now.
    pub(crate) fn can_catch(&self) -> bool {
        self.state == RenderState::AwaitingIteration
            && self.body.is_suspended_generator()
            && self.ctx.has_handler()
    }
}

pub(crate) enum NodeKind {
    /// Mount target.
    Root,
    Empty,
    Text {
        text: String,
        committed: Option<String>,
    },
    Host {
        tag: Cow<'static, str>,
        props: Props,
        committed: Props,
    },
    Fragment,
    Component(Box<Instance>),
}

pub(crate) struct PendingList {
    pub seq: u64,
    pub interim: bool,
    /// Commit count of the owner when the list was produced.
    pub epoch: u64,
    pub nodes: Vec<NodeRef>,
    /// Settlement of this list, for owners that report to a parent list.
    pub notify: Option<oneshot::Sender<RenderResult<()>>>,
}

impl PendingList {
    pub(crate) fn settle(
        &mut self,
        result: RenderResult<()>,
    ) {
        if let Some(tx) = self.notify.take() {
            let _ = tx.send(result);
        }
    }
}

pub(crate) struct ChildLists {
    pub current: Vec<NodeRef>,
    pub committed: Vec<NodeRef>,
    pub pending: Vec<PendingList>,
    pub next_seq: u64,
    pub committed_seq: u64,
    pub commits: u64,
}

impl Default for ChildLists {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            committed: Vec::new(),
            pending: Vec::new(),
            next_seq: 1,
            committed_seq: 0,
            commits: 0,
        }
    }
}

impl ChildLists {
    /// Reserve the next list sequence number.
    pub(crate) fn reserve(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Ids of every node still referenced by some list.
    pub(crate) fn live_ids(&self) -> HashSet<InstanceId> {
        let mut ids = HashSet::new();
        for node in self
            .current
            .iter()
            .chain(self.committed.iter())
            .chain(self.pending.iter().flat_map(|list| list.nodes.iter()))
        {
            ids.insert(node.borrow().id);
        }
        ids
    }

    /// Stop offering node `id` for reuse.
    ///
    /// Returns whether the node is still on screen, in which case the next
    /// commit releases it.
    pub(crate) fn forget(
        &mut self,
        id: InstanceId,
    ) -> bool {
        self.current.retain(|node| node.borrow().id != id);
        for list in &mut self.pending {
            list.nodes.retain(|node| node.borrow().id != id);
        }
        self.committed.iter().any(|node| node.borrow().id == id)
    }

    /// Every node referenced by any list, each once.
    pub(crate) fn all_nodes(&self) -> Vec<NodeRef> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for node in self
            .current
            .iter()
            .chain(self.committed.iter())
            .chain(self.pending.iter().flat_map(|list| list.nodes.iter()))
        {
            if seen.insert(node.borrow().id) {
                nodes.push(node.clone());
            }
        }
        nodes
    }
}

/// A retained node.
pub(crate) struct Node {
    pub id: InstanceId,
    pub key: Option<Key>,
    pub host: Option<HostId>,
    pub parent: WeakNode,
    pub kind: NodeKind,
    pub lists: ChildLists,
    /// Host children last sent in an `Arrange` for this anchor.
    pub arranged: Vec<HostId>,
    pub unmounted: bool,
}

impl Node {
    pub(crate) fn new(
        id: InstanceId,
        key: Option<Key>,
        parent: WeakNode,
        kind: NodeKind,
    ) -> Self {
        Self {
            id,
            key,
            host: None,
            parent,
            kind,
            lists: ChildLists::default(),
            arranged: Vec::new(),
            unmounted: false,
        }
    }

    /// Whether `child` can be rendered into this node without remounting.
    pub(crate) fn accepts(
        &self,
        child: &Child,
    ) -> bool {
        match (&self.kind, child) {
            (NodeKind::Empty, Child::Empty) => true,
            (NodeKind::Text { .. }, Child::Text(_)) => true,
            (NodeKind::Fragment, Child::Fragment(_)) => true,
            (_, Child::Element(el)) => match (&self.kind, el.tag()) {
                (NodeKind::Fragment, Tag::Fragment) => true,
                (NodeKind::Host { tag, .. }, Tag::Host(name)) => tag == name,
                (NodeKind::Component(inst), Tag::Component(c)) => inst.component.same(c),
                _ => false,
            },
            _ => false,
        }
    }

    #[inline]
    pub(crate) fn instance(&self) -> Option<&Instance> {
        match &self.kind {
            NodeKind::Component(inst) => Some(inst),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn instance_mut(&mut self) -> Option<&mut Instance> {
        match &mut self.kind {
            NodeKind::Component(inst) => Some(inst),
            _ => None,
        }
    }

    /// Host and root nodes anchor the arrangement of their descendants.
    #[inline]
    pub(crate) fn is_anchor(&self) -> bool {
        matches!(self.kind, NodeKind::Root | NodeKind::Host { .. })
    }

    /// Name for logs.
    pub(crate) fn label(&self) -> String {
        match &self.kind {
            NodeKind::Root => format!("root {}", self.id),
            NodeKind::Empty => format!("empty {}", self.id),
            NodeKind::Text { .. } => format!("text {}", self.id),
            NodeKind::Host { tag, .. } => format!("<{}> {}", tag, self.id),
            NodeKind::Fragment => format!("fragment {}", self.id),
            NodeKind::Component(inst) => format!("<{}> {}", inst.component.name(), self.id),
        }
    }
}

/// Host ids of the committed output under `node`, in document order.
pub(crate) fn host_children(node: &NodeRef) -> Vec<HostId> {
    let mut out = Vec::new();
    let committed = node.borrow().lists.committed.clone();
    for child in committed {
        collect_hosts(&child, &mut out);
    }
    out
}

fn collect_hosts(
    node: &NodeRef,
    out: &mut Vec<HostId>,
) {
    let n = node.borrow();
    if let Some(host) = n.host {
        out.push(host);
        return;
    }
    let committed = n.lists.committed.clone();
    drop(n);
    for child in committed {
        collect_hosts(&child, out);
    }
}

/// Nearest ancestor that arranges host children (a host element or the root).
pub(crate) fn host_anchor(node: &NodeRef) -> Option<NodeRef> {
    let mut cursor = node.borrow().parent.upgrade();
    while let Some(current) = cursor {
        if current.borrow().is_anchor() {
            return Some(current);
        }
        cursor = current.borrow().parent.upgrade();
    }
    None
}

/// Rebuild the committed tree under `node` as an element tree.
pub(crate) fn snapshot(node: &NodeRef) -> Child {
    let n = node.borrow();
    match &n.kind {
        NodeKind::Empty => Child::Empty,
        NodeKind::Text { committed, .. } => committed.clone().map(Child::Text).unwrap_or_default(),
        NodeKind::Host { tag, committed, .. } => {
            let mut el = Element::host(tag.clone());
            for (name, value) in committed.iter() {
                el = el.prop(name, value.clone());
            }
            Child::Element(el.children(snapshot_children(&n.lists.committed)))
        }
        NodeKind::Root | NodeKind::Fragment | NodeKind::Component(_) => {
            let mut list = snapshot_children(&n.lists.committed);
            match list.len() {
                0 => Child::Empty,
                1 => list.remove(0),
                _ => Child::Fragment(list),
            }
        }
    }
}

fn snapshot_children(nodes: &[NodeRef]) -> Vec<Child> {
    nodes
        .iter()
        .map(snapshot)
        .filter(|child| *child != Child::Empty)
        .collect()
}

#[cfg(test)]
mod tests;
