//! Child reconciliation
//!
//! Matches a freshly produced child list against the node's current list.
//! Keyed children match by key; unkeyed children match the unkeyed node at
//! the same position. A match also needs the same tag, otherwise a new node
//! is created and the old one is left for the commit to unmount.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use tracing::{trace, warn};

use super::{commit, request, Engine, Settle};
use crate::runtime::context::Context;
use crate::runtime::element::{Child, Key, Props, Tag};
use crate::runtime::errors::{EngineError, RenderResult};
use crate::runtime::host::HostEffect;
use crate::runtime::instance::{Instance, InstanceId, Node, NodeKind, NodeRef, Origin};

/// Keys as they will be used for matching.
///
/// A repeated key is fatal for the pass, or downgraded to positional
/// matching when keys are not strict.
fn effective_keys(
    engine: &Engine,
    parent: InstanceId,
    children: &[Child],
) -> RenderResult<Vec<Option<Key>>> {
    let mut seen = HashSet::new();
    children
        .iter()
        .map(|child| match child.key() {
            Some(key) if !seen.insert(key.clone()) => {
                if engine.config.strict_keys {
                    Err(EngineError::DuplicateKey {
                        key: key.clone(),
                        parent,
                    }
                    .into())
                } else {
                    warn!(%key, %parent, "duplicate key, matching by position");
                    Ok(None)
                }
            }
            key => Ok(key.cloned()),
        })
        .collect()
}

/// Reconcile `children` against the current list of `parent`.
pub(super) fn update_children(
    engine: &Rc<Engine>,
    parent: &NodeRef,
    children: Vec<Child>,
) -> RenderResult<(Vec<NodeRef>, Settle)> {
    let (parent_id, old) = {
        let p = parent.borrow();
        (p.id, p.lists.current.clone())
    };
    let keys = effective_keys(engine, parent_id, &children)?;

    let mut keyed: HashMap<Key, NodeRef> = HashMap::new();
    for node in &old {
        if let Some(key) = node.borrow().key.clone() {
            keyed.insert(key, node.clone());
        }
    }

    let mut used = HashSet::new();
    let mut nodes = Vec::with_capacity(children.len());
    let mut settles = Vec::with_capacity(children.len());
    for (index, (child, key)) in children.into_iter().zip(keys).enumerate() {
        let candidate = match &key {
            Some(key) => keyed.remove(key),
            None => old
                .get(index)
                .filter(|node| node.borrow().key.is_none())
                .cloned(),
        };
        let matched = candidate.filter(|node| {
            let n = node.borrow();
            !n.unmounted && !used.contains(&n.id) && n.accepts(&child)
        });
        let (node, settle) = match matched {
            Some(node) => {
                used.insert(node.borrow().id);
                let settle = update_node(engine, &node, child);
                (node, settle)
            }
            None => create_node(engine, parent, child, key),
        };
        nodes.push(node);
        settles.push(settle);
    }
    trace!(parent = %parent_id, count = nodes.len(), "reconciled children");
    Ok((nodes, Settle::all(settles)))
}

/// Render `child` into an existing node that accepts it.
fn update_node(
    engine: &Rc<Engine>,
    node: &NodeRef,
    child: Child,
) -> Settle {
    match child {
        Child::Empty => Settle::Ready(Ok(())),
        Child::Text(text) => {
            if let NodeKind::Text { text: current, .. } = &mut node.borrow_mut().kind {
                *current = text;
            }
            Settle::Ready(Ok(()))
        }
        Child::Fragment(children) => commit::produce(engine, node, children, false),
        Child::Element(el) => {
            let (tag, _, props) = el.into_parts();
            match tag {
                Tag::Fragment => commit::produce(engine, node, props.children().to_vec(), false),
                Tag::Host(_) => {
                    if let NodeKind::Host { props: current, .. } = &mut node.borrow_mut().kind {
                        *current = props.attributes();
                    }
                    commit::produce(engine, node, props.children().to_vec(), false)
                }
                Tag::Component(_) => request(engine, node, Origin::Parent, Some(props)),
            }
        }
    }
}

/// Create a node for `child` under `parent` and render into it.
fn create_node(
    engine: &Rc<Engine>,
    parent: &NodeRef,
    child: Child,
    key: Option<Key>,
) -> (NodeRef, Settle) {
    let id = engine.instance_ids.generate();
    let parent_ref = Rc::downgrade(parent);
    let node = match &child {
        Child::Element(el) => match el.tag() {
            Tag::Component(component) => Rc::new_cyclic(|weak| {
                let ctx = Context::new(id, component.name(), weak.clone(), engine.this.clone());
                let inst = Instance::new(component.clone(), ctx, Props::new());
                RefCell::new(Node::new(
                    id,
                    key,
                    parent_ref,
                    NodeKind::Component(Box::new(inst)),
                ))
            }),
            Tag::Host(tag) => {
                let props = el.props().attributes();
                let host = engine.host_ids.generate();
                engine.emit(HostEffect::Create {
                    id: host,
                    tag: tag.to_string(),
                    props: props.clone(),
                });
                let kind = NodeKind::Host {
                    tag: tag.clone(),
                    props: props.clone(),
                    committed: props,
                };
                let mut node = Node::new(id, key, parent_ref, kind);
                node.host = Some(host);
                Rc::new(RefCell::new(node))
            }
            Tag::Fragment => Rc::new(RefCell::new(Node::new(
                id,
                key,
                parent_ref,
                NodeKind::Fragment,
            ))),
        },
        Child::Text(text) => {
            let host = engine.host_ids.generate();
            engine.emit(HostEffect::CreateText {
                id: host,
                text: text.clone(),
            });
            let kind = NodeKind::Text {
                text: text.clone(),
                committed: Some(text.clone()),
            };
            let mut node = Node::new(id, key, parent_ref, kind);
            node.host = Some(host);
            Rc::new(RefCell::new(node))
        }
        Child::Fragment(_) => Rc::new(RefCell::new(Node::new(
            id,
            key,
            parent_ref,
            NodeKind::Fragment,
        ))),
        Child::Empty => Rc::new(RefCell::new(Node::new(id, key, parent_ref, NodeKind::Empty))),
    };
    trace!(node = %node.borrow().label(), "created");
    let settle = update_node(engine, &node, child);
    (node, settle)
}
