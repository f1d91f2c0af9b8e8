//! In-memory host
//!
//! A reference output renderer that keeps host nodes in a map and serializes
//! them to HTML-like strings. Clones share the same document, so a caller can
//! hand one clone to a [`Renderer`](crate::Renderer) and inspect another.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;

use super::{Host, HostEffect, HostId};
use crate::runtime::element::{Props, Value};

#[derive(Debug, Clone)]
enum HostNode {
    Root { children: Vec<HostId> },
    Element { tag: String, props: Props, children: Vec<HostId> },
    Text(String),
}

#[derive(Debug, Default)]
struct Document {
    nodes: HashMap<HostId, HostNode>,
    log: Vec<HostEffect>,
    watched: HashMap<HostId, Vec<String>>,
}

impl Document {
    fn write_node(
        &self,
        id: HostId,
        out: &mut String,
    ) {
        match self.nodes.get(&id) {
            Some(HostNode::Text(text)) => out.push_str(text),
            Some(HostNode::Element { tag, props, children }) => {
                let _ = write!(out, "<{}", tag);
                for (name, value) in props.iter() {
                    match value {
                        Value::Null | Value::Bool(false) => {}
                        Value::Bool(true) => {
                            let _ = write!(out, " {}", name);
                        }
                        value => {
                            let _ = write!(out, " {}=\"{}\"", name, value);
                        }
                    }
                }
                out.push('>');
                for child in children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{}>", tag);
            }
            Some(HostNode::Root { children }) => {
                for child in children {
                    self.write_node(*child, out);
                }
            }
            None => {}
        }
    }

    fn html(
        &self,
        id: HostId,
    ) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }
}

/// Shared in-memory document.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    doc: Rc<RefCell<Document>>,
}

impl MemoryHost {
    /// Create an empty document.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize the subtree under `id` (a mount target's own tag is omitted).
    pub fn html(
        &self,
        id: HostId,
    ) -> String {
        self.doc.borrow().html(id)
    }

    /// Record the serialized output of `root` after every effect that changes it.
    pub fn watch(
        &self,
        root: HostId,
    ) {
        let mut doc = self.doc.borrow_mut();
        let current = doc.html(root);
        doc.watched.insert(root, vec![current]);
    }

    /// Distinct outputs observed for a watched root, oldest first.
    pub fn history(
        &self,
        root: HostId,
    ) -> Vec<String> {
        self.doc
            .borrow()
            .watched
            .get(&root)
            .cloned()
            .unwrap_or_default()
    }

    /// Every effect applied so far.
    pub fn effects(&self) -> Vec<HostEffect> {
        self.doc.borrow().log.clone()
    }

    /// Number of live host nodes (mount targets included).
    pub fn node_count(&self) -> usize {
        self.doc.borrow().nodes.len()
    }

    /// Overwrite an element's `value` attribute, as user input would.
    pub fn set_value(
        &self,
        id: HostId,
        value: impl Into<Value>,
    ) {
        if let Some(HostNode::Element { props, .. }) = self.doc.borrow_mut().nodes.get_mut(&id) {
            props.set("value", value);
        }
    }
}

impl Host for MemoryHost {
    fn apply(
        &mut self,
        effect: &HostEffect,
    ) {
        let mut doc = self.doc.borrow_mut();
        match effect {
            HostEffect::Root { id } => {
                doc.nodes
                    .insert(*id, HostNode::Root { children: Vec::new() });
            }
            HostEffect::Create { id, tag, props } => {
                doc.nodes.insert(
                    *id,
                    HostNode::Element {
                        tag: tag.clone(),
                        props: props.clone(),
                        children: Vec::new(),
                    },
                );
            }
            HostEffect::CreateText { id, text } => {
                doc.nodes.insert(*id, HostNode::Text(text.clone()));
            }
            HostEffect::SetText { id, text } => {
                if let Some(HostNode::Text(current)) = doc.nodes.get_mut(id) {
                    *current = text.clone();
                }
            }
            HostEffect::Update { id, props: next } => {
                if let Some(HostNode::Element { props, .. }) = doc.nodes.get_mut(id) {
                    *props = next.clone();
                }
            }
            HostEffect::Arrange { parent, children: next } => match doc.nodes.get_mut(parent) {
                Some(HostNode::Root { children }) | Some(HostNode::Element { children, .. }) => {
                    *children = next.clone();
                }
                _ => {}
            },
            HostEffect::Remove { id } => {
                doc.nodes.remove(id);
            }
        }
        doc.log.push(effect.clone());

        let roots: Vec<HostId> = doc.watched.keys().copied().collect();
        for root in roots {
            let html = doc.html(root);
            if let Some(frames) = doc.watched.get_mut(&root) {
                if frames.last() != Some(&html) {
                    frames.push(html);
                }
            }
        }
    }

    fn read(
        &self,
        id: HostId,
    ) -> Option<Value> {
        match self.doc.borrow().nodes.get(&id)? {
            HostNode::Text(text) => Some(Value::Str(text.clone())),
            HostNode::Element { props, .. } => props.get("value").cloned(),
            HostNode::Root { .. } => None,
        }
    }
}
