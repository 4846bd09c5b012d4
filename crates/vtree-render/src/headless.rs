#![forbid(unsafe_code)]

//! In-memory live tree.
//!
//! [`HeadlessDom`] implements [`Host`] over an arena of nodes. It backs the
//! test suite and server-side rendering, and exposes inspection helpers:
//! markup serialization, operation counters, bubbling event dispatch, and
//! [`HeadlessDom::mirrors`] to check a live subtree against a virtual one.
//!
//! # Scope
//!
//! This is NOT a browser DOM. It models only what the reconciler touches:
//! - text and element nodes, plus fragments for batched inserts
//! - attributes (plain and namespaced), styles, and properties
//! - one listener per event name per node, with bubbling dispatch
//!
//! Nodes are never freed; detached nodes stay in the arena.
//!
//! # Usage
//!
//! ```
//! use vtree_render::events::{Dispatcher, EventNode};
//! use vtree_render::apply::render;
//! use vtree_render::facts::Facts;
//! use vtree_render::headless::HeadlessDom;
//! use vtree_render::node::VNode;
//!
//! let mut dom = HeadlessDom::new();
//! let tree = VNode::element("p", Facts::default(), vec![VNode::text("hi")]);
//! let root = render(&mut dom, &tree, &EventNode::root(Dispatcher::ignore()));
//! assert_eq!(dom.to_markup(root), "<p>hi</p>");
//! assert!(dom.mirrors(root, &tree));
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::Rc;

use serde_json::Value;
use vtree_core::handler::EventFlags;

use crate::events::{EventNode, Listener};
use crate::facts::Facts;
use crate::host::{Host, NodeId, NodeShape};
use crate::node::{NodeKind, VNode};

/// Operation counters, reset with [`HeadlessDom::reset_stats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HostStats {
    /// Text and element nodes created.
    pub created: usize,
    /// Children attached (append or insert), fragments counted per child.
    pub attached: usize,
    pub removed: usize,
    pub replaced: usize,
    pub text_updates: usize,
    /// Style, attribute, and property writes.
    pub fact_writes: usize,
    pub listeners_added: usize,
    pub listeners_removed: usize,
}

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    namespace: Option<String>,
    attributes: BTreeMap<String, String>,
    attributes_ns: BTreeMap<(String, String), String>,
    styles: BTreeMap<String, String>,
    properties: BTreeMap<String, Value>,
}

#[derive(Debug)]
enum NodeData {
    Text(String),
    Element(ElementData),
    Fragment,
}

struct BoundListener {
    listener: Rc<Listener>,
    passive: bool,
}

struct LiveNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: BTreeMap<String, BoundListener>,
    event_root: Option<Rc<EventNode>>,
}

impl LiveNode {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            children: Vec::new(),
            listeners: BTreeMap::new(),
            event_root: None,
        }
    }
}

/// Arena-backed live tree.
#[derive(Default)]
pub struct HeadlessDom {
    nodes: Vec<LiveNode>,
    stats: HostStats,
}

impl HeadlessDom {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mount point: an element attached under a fresh `body`, so
    /// that mounting can replace it in its parent.
    pub fn create_mount(&mut self, tag: &str) -> NodeId {
        let body = self.alloc(NodeData::Element(ElementData {
            tag: "body".into(),
            ..ElementData::default()
        }));
        let mount = self.alloc(NodeData::Element(ElementData {
            tag: tag.into(),
            ..ElementData::default()
        }));
        self.attach(body, mount, None);
        mount
    }

    #[must_use]
    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = HostStats::default();
    }

    /// Number of nodes ever allocated, attached or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map_or(&[], |n| n.children.as_slice())
    }

    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.get(node)?.data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attributes.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn style(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.styles.get(name).map(String::as_str)
    }

    /// Whether the listener for `event` was registered passive.
    #[must_use]
    pub fn is_passive(&self, node: NodeId, event: &str) -> Option<bool> {
        self.get(node)?.listeners.get(event).map(|bound| bound.passive)
    }

    /// Dispatch `event` at `target` and bubble it to the root, stopping when
    /// a listener requests it. Returns the union of requested flags.
    pub fn fire(&self, target: NodeId, event: &str, payload: &Value) -> EventFlags {
        let mut flags = EventFlags::empty();
        let mut current = Some(target);
        while let Some(node) = current {
            let Some(live) = self.get(node) else {
                break;
            };
            if let Some(bound) = live.listeners.get(event) {
                let listener = Rc::clone(&bound.listener);
                flags |= listener.handle(payload);
                if flags.contains(EventFlags::STOP_PROPAGATION) {
                    break;
                }
            }
            current = live.parent;
        }
        flags
    }

    /// Serialize a subtree. Attributes come out sorted by name, styles as a
    /// single `style` attribute.
    #[must_use]
    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        let Some(live) = self.get(node) else {
            return;
        };
        match &live.data {
            NodeData::Text(text) => out.push_str(&escape(text)),
            NodeData::Fragment => {
                for &child in &live.children {
                    self.write_markup(child, out);
                }
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attributes {
                    let _ = write!(out, " {name}=\"{}\"", escape(value));
                }
                for ((namespace, name), value) in &el.attributes_ns {
                    let _ = write!(out, " {name}=\"{}\" data-ns-{name}=\"{namespace}\"", escape(value));
                }
                if !el.styles.is_empty() {
                    let css: Vec<String> = el
                        .styles
                        .iter()
                        .map(|(name, value)| format!("{name}: {value};"))
                        .collect();
                    let _ = write!(out, " style=\"{}\"", escape(&css.join(" ")));
                }
                out.push('>');
                for &child in &live.children {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{}>", el.tag);
            }
        }
    }

    /// Whether the live subtree at `node` renders `vnode`: same text, tags,
    /// facts, listener names, and children. Custom nodes match any live node.
    #[must_use]
    pub fn mirrors(&self, node: NodeId, vnode: &VNode) -> bool {
        let Some(live) = self.get(node) else {
            return false;
        };
        match vnode.kind() {
            NodeKind::Text(text) => matches!(&live.data, NodeData::Text(t) if t == text),
            NodeKind::Lazy(lazy) => self.mirrors(node, lazy.force()),
            NodeKind::Tagged(tagged) => self.mirrors(node, tagged.inner()),
            NodeKind::Custom(_) => true,
            NodeKind::Element(el) => {
                self.element_matches(live, el.tag(), el.namespace(), el.facts())
                    && live.children.len() == el.children().len()
                    && live
                        .children
                        .iter()
                        .zip(el.children())
                        .all(|(&child, kid)| self.mirrors(child, kid))
            }
            NodeKind::Keyed(el) => {
                self.element_matches(live, el.tag(), el.namespace(), el.facts())
                    && live.children.len() == el.children().len()
                    && live
                        .children
                        .iter()
                        .zip(el.children())
                        .all(|(&child, (_, kid))| self.mirrors(child, kid))
            }
        }
    }

    fn element_matches(&self, live: &LiveNode, tag: &str, namespace: Option<&str>, facts: &Facts) -> bool {
        let NodeData::Element(el) = &live.data else {
            return false;
        };
        if el.tag != tag || el.namespace.as_deref() != namespace {
            return false;
        }
        if el.attributes != *facts.attributes() || el.styles != *facts.styles() {
            return false;
        }
        let ns_match = el.attributes_ns.len() == facts.attributes_ns().len()
            && facts.attributes_ns().iter().all(|(name, ns)| {
                ns.value.as_ref().is_some_and(|value| {
                    el.attributes_ns.get(&(ns.namespace.clone(), name.clone())) == Some(value)
                })
            });
        if !ns_match {
            return false;
        }
        let props_match = facts
            .properties()
            .iter()
            .all(|(name, value)| el.properties.get(name) == Some(value))
            && el.properties.iter().all(|(name, value)| {
                facts.properties().contains_key(name) || is_cleared(value)
            });
        if !props_match {
            return false;
        }
        live.listeners.len() == facts.events().len()
            && facts.events().keys().all(|name| live.listeners.contains_key(name))
    }

    // ---- Arena plumbing ----

    fn get(&self, node: NodeId) -> Option<&LiveNode> {
        self.nodes.get(node.raw() as usize)
    }

    fn get_mut(&mut self, node: NodeId) -> Option<&mut LiveNode> {
        self.nodes.get_mut(node.raw() as usize)
    }

    fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.get(node)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match &mut self.get_mut(node)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(LiveNode::new(data));
        id
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.get(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = None;
        }
    }

    /// Attach `child` under `parent` before `reference`. Fragments move
    /// their children instead.
    fn attach(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let is_fragment = matches!(self.get(child).map(|n| &n.data), Some(NodeData::Fragment));
        let moving: Vec<NodeId> = if is_fragment {
            self.get_mut(child)
                .map(|n| std::mem::take(&mut n.children))
                .unwrap_or_default()
        } else {
            self.detach(child);
            vec![child]
        };

        for node in moving {
            if let Some(n) = self.get_mut(node) {
                n.parent = Some(parent);
            }
            let Some(p) = self.get_mut(parent) else {
                return;
            };
            let at = reference
                .and_then(|r| p.children.iter().position(|&c| c == r))
                .unwrap_or(p.children.len());
            p.children.insert(at, node);
            self.stats.attached += 1;
        }
    }
}

/// Property values a removal leaves behind.
fn is_cleared(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

impl Host for HeadlessDom {
    fn create_text(&mut self, text: &str) -> NodeId {
        self.stats.created += 1;
        self.alloc(NodeData::Text(text.to_owned()))
    }

    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> NodeId {
        self.stats.created += 1;
        self.alloc(NodeData::Element(ElementData {
            tag: tag.to_owned(),
            namespace: namespace.map(str::to_owned),
            ..ElementData::default()
        }))
    }

    fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeData::Fragment)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node)?.parent
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.get(parent)?.children.get(index).copied()
    }

    fn child_count(&self, parent: NodeId) -> usize {
        self.children(parent).len()
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.attach(parent, child, None);
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.attach(parent, child, reference);
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if self.parent(child) == Some(parent) {
            self.detach(child);
            self.stats.removed += 1;
        }
    }

    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) {
        if self.parent(old_child) != Some(parent) {
            return;
        }
        self.detach(new_child);
        if let Some(p) = self.get_mut(parent) {
            if let Some(slot) = p.children.iter_mut().find(|c| **c == old_child) {
                *slot = new_child;
            }
        }
        if let Some(n) = self.get_mut(new_child) {
            n.parent = Some(parent);
        }
        if let Some(o) = self.get_mut(old_child) {
            o.parent = None;
        }
        self.stats.replaced += 1;
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(NodeData::Text(current)) = self.get_mut(node).map(|n| &mut n.data) {
            text.clone_into(current);
            self.stats.text_updates += 1;
        }
    }

    fn set_style(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(node) else {
            return;
        };
        if value.is_empty() {
            el.styles.remove(name);
        } else {
            el.styles.insert(name.to_owned(), value.to_owned());
        }
        self.stats.fact_writes += 1;
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attributes.insert(name.to_owned(), value.to_owned());
            self.stats.fact_writes += 1;
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attributes.remove(name);
            self.stats.fact_writes += 1;
        }
    }

    fn set_attribute_ns(&mut self, node: NodeId, namespace: &str, name: &str, value: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attributes_ns
                .insert((namespace.to_owned(), name.to_owned()), value.to_owned());
            self.stats.fact_writes += 1;
        }
    }

    fn remove_attribute_ns(&mut self, node: NodeId, namespace: &str, name: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attributes_ns
                .remove(&(namespace.to_owned(), name.to_owned()));
            self.stats.fact_writes += 1;
        }
    }

    fn set_property(&mut self, node: NodeId, name: &str, value: &Value) {
        if let Some(el) = self.element_mut(node) {
            el.properties.insert(name.to_owned(), value.clone());
            self.stats.fact_writes += 1;
        }
    }

    fn property(&self, node: NodeId, name: &str) -> Option<Value> {
        self.element(node)?.properties.get(name).cloned()
    }

    fn listener(&self, node: NodeId, event: &str) -> Option<Rc<Listener>> {
        self.get(node)?
            .listeners
            .get(event)
            .map(|bound| Rc::clone(&bound.listener))
    }

    fn add_listener(&mut self, node: NodeId, event: &str, listener: Rc<Listener>, passive: bool) {
        if let Some(n) = self.get_mut(node) {
            n.listeners
                .insert(event.to_owned(), BoundListener { listener, passive });
            self.stats.listeners_added += 1;
        }
    }

    fn remove_listener(&mut self, node: NodeId, event: &str) {
        if let Some(n) = self.get_mut(node) {
            if n.listeners.remove(event).is_some() {
                self.stats.listeners_removed += 1;
            }
        }
    }

    fn event_root(&self, node: NodeId) -> Option<Rc<EventNode>> {
        self.get(node)?.event_root.clone()
    }

    fn set_event_root(&mut self, node: NodeId, root: Option<Rc<EventNode>>) {
        if let Some(n) = self.get_mut(node) {
            n.event_root = root;
        }
    }

    fn shape(&self, node: NodeId) -> NodeShape {
        match self.get(node).map(|n| &n.data) {
            Some(NodeData::Text(text)) => NodeShape::Text(text.clone()),
            Some(NodeData::Element(el)) => NodeShape::Element {
                tag: el.tag.clone(),
                namespace: el.namespace.clone(),
                attributes: el
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            },
            Some(NodeData::Fragment) | None => NodeShape::Other,
        }
    }
}
