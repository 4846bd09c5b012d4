#![forbid(unsafe_code)]

//! The live-tree interface the reconciler drives.
//!
//! The engine never owns live nodes. It talks to a [`Host`] through opaque
//! [`NodeId`] handles: create nodes, attach and detach them, write facts, and
//! bind listeners. A browser binding implements this over DOM nodes; the
//! crate ships [`HeadlessDom`](crate::headless::HeadlessDom) for tests and
//! server-side rendering.
//!
//! # Contract
//!
//! - `append_child` and `insert_before` detach the child from any previous
//!   parent first. Inserting a fragment moves its children and leaves the
//!   fragment empty.
//! - `child_at` and `child_count` see only children currently attached.
//! - Event roots are opaque to the host. It stores one per node and hands it
//!   back unchanged.

use std::rc::Rc;

use serde_json::Value;

use crate::events::{EventNode, Listener};

/// Opaque handle to a live node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// What a live node looks like, as far as hydration cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeShape {
    Text(String),
    Element {
        tag: String,
        namespace: Option<String>,
        attributes: Vec<(String, String)>,
    },
    /// Comments, fragments, and anything else with no virtual counterpart.
    Other,
}

/// Operations the reconciler needs from a live tree.
pub trait Host {
    // ---- Creation ----

    fn create_text(&mut self, text: &str) -> NodeId;
    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> NodeId;
    /// A detached container whose children move out when it is inserted.
    fn create_fragment(&mut self) -> NodeId;

    // ---- Structure ----

    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId>;
    fn child_count(&self, parent: NodeId) -> usize;
    fn append_child(&mut self, parent: NodeId, child: NodeId);
    /// Insert before `reference`, or append when `reference` is `None`.
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>);
    fn remove_child(&mut self, parent: NodeId, child: NodeId);
    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId);

    // ---- Content and facts ----

    fn set_text(&mut self, node: NodeId, text: &str);
    /// An empty value clears the style.
    fn set_style(&mut self, node: NodeId, name: &str, value: &str);
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeId, name: &str);
    fn set_attribute_ns(&mut self, node: NodeId, namespace: &str, name: &str, value: &str);
    fn remove_attribute_ns(&mut self, node: NodeId, namespace: &str, name: &str);
    fn set_property(&mut self, node: NodeId, name: &str, value: &Value);
    /// Current live value of a property, for properties users can edit.
    fn property(&self, node: NodeId, name: &str) -> Option<Value>;

    // ---- Events ----

    fn listener(&self, node: NodeId, event: &str) -> Option<Rc<Listener>>;
    fn add_listener(&mut self, node: NodeId, event: &str, listener: Rc<Listener>, passive: bool);
    fn remove_listener(&mut self, node: NodeId, event: &str);
    fn event_root(&self, node: NodeId) -> Option<Rc<EventNode>>;
    fn set_event_root(&mut self, node: NodeId, root: Option<Rc<EventNode>>);

    // ---- Hydration ----

    fn shape(&self, node: NodeId) -> NodeShape;
}
