#![forbid(unsafe_code)]

//! Virtual node model.
//!
//! A [`VNode`] is a cheap reference-counted handle to an immutable node.
//! Cloning shares the node, and [`VNode::ptr_eq`] is the identity check the
//! differ uses to skip unchanged subtrees.
//!
//! # Invariants
//!
//! 1. `descendants` of an element is the sum over its children of
//!    `1 + child.descendants`. A tagging node counts as one extra level on
//!    top of its inner node. Text, custom, and lazy nodes have zero.
//! 2. A lazy node is an index boundary: patches for its contents are
//!    numbered from zero inside an
//!    [`EnterSubtree`](crate::patch::PatchKind::EnterSubtree).
//! 3. A lazy node evaluates its thunk at most once.

use std::any::Any;
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use vtree_core::message::Tagger;

use crate::facts::Facts;
use crate::host::{Host, NodeId};

/// Handle to an immutable virtual node.
#[derive(Clone)]
pub struct VNode(Rc<NodeKind>);

/// The six node variants.
pub enum NodeKind {
    Text(String),
    Element(Element),
    Keyed(KeyedElement),
    Custom(Custom),
    Tagged(Tagged),
    Lazy(Lazy),
}

impl VNode {
    fn wrap(kind: NodeKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::wrap(NodeKind::Text(content.into()))
    }

    pub fn element(tag: impl Into<String>, facts: Facts, children: Vec<VNode>) -> Self {
        Self::wrap(NodeKind::Element(Element::new(tag.into(), None, facts, children)))
    }

    pub fn element_ns(
        namespace: impl Into<String>,
        tag: impl Into<String>,
        facts: Facts,
        children: Vec<VNode>,
    ) -> Self {
        Self::wrap(NodeKind::Element(Element::new(
            tag.into(),
            Some(namespace.into()),
            facts,
            children,
        )))
    }

    /// Element whose children are matched across renders by key.
    pub fn keyed(tag: impl Into<String>, facts: Facts, children: Vec<(String, VNode)>) -> Self {
        Self::wrap(NodeKind::Keyed(KeyedElement::new(tag.into(), None, facts, children)))
    }

    pub fn keyed_ns(
        namespace: impl Into<String>,
        tag: impl Into<String>,
        facts: Facts,
        children: Vec<(String, VNode)>,
    ) -> Self {
        Self::wrap(NodeKind::Keyed(KeyedElement::new(
            tag.into(),
            Some(namespace.into()),
            facts,
            children,
        )))
    }

    pub fn custom(facts: Facts, widget: impl Widget) -> Self {
        Self::wrap(NodeKind::Custom(Custom {
            facts,
            widget: Rc::new(widget),
        }))
    }

    /// Wrap `inner` so its messages pass through `tagger`.
    pub fn tagged(tagger: Tagger, inner: VNode) -> Self {
        let descendants = 1 + inner.descendants();
        Self::wrap(NodeKind::Tagged(Tagged {
            tagger,
            inner,
            descendants,
        }))
    }

    /// Deferred subtree, rebuilt only when some token in `refs` changes.
    pub fn lazy(refs: Vec<Token>, thunk: impl Fn() -> VNode + 'static) -> Self {
        Self::wrap(NodeKind::Lazy(Lazy {
            refs,
            thunk: Rc::new(thunk),
            cached: OnceCell::new(),
        }))
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.0
    }

    /// Number of index slots below this node.
    #[must_use]
    pub fn descendants(&self) -> usize {
        match self.kind() {
            NodeKind::Element(el) => el.descendants,
            NodeKind::Keyed(el) => el.descendants,
            NodeKind::Tagged(tagged) => tagged.descendants,
            NodeKind::Text(_) | NodeKind::Custom(_) | NodeKind::Lazy(_) => 0,
        }
    }

    /// Number of children of an element, zero for everything else.
    #[must_use]
    pub fn child_count(&self) -> usize {
        match self.kind() {
            NodeKind::Element(el) => el.children.len(),
            NodeKind::Keyed(el) => el.children.len(),
            _ => 0,
        }
    }

    /// Child `index` of an element, keyed or not.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&VNode> {
        match self.kind() {
            NodeKind::Element(el) => el.children.get(index),
            NodeKind::Keyed(el) => el.children.get(index).map(|(_, node)| node),
            _ => None,
        }
    }

    /// Same allocation.
    #[inline]
    #[must_use]
    pub fn ptr_eq(a: &VNode, b: &VNode) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Structurally equal copy sharing no node allocations.
    ///
    /// Taggers, widgets, lazy thunks, and decoders are shared, so diffing a
    /// tree against its deep copy yields no patches.
    #[must_use]
    pub fn deep_clone(&self) -> VNode {
        match self.kind() {
            NodeKind::Text(text) => VNode::text(text.clone()),
            NodeKind::Element(el) => VNode::wrap(NodeKind::Element(Element::new(
                el.tag.clone(),
                el.namespace.clone(),
                el.facts.clone(),
                el.children.iter().map(VNode::deep_clone).collect(),
            ))),
            NodeKind::Keyed(el) => VNode::wrap(NodeKind::Keyed(KeyedElement::new(
                el.tag.clone(),
                el.namespace.clone(),
                el.facts.clone(),
                el.children
                    .iter()
                    .map(|(key, node)| (key.clone(), node.deep_clone()))
                    .collect(),
            ))),
            NodeKind::Custom(custom) => VNode::wrap(NodeKind::Custom(Custom {
                facts: custom.facts.clone(),
                widget: Rc::clone(&custom.widget),
            })),
            NodeKind::Tagged(tagged) => VNode::tagged(tagged.tagger.clone(), tagged.inner.deep_clone()),
            NodeKind::Lazy(lazy) => VNode::wrap(NodeKind::Lazy(Lazy {
                refs: lazy.refs.clone(),
                thunk: Rc::clone(&lazy.thunk),
                cached: OnceCell::new(),
            })),
        }
    }
}

fn sum_descendants<'a>(children: impl Iterator<Item = &'a VNode>) -> usize {
    children.map(|child| 1 + child.descendants()).sum()
}

/// A tagged element with positional children.
pub struct Element {
    tag: String,
    namespace: Option<String>,
    facts: Facts,
    children: Vec<VNode>,
    descendants: usize,
}

impl Element {
    fn new(tag: String, namespace: Option<String>, facts: Facts, children: Vec<VNode>) -> Self {
        let descendants = sum_descendants(children.iter());
        Self {
            tag,
            namespace,
            facts,
            children,
            descendants,
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    #[must_use]
    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    #[must_use]
    pub fn descendants(&self) -> usize {
        self.descendants
    }
}

/// A tagged element whose children carry string keys.
pub struct KeyedElement {
    tag: String,
    namespace: Option<String>,
    facts: Facts,
    children: Vec<(String, VNode)>,
    descendants: usize,
}

impl KeyedElement {
    fn new(tag: String, namespace: Option<String>, facts: Facts, children: Vec<(String, VNode)>) -> Self {
        let descendants = sum_descendants(children.iter().map(|(_, node)| node));
        Self {
            tag,
            namespace,
            facts,
            children,
            descendants,
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    #[must_use]
    pub fn children(&self) -> &[(String, VNode)] {
        &self.children
    }

    #[must_use]
    pub fn descendants(&self) -> usize {
        self.descendants
    }

    /// The same element with keys dropped, for diffing against a
    /// positional element.
    #[must_use]
    pub fn dekey(&self) -> Element {
        Element {
            tag: self.tag.clone(),
            namespace: self.namespace.clone(),
            facts: self.facts.clone(),
            children: self.children.iter().map(|(_, node)| node.clone()).collect(),
            descendants: self.descendants,
        }
    }
}

/// Externally rendered leaf.
///
/// The engine treats the rendered node as opaque: it applies facts to it and
/// otherwise leaves its contents to the widget.
pub trait Widget: 'static {
    /// Build the live node.
    fn render(&self, host: &mut dyn Host) -> NodeId;

    /// Compare against the widget previously in this position, which is
    /// guaranteed to be of the same concrete type. `None` means no change.
    fn diff(&self, previous: &dyn Widget) -> Option<WidgetPatch>;

    fn as_any(&self) -> &dyn Any;
}

type WidgetPatchFn = dyn Fn(&mut dyn Host, NodeId) -> NodeId;

/// Widget-defined update of its own live node.
///
/// Returns the node that should now stand in that position. Returning a
/// different node replaces the old one in its parent.
#[derive(Clone)]
pub struct WidgetPatch(Rc<WidgetPatchFn>);

impl WidgetPatch {
    pub fn new(apply: impl Fn(&mut dyn Host, NodeId) -> NodeId + 'static) -> Self {
        Self(Rc::new(apply))
    }

    pub fn apply(&self, host: &mut dyn Host, node: NodeId) -> NodeId {
        (self.0)(host, node)
    }
}

impl fmt::Debug for WidgetPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WidgetPatch(..)")
    }
}

/// Leaf backed by a [`Widget`].
pub struct Custom {
    facts: Facts,
    widget: Rc<dyn Widget>,
}

impl Custom {
    #[must_use]
    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    #[must_use]
    pub fn widget(&self) -> &dyn Widget {
        &*self.widget
    }

    /// Both widgets are the same concrete type.
    #[must_use]
    pub fn same_renderer(&self, other: &Custom) -> bool {
        Any::type_id(self.widget.as_any()) == Any::type_id(other.widget.as_any())
    }
}

/// Subtree whose messages pass through a tagger.
pub struct Tagged {
    tagger: Tagger,
    inner: VNode,
    descendants: usize,
}

impl Tagged {
    #[must_use]
    pub fn tagger(&self) -> &Tagger {
        &self.tagger
    }

    #[must_use]
    pub fn inner(&self) -> &VNode {
        &self.inner
    }
}

/// Deferred subtree with its memoization inputs.
pub struct Lazy {
    refs: Vec<Token>,
    thunk: Rc<dyn Fn() -> VNode>,
    cached: OnceCell<VNode>,
}

impl Lazy {
    #[must_use]
    pub fn refs(&self) -> &[Token] {
        &self.refs
    }

    /// Same number of tokens and every pair identical.
    #[must_use]
    pub fn same_refs(&self, other: &Lazy) -> bool {
        self.refs.len() == other.refs.len()
            && self.refs.iter().zip(&other.refs).all(|(a, b)| a.same(b))
    }

    /// The subtree, evaluating the thunk on first use.
    pub fn force(&self) -> &VNode {
        self.cached.get_or_init(|| (self.thunk)())
    }

    #[must_use]
    pub fn cached(&self) -> Option<&VNode> {
        self.cached.get()
    }

    /// Reuse a subtree computed by an earlier node. Ignored when this node
    /// already has one.
    pub fn adopt(&self, node: VNode) {
        let _ = self.cached.set(node);
    }
}

/// Memoization input of a lazy node.
#[derive(Clone)]
pub struct Token(TokenRepr);

#[derive(Clone)]
enum TokenRepr {
    Identity(Rc<dyn Any>),
    Value {
        value: Rc<dyn Any>,
        eq: fn(&dyn Any, &dyn Any) -> bool,
    },
}

fn value_eq<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl Token {
    /// Token identified by a shared allocation. Equal only to tokens made
    /// from clones of the same `Rc`.
    pub fn shared<T: 'static>(value: &Rc<T>) -> Self {
        let value: Rc<dyn Any> = Rc::clone(value) as Rc<dyn Any>;
        Self(TokenRepr::Identity(value))
    }

    /// Token compared by value.
    pub fn value<T: PartialEq + 'static>(value: T) -> Self {
        Self(TokenRepr::Value {
            value: Rc::new(value),
            eq: value_eq::<T>,
        })
    }

    #[must_use]
    pub fn same(&self, other: &Token) -> bool {
        match (&self.0, &other.0) {
            (TokenRepr::Identity(a), TokenRepr::Identity(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            (TokenRepr::Value { value: a, eq }, TokenRepr::Value { value: b, .. }) => eq(&**a, &**b),
            _ => false,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            TokenRepr::Identity(value) => write!(f, "Token::Shared({:p})", Rc::as_ptr(value)),
            TokenRepr::Value { .. } => f.write_str("Token::Value(..)"),
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            NodeKind::Text(text) => write!(f, "Text({text:?})"),
            NodeKind::Element(el) => {
                let mut s = f.debug_struct("Element");
                s.field("tag", &el.tag);
                if let Some(ns) = &el.namespace {
                    s.field("namespace", ns);
                }
                if !el.facts.is_empty() {
                    s.field("facts", &el.facts);
                }
                s.field("children", &el.children).finish()
            }
            NodeKind::Keyed(el) => {
                let mut s = f.debug_struct("Keyed");
                s.field("tag", &el.tag);
                if let Some(ns) = &el.namespace {
                    s.field("namespace", ns);
                }
                if !el.facts.is_empty() {
                    s.field("facts", &el.facts);
                }
                s.field("children", &el.children).finish()
            }
            NodeKind::Custom(custom) => f
                .debug_struct("Custom")
                .field("facts", &custom.facts)
                .finish_non_exhaustive(),
            NodeKind::Tagged(tagged) => f
                .debug_struct("Tagged")
                .field("tagger", &tagged.tagger)
                .field("inner", &tagged.inner)
                .finish(),
            NodeKind::Lazy(lazy) => f
                .debug_struct("Lazy")
                .field("refs", &lazy.refs)
                .field("cached", &lazy.cached.get())
                .finish(),
        }
    }
}
