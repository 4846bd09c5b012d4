#![forbid(unsafe_code)]

//! Owner of one mounted tree.
//!
//! A [`Reconciler`] keeps the last rendered virtual tree, the live root, and
//! the root event record, and runs one full diff, index, and apply pass per
//! [`Reconciler::update`].
//!
//! # Usage
//!
//! ```
//! use vtree_render::events::Dispatcher;
//! use vtree_render::headless::HeadlessDom;
//! use vtree_render::html::Html;
//! use vtree_render::reconciler::Reconciler;
//!
//! let mut dom = HeadlessDom::new();
//! let mount = dom.create_mount("div");
//! let view = |s: &str| Html::<()>::node("p", vec![], vec![Html::text(s)]).into_node();
//!
//! let mut reconciler = Reconciler::mount(&mut dom, mount, view("a"), Dispatcher::ignore());
//! let stats = reconciler.update(&mut dom, view("b")).unwrap();
//! assert_eq!(stats.patches, 1);
//! assert_eq!(dom.to_markup(reconciler.root()), "<p>b</p>");
//! ```
//!
//! # Hydration
//!
//! [`Reconciler::hydrate`] reads the live content already under the mount
//! node back into a virtual tree with [`virtualize`] and patches it towards
//! the first view, keeping every live node that already matches.

use std::rc::Rc;

use crate::apply::{ApplyError, apply_patches, render};
use crate::diff::diff;
use crate::events::{Dispatcher, EventNode};
use crate::facts::{Fact, Facts};
use crate::host::{Host, NodeId, NodeShape};
use crate::node::VNode;
use crate::patch::{Patch, count_patches, count_redraws};

/// What one render pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    /// Patches applied, nested ones included.
    pub patches: usize,
    pub redraws: usize,
    /// The live root node changed.
    pub replaced_root: bool,
}

impl RenderStats {
    fn of(patches: &[Patch]) -> Self {
        Self {
            patches: count_patches(patches),
            redraws: count_redraws(patches),
            replaced_root: false,
        }
    }
}

/// A mounted virtual tree and its live counterpart.
#[derive(Debug)]
pub struct Reconciler {
    root: NodeId,
    current: VNode,
    events: Rc<EventNode>,
}

impl Reconciler {
    /// Render `view` and put it in place of `mount`.
    pub fn mount(host: &mut dyn Host, mount: NodeId, view: VNode, dispatcher: Dispatcher) -> Self {
        let span = vtree_core::debug_span!("vtree.mount");
        let _guard = span.enter();

        let events = EventNode::root(dispatcher);
        let root = render(host, &view, &events);
        if let Some(parent) = host.parent(mount) {
            host.replace_child(parent, root, mount);
        }
        Self {
            root,
            current: view,
            events,
        }
    }

    /// Adopt the live content at `mount` and patch it towards `view`.
    pub fn hydrate(
        host: &mut dyn Host,
        mount: NodeId,
        view: VNode,
        dispatcher: Dispatcher,
    ) -> Result<(Self, RenderStats), ApplyError> {
        let span = vtree_core::debug_span!("vtree.hydrate");
        let _guard = span.enter();

        let events = EventNode::root(dispatcher);
        let existing = virtualize(host, mount);
        let patches = diff(&existing, &view);
        let mut stats = RenderStats::of(&patches);
        let root = apply_patches(host, mount, &existing, patches, &events)?;
        stats.replaced_root = root != mount;
        vtree_core::debug!(patches = stats.patches, redraws = stats.redraws, "hydrated");
        Ok((
            Self {
                root,
                current: view,
                events,
            },
            stats,
        ))
    }

    /// Diff `next` against the current tree and patch the live tree.
    ///
    /// On error the live tree may be partially patched and the previous
    /// virtual tree is kept.
    pub fn update(&mut self, host: &mut dyn Host, next: VNode) -> Result<RenderStats, ApplyError> {
        let patches = diff(&self.current, &next);
        let mut stats = RenderStats::of(&patches);
        let root = apply_patches(host, self.root, &self.current, patches, &self.events)?;
        stats.replaced_root = root != self.root;
        self.root = root;
        self.current = next;
        vtree_core::trace!(
            patches = stats.patches,
            redraws = stats.redraws,
            replaced_root = stats.replaced_root,
            "render pass"
        );
        Ok(stats)
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> &VNode {
        &self.current
    }

    #[inline]
    #[must_use]
    pub fn events(&self) -> &Rc<EventNode> {
        &self.events
    }
}

/// Read live content back into a virtual tree. Only text, elements,
/// attributes, and children are recovered; anything else becomes empty text.
pub fn virtualize(host: &dyn Host, node: NodeId) -> VNode {
    match host.shape(node) {
        NodeShape::Text(text) => VNode::text(text),
        NodeShape::Element {
            tag,
            namespace,
            attributes,
        } => {
            let facts = Facts::organize(
                attributes
                    .into_iter()
                    .map(|(name, value)| Fact::Attribute { name, value }),
            );
            let children = (0..host.child_count(node))
                .filter_map(|index| host.child_at(node, index))
                .map(|child| virtualize(host, child))
                .collect();
            match namespace {
                Some(namespace) => VNode::element_ns(namespace, tag, facts, children),
                None => VNode::element(tag, facts, children),
            }
        }
        NodeShape::Other => VNode::text(""),
    }
}
