#![forbid(unsafe_code)]

//! Tree diff between two virtual trees.
//!
//! [`diff`] walks the old and new tree together and records the minimal
//! patches needed to turn the live rendering of the old tree into a
//! rendering of the new one.
//!
//! # Algorithm
//!
//! Pre-order walk with a running index into the old tree:
//! 1. Identical handles short-circuit with no patches.
//! 2. Nodes of different variants are redrawn.
//! 3. Lazy nodes with identical tokens adopt the old subtree unevaluated.
//!    Otherwise the new thunk runs and its output is diffed inside an
//!    [`EnterSubtree`](PatchKind::EnterSubtree) indexed from zero.
//! 4. Chains of tagging nodes are compared as a whole. A change in chain
//!    length redraws; a change of tagger identity replaces the chain.
//! 5. Element facts are diffed, then children: positionally for plain
//!    elements, by key for keyed ones (see [`crate::keyed`]).
//!
//! A plain element followed by a keyed element with the same tag is diffed
//! positionally. The reverse redraws.
//!
//! # Usage
//!
//! ```
//! use vtree_render::diff::diff;
//! use vtree_render::facts::Facts;
//! use vtree_render::node::VNode;
//! use vtree_render::patch::PatchKind;
//!
//! let old = VNode::element("p", Facts::default(), vec![VNode::text("hello")]);
//! let new = VNode::element("p", Facts::default(), vec![VNode::text("world")]);
//!
//! let patches = diff(&old, &new);
//! assert_eq!(patches.len(), 1);
//! assert_eq!(patches[0].index, 1);
//! assert!(matches!(&patches[0].kind, PatchKind::ReplaceText(t) if t == "world"));
//! ```

use vtree_core::message::{TaggerChain, chains_equal};

use crate::facts::diff_facts;
use crate::keyed::diff_keyed_children;
use crate::node::{Element, NodeKind, VNode};
use crate::patch::{Patch, PatchKind};

/// Patches turning `old` into `new`, sorted by old-tree index.
#[must_use]
pub fn diff(old: &VNode, new: &VNode) -> Vec<Patch> {
    let span = vtree_core::debug_span!("vtree.diff", descendants = old.descendants());
    let _guard = span.enter();

    let mut patches = Vec::new();
    diff_help(old, new, &mut patches, 0);

    vtree_core::trace!(patches = patches.len(), "diff complete");
    patches
}

pub(crate) fn diff_help(x: &VNode, y: &VNode, patches: &mut Vec<Patch>, index: usize) {
    if VNode::ptr_eq(x, y) {
        return;
    }

    match (x.kind(), y.kind()) {
        (NodeKind::Lazy(xl), NodeKind::Lazy(yl)) => {
            if xl.same_refs(yl) {
                if let Some(cached) = xl.cached() {
                    yl.adopt(cached.clone());
                }
                return;
            }
            let mut sub = Vec::new();
            diff_help(xl.force(), yl.force(), &mut sub, 0);
            if !sub.is_empty() {
                patches.push(Patch::new(PatchKind::EnterSubtree(sub), index));
            }
        }

        (NodeKind::Tagged(_), NodeKind::Tagged(_)) => {
            let (x_chain, x_inner) = collect_chain(x);
            let (y_chain, y_inner) = collect_chain(y);
            if x_chain.len() != y_chain.len() {
                redraw(y, patches, index);
                return;
            }
            if !chains_equal(&x_chain, &y_chain) {
                patches.push(Patch::new(PatchKind::ReplaceTaggers(y_chain), index));
            }
            diff_help(x_inner, y_inner, patches, index + 1);
        }

        (NodeKind::Text(a), NodeKind::Text(b)) => {
            if a != b {
                patches.push(Patch::new(PatchKind::ReplaceText(b.clone()), index));
            }
        }

        (NodeKind::Element(xe), NodeKind::Element(ye)) => {
            diff_element(xe, ye, y, patches, index);
        }

        (NodeKind::Element(xe), NodeKind::Keyed(yk)) => {
            let ye = yk.dekey();
            diff_element(xe, &ye, y, patches, index);
        }

        (NodeKind::Keyed(xk), NodeKind::Keyed(yk)) => {
            if xk.tag() != yk.tag() || xk.namespace() != yk.namespace() {
                redraw(y, patches, index);
                return;
            }
            if let Some(facts) = diff_facts(xk.facts(), yk.facts()) {
                patches.push(Patch::new(PatchKind::UpdateFacts(facts), index));
            }
            diff_keyed_children(xk, yk, patches, index);
        }

        (NodeKind::Custom(xc), NodeKind::Custom(yc)) => {
            if !xc.same_renderer(yc) {
                redraw(y, patches, index);
                return;
            }
            if let Some(facts) = diff_facts(xc.facts(), yc.facts()) {
                patches.push(Patch::new(PatchKind::UpdateFacts(facts), index));
            }
            if let Some(patch) = yc.widget().diff(xc.widget()) {
                patches.push(Patch::new(PatchKind::Custom(patch), index));
            }
        }

        _ => redraw(y, patches, index),
    }
}

fn redraw(y: &VNode, patches: &mut Vec<Patch>, index: usize) {
    patches.push(Patch::new(PatchKind::Redraw(y.clone()), index));
}

/// Taggers of directly nested tagging nodes, outermost first, and the first
/// non-tagging node below them.
pub(crate) fn collect_chain(node: &VNode) -> (TaggerChain, &VNode) {
    let mut chain = TaggerChain::new();
    let mut current = node;
    while let NodeKind::Tagged(tagged) = current.kind() {
        chain.push(tagged.tagger().clone());
        current = tagged.inner();
    }
    (chain, current)
}

fn diff_element(x: &Element, y: &Element, y_node: &VNode, patches: &mut Vec<Patch>, index: usize) {
    if x.tag() != y.tag() || x.namespace() != y.namespace() {
        redraw(y_node, patches, index);
        return;
    }
    if let Some(facts) = diff_facts(x.facts(), y.facts()) {
        patches.push(Patch::new(PatchKind::UpdateFacts(facts), index));
    }
    diff_children(x.children(), y.children(), patches, index);
}

/// Positional children diff. Tail changes are recorded before the child
/// patches so that their index order is preserved.
fn diff_children(x_kids: &[VNode], y_kids: &[VNode], patches: &mut Vec<Patch>, root_index: usize) {
    let x_len = x_kids.len();
    let y_len = y_kids.len();

    if x_len > y_len {
        patches.push(Patch::new(
            PatchKind::RemoveTail {
                start: y_len,
                count: x_len - y_len,
            },
            root_index,
        ));
    } else if x_len < y_len {
        patches.push(Patch::new(
            PatchKind::AppendTail {
                start: x_len,
                children: y_kids[x_len..].to_vec(),
            },
            root_index,
        ));
    }

    let mut index = root_index;
    for (x_kid, y_kid) in x_kids.iter().zip(y_kids) {
        index += 1;
        diff_help(x_kid, y_kid, patches, index);
        index += x_kid.descendants();
    }
}
