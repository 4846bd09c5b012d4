#![forbid(unsafe_code)]

//! Resolve patch indices to live nodes.
//!
//! The walk mirrors the differ's numbering over the old virtual tree and the
//! live tree side by side, descending only into children whose index window
//! `[low, low + descendants]` contains the next pending patch. Each resolved
//! patch also records the event root in effect at its node, which is what
//! freshly rendered listeners below it will report to.
//!
//! Nested patch lists are indexed in place:
//! - an `EnterSubtree` list against the lazy node's cached subtree, from zero;
//! - a keyed reorder's local patches against the keyed element's window;
//! - a relocation's patches against the removed child's window.

use std::rc::Rc;

use crate::events::EventNode;
use crate::host::{Host, NodeId};
use crate::node::{NodeKind, VNode};
use crate::patch::{Patch, PatchKind};

/// Attach live nodes and event roots to `patches`, a diff of `old` rendered
/// at `root`.
pub(crate) fn index_patches(
    host: &dyn Host,
    root: NodeId,
    old: &VNode,
    patches: &mut [Patch],
    events: &Rc<EventNode>,
) {
    index_help(host, root, old, patches, 0, 0, old.descendants(), events);
}

/// Returns the position of the first patch not handled at or below `node`.
#[allow(clippy::too_many_arguments)]
fn index_help(
    host: &dyn Host,
    node: NodeId,
    vnode: &VNode,
    patches: &mut [Patch],
    mut i: usize,
    mut low: usize,
    high: usize,
    events: &Rc<EventNode>,
) -> usize {
    let Some(first) = patches.get(i) else {
        return i;
    };
    let mut index = first.index;

    while index == low {
        let patch = &mut patches[i];
        patch.node = Some(node);
        patch.event_root = Some(Rc::clone(events));

        match &mut patch.kind {
            PatchKind::EnterSubtree(sub) => {
                if let NodeKind::Lazy(lazy) = vnode.kind() {
                    let inner = lazy.force();
                    index_help(host, node, inner, sub, 0, 0, inner.descendants(), events);
                }
            }
            PatchKind::KeyedReorder(reorder) => {
                if !reorder.patches.is_empty() {
                    index_help(host, node, vnode, &mut reorder.patches, 0, low, high, events);
                }
            }
            PatchKind::KeyedRemove(Some(relocation)) => {
                if !relocation.patches.is_empty() {
                    index_help(host, node, vnode, &mut relocation.patches, 0, low, high, events);
                }
            }
            _ => {}
        }

        i += 1;
        match patches.get(i) {
            Some(next) if next.index <= high => index = next.index,
            _ => return i,
        }
    }

    if let NodeKind::Tagged(tagged) = vnode.kind() {
        let mut inner = tagged.inner();
        while let NodeKind::Tagged(next) = inner.kind() {
            inner = next.inner();
        }
        let events = host.event_root(node).unwrap_or_else(|| Rc::clone(events));
        return index_help(host, node, inner, patches, i, low + 1, high, &events);
    }

    for position in 0..vnode.child_count() {
        let Some(kid) = vnode.child(position) else {
            break;
        };
        low += 1;
        let next_low = low + kid.descendants();
        if low <= index && index <= next_low {
            let Some(child) = host.child_at(node, position) else {
                vtree_core::warn!(index, position, "live tree is missing a child");
                return i;
            };
            i = index_help(host, child, kid, patches, i, low, next_low, events);
            match patches.get(i) {
                Some(next) if next.index <= high => index = next.index,
                _ => return i,
            }
        }
        low = next_low;
    }

    i
}
