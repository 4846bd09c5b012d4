#![forbid(unsafe_code)]

//! Patch records produced by the differ.
//!
//! Each [`Patch`] targets one node of the old tree by its pre-order index
//! (root = 0). The indexer later resolves that index to a live node and the
//! event root in effect there; until then `node` and `event_root` are empty.
//!
//! # Ordering
//!
//! Within one list, patches are sorted by index. For a given node, its own
//! fact and structural patches precede any patch of its descendants.

use std::fmt;
use std::rc::Rc;

use vtree_core::message::TaggerChain;

use crate::events::EventNode;
use crate::facts::FactsDiff;
use crate::host::NodeId;
use crate::node::{VNode, WidgetPatch};

/// One change to apply to the live tree.
pub struct Patch {
    pub kind: PatchKind,
    /// Pre-order index in the old tree.
    pub index: usize,
    pub(crate) node: Option<NodeId>,
    pub(crate) event_root: Option<Rc<EventNode>>,
}

/// The ten patch variants.
pub enum PatchKind {
    /// Render the node from scratch and swap it in.
    Redraw(VNode),
    UpdateFacts(FactsDiff),
    ReplaceText(String),
    /// Patches of a lazy node's contents, indexed from zero.
    EnterSubtree(Vec<Patch>),
    /// New tagger chain for an unchanged tagging depth.
    ReplaceTaggers(TaggerChain),
    /// Remove `count` children starting at position `start`.
    RemoveTail { start: usize, count: usize },
    /// Render and append `children`. `start` is the old child count.
    AppendTail { start: usize, children: Vec<VNode> },
    KeyedReorder(Reorder),
    /// Detach a keyed child. Carries a relocation when the child moves.
    KeyedRemove(Option<Relocation>),
    Custom(WidgetPatch),
}

impl Patch {
    pub(crate) fn new(kind: PatchKind, index: usize) -> Self {
        Self {
            kind,
            index,
            node: None,
            event_root: None,
        }
    }

    /// Live node resolved by the indexer.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }
}

impl PatchKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Redraw(_) => "redraw",
            Self::UpdateFacts(_) => "update-facts",
            Self::ReplaceText(_) => "replace-text",
            Self::EnterSubtree(_) => "enter-subtree",
            Self::ReplaceTaggers(_) => "replace-taggers",
            Self::RemoveTail { .. } => "remove-tail",
            Self::AppendTail { .. } => "append-tail",
            Self::KeyedReorder(_) => "keyed-reorder",
            Self::KeyedRemove(_) => "keyed-remove",
            Self::Custom(_) => "custom",
        }
    }
}

/// Whether a keyed entry was only inserted, only removed, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Inserted,
    Removed,
    /// Removed from one position and inserted at another.
    Moved,
}

/// Side-table record for one key within a keyed diff.
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: String,
    /// New node for inserts, old node for removals.
    pub node: VNode,
    pub state: EntryState,
    /// Old index of a removal, used to number patches of a later match.
    pub(crate) old_index: usize,
    /// Position of the removal patch within [`Reorder::patches`].
    pub(crate) remove_patch: Option<usize>,
}

/// Positional insert of entry `entry` before the child now at `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insert {
    pub position: usize,
    pub entry: usize,
}

/// Everything a keyed children diff needs at apply time.
#[derive(Debug, Default)]
pub struct Reorder {
    /// Removals and in-place diffs of matched children.
    pub patches: Vec<Patch>,
    pub entries: Vec<Entry>,
    pub inserts: Vec<Insert>,
    /// Entries appended after the last surviving child.
    pub end_inserts: Vec<usize>,
}

/// A removed keyed child that is inserted elsewhere.
#[derive(Debug)]
pub struct Relocation {
    pub entry: usize,
    /// Diff between the old and new node, indexed in the old tree.
    pub patches: Vec<Patch>,
}

/// Number of patches in a list, counting nested ones.
#[must_use]
pub fn count_patches(patches: &[Patch]) -> usize {
    patches
        .iter()
        .map(|patch| {
            1 + match &patch.kind {
                PatchKind::EnterSubtree(sub) => count_patches(sub),
                PatchKind::KeyedReorder(reorder) => count_patches(&reorder.patches),
                PatchKind::KeyedRemove(Some(relocation)) => count_patches(&relocation.patches),
                _ => 0,
            }
        })
        .sum()
}

/// Number of `Redraw` patches, counting nested ones.
#[must_use]
pub fn count_redraws(patches: &[Patch]) -> usize {
    patches
        .iter()
        .map(|patch| match &patch.kind {
            PatchKind::Redraw(_) => 1,
            PatchKind::EnterSubtree(sub) => count_redraws(sub),
            PatchKind::KeyedReorder(reorder) => count_redraws(&reorder.patches),
            PatchKind::KeyedRemove(Some(relocation)) => count_redraws(&relocation.patches),
            _ => 0,
        })
        .sum()
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Patch");
        s.field("index", &self.index);
        match &self.kind {
            PatchKind::Redraw(node) => s.field("redraw", node),
            PatchKind::UpdateFacts(diff) => s.field("facts", diff),
            PatchKind::ReplaceText(text) => s.field("text", text),
            PatchKind::EnterSubtree(sub) => s.field("subtree", sub),
            PatchKind::ReplaceTaggers(chain) => s.field("taggers", chain),
            PatchKind::RemoveTail { start, count } => s.field("remove_tail", &(start, count)),
            PatchKind::AppendTail { start, children } => {
                s.field("append_tail", &(start, children))
            }
            PatchKind::KeyedReorder(reorder) => s.field("reorder", reorder),
            PatchKind::KeyedRemove(relocation) => s.field("remove", relocation),
            PatchKind::Custom(patch) => s.field("custom", patch),
        };
        if let Some(node) = self.node {
            s.field("node", &node);
        }
        s.finish()
    }
}
