#![forbid(unsafe_code)]

//! Keyed children reconciliation.
//!
//! Children of two keyed elements are walked in parallel with one element of
//! lookahead on each side. At every step the current and next keys select one
//! of four shapes:
//!
//! | shape       | condition                          | effect                         |
//! |-------------|------------------------------------|--------------------------------|
//! | match       | `old == new`                       | diff in place                  |
//! | swap        | `new == old+1` and `old == new+1`  | diff, insert one, remove one   |
//! | insert      | `old == new+1`                     | insert new, diff next          |
//! | remove      | `new == old+1`                     | remove old, diff next          |
//! | replace     | `old+1 == new+1`                   | remove old, insert new         |
//!
//! Anything else ends the walk: remaining old children are removed and
//! remaining new children are appended.
//!
//! Every insert and removal goes through a side table keyed by child key. An
//! insert whose key was removed earlier (or a removal whose key was inserted
//! earlier) becomes a move: the old live node is detached, patched with the
//! diff between old and new, and reinserted. Duplicate keys get a private
//! suffix and retry, so they never alias one table entry.

use rustc_hash::FxHashMap;

use crate::diff::diff_help;
use crate::node::{KeyedElement, VNode};
use crate::patch::{Entry, EntryState, Insert, Patch, PatchKind, Relocation, Reorder};

/// Appended to a duplicate key until it no longer collides.
const DUPLICATE_SUFFIX: &str = "\u{0}dup";

struct KeyedDiff {
    patches: Vec<Patch>,
    entries: Vec<Entry>,
    table: FxHashMap<String, usize>,
    inserts: Vec<Insert>,
    end_inserts: Vec<usize>,
}

impl KeyedDiff {
    fn new() -> Self {
        Self {
            patches: Vec::new(),
            entries: Vec::new(),
            table: FxHashMap::default(),
            inserts: Vec::new(),
            end_inserts: Vec::new(),
        }
    }

    fn push_insert(&mut self, position: Option<usize>, entry: usize) {
        match position {
            Some(position) => self.inserts.push(Insert { position, entry }),
            None => self.end_inserts.push(entry),
        }
    }

    /// Record `node` as inserted at `position`, or at the end when `None`.
    fn insert(&mut self, key: &str, node: &VNode, position: Option<usize>) {
        let mut key = key.to_owned();
        loop {
            match self.table.get(&key).copied() {
                None => {
                    let id = self.entries.len();
                    self.entries.push(Entry {
                        key: key.clone(),
                        node: node.clone(),
                        state: EntryState::Inserted,
                        old_index: 0,
                        remove_patch: None,
                    });
                    self.table.insert(key, id);
                    self.push_insert(position, id);
                    return;
                }
                Some(id) if self.entries[id].state == EntryState::Removed => {
                    self.push_insert(position, id);
                    let entry = &mut self.entries[id];
                    entry.state = EntryState::Moved;
                    let old = entry.node.clone();
                    let old_index = entry.old_index;
                    let remove_patch = entry.remove_patch;

                    let mut sub = Vec::new();
                    diff_help(&old, node, &mut sub, old_index);
                    if let Some(at) = remove_patch {
                        self.patches[at].kind = PatchKind::KeyedRemove(Some(Relocation {
                            entry: id,
                            patches: sub,
                        }));
                    }
                    return;
                }
                Some(_) => key.push_str(DUPLICATE_SUFFIX),
            }
        }
    }

    /// Record the old child `node` at `index` as removed.
    fn remove(&mut self, key: &str, node: &VNode, index: usize) {
        let mut key = key.to_owned();
        loop {
            match self.table.get(&key).copied() {
                None => {
                    let at = self.patches.len();
                    self.patches.push(Patch::new(PatchKind::KeyedRemove(None), index));
                    let id = self.entries.len();
                    self.entries.push(Entry {
                        key: key.clone(),
                        node: node.clone(),
                        state: EntryState::Removed,
                        old_index: index,
                        remove_patch: Some(at),
                    });
                    self.table.insert(key, id);
                    return;
                }
                Some(id) if self.entries[id].state == EntryState::Inserted => {
                    let entry = &mut self.entries[id];
                    entry.state = EntryState::Moved;
                    let new = entry.node.clone();

                    let mut sub = Vec::new();
                    diff_help(node, &new, &mut sub, index);
                    self.patches.push(Patch::new(
                        PatchKind::KeyedRemove(Some(Relocation {
                            entry: id,
                            patches: sub,
                        })),
                        index,
                    ));
                    return;
                }
                Some(_) => key.push_str(DUPLICATE_SUFFIX),
            }
        }
    }

    fn finish(self) -> Option<Reorder> {
        if self.patches.is_empty() && self.inserts.is_empty() && self.end_inserts.is_empty() {
            return None;
        }
        Some(Reorder {
            patches: self.patches,
            entries: self.entries,
            inserts: self.inserts,
            end_inserts: self.end_inserts,
        })
    }
}

/// Diff the children of two keyed elements rooted at `root_index`. Pushes
/// at most one [`PatchKind::KeyedReorder`] at `root_index`.
pub(crate) fn diff_keyed_children(
    x_parent: &KeyedElement,
    y_parent: &KeyedElement,
    patches: &mut Vec<Patch>,
    root_index: usize,
) {
    let x_kids = x_parent.children();
    let y_kids = y_parent.children();
    let x_len = x_kids.len();
    let y_len = y_kids.len();

    let mut state = KeyedDiff::new();
    let mut x_index = 0;
    let mut y_index = 0;
    let mut index = root_index;

    while x_index < x_len && y_index < y_len {
        let (x_key, x_node) = &x_kids[x_index];
        let (y_key, y_node) = &y_kids[y_index];

        if x_key == y_key {
            index += 1;
            diff_help(x_node, y_node, &mut state.patches, index);
            index += x_node.descendants();
            x_index += 1;
            y_index += 1;
            continue;
        }

        let x_next = x_kids.get(x_index + 1);
        let y_next = y_kids.get(y_index + 1);

        let old_match = x_next.is_some_and(|(k, _)| k == y_key);
        let new_match = y_next.is_some_and(|(k, _)| k == x_key);

        match (old_match, new_match, x_next, y_next) {
            // Adjacent pair exchanged.
            (true, true, Some((_, x_next_node)), Some((_, y_next_node))) => {
                index += 1;
                diff_help(x_node, y_next_node, &mut state.patches, index);
                state.insert(y_key, y_node, Some(y_index));
                index += x_node.descendants();

                index += 1;
                state.remove(y_key, x_next_node, index);
                index += x_next_node.descendants();

                x_index += 2;
                y_index += 2;
            }
            // New child inserted before the current old one.
            (false, true, _, Some((_, y_next_node))) => {
                index += 1;
                state.insert(y_key, y_node, Some(y_index));
                diff_help(x_node, y_next_node, &mut state.patches, index);
                index += x_node.descendants();

                x_index += 1;
                y_index += 2;
            }
            // Current old child removed.
            (true, false, Some((_, x_next_node)), _) => {
                index += 1;
                state.remove(x_key, x_node, index);
                index += x_node.descendants();

                index += 1;
                diff_help(x_next_node, y_node, &mut state.patches, index);
                index += x_next_node.descendants();

                x_index += 2;
                y_index += 1;
            }
            // Current old child replaced by a different key.
            (false, false, Some((x_next_key, x_next_node)), Some((y_next_key, y_next_node)))
                if x_next_key == y_next_key =>
            {
                index += 1;
                state.remove(x_key, x_node, index);
                state.insert(y_key, y_node, Some(y_index));
                index += x_node.descendants();

                index += 1;
                diff_help(x_next_node, y_next_node, &mut state.patches, index);
                index += x_next_node.descendants();

                x_index += 2;
                y_index += 2;
            }
            _ => break,
        }
    }

    while x_index < x_len {
        index += 1;
        let (x_key, x_node) = &x_kids[x_index];
        state.remove(x_key, x_node, index);
        index += x_node.descendants();
        x_index += 1;
    }

    while y_index < y_len {
        let (y_key, y_node) = &y_kids[y_index];
        state.insert(y_key, y_node, None);
        y_index += 1;
    }

    if let Some(reorder) = state.finish() {
        vtree_core::trace!(
            removals = reorder.patches.len(),
            inserts = reorder.inserts.len(),
            end_inserts = reorder.end_inserts.len(),
            "keyed reorder"
        );
        patches.push(Patch::new(PatchKind::KeyedReorder(reorder), root_index));
    }
}
