#![forbid(unsafe_code)]

//! Render virtual nodes and apply patches to a live tree.
//!
//! [`render`] builds a fresh live subtree. [`apply_patches`] indexes a patch
//! list against the old tree and applies it in order, returning the live
//! root, which differs from the input only when the root itself was
//! redrawn or replaced by a widget.
//!
//! # Keyed reorder
//!
//! A [`Reorder`] is applied in three phases:
//! 1. its local patches, where every keyed removal detaches its child and a
//!    moving child is patched while detached;
//! 2. positional inserts in ascending position, each placed before the
//!    child currently at that position;
//! 3. end inserts, gathered in a fragment and appended once.
//!
//! # Failure Modes
//!
//! A patch left unresolved by the indexer means the live tree no longer
//! matches the old virtual tree. That is reported as
//! [`ApplyError::Unindexed`] and the live tree is left partially patched.
//! A tail removal that runs out of live children is reported the same way,
//! as [`ApplyError::MissingChild`].

use std::fmt;
use std::rc::Rc;

use vtree_core::handler::Handler;

use crate::diff::collect_chain;
use crate::events::{EventNode, Listener};
use crate::facts::FactsDiff;
use crate::host::{Host, NodeId};
use crate::index::index_patches;
use crate::node::{NodeKind, VNode};
use crate::patch::{Entry, EntryState, Insert, Patch, PatchKind, Relocation, Reorder};

/// Errors from applying a patch list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No live node was found for a patch.
    Unindexed { index: usize, kind: &'static str },
    /// A keyed insert refers to a moved entry whose live node was never
    /// detached.
    MissingRelocation { entry: usize },
    /// A relocation appeared outside a keyed reorder.
    StrayRelocation { index: usize },
    /// A tail removal found no live child at `position`.
    MissingChild { index: usize, position: usize },
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unindexed { index, kind } => {
                write!(f, "no live node for {kind} patch at index {index}")
            }
            Self::MissingRelocation { entry } => {
                write!(f, "keyed entry {entry} was moved but never detached")
            }
            Self::StrayRelocation { index } => {
                write!(f, "relocation at index {index} outside a keyed reorder")
            }
            Self::MissingChild { index, position } => {
                write!(f, "no live child at position {position} for patch at index {index}")
            }
        }
    }
}

impl std::error::Error for ApplyError {}

/// Build a live subtree for `vnode`. Listeners report to `events`.
pub fn render(host: &mut dyn Host, vnode: &VNode, events: &Rc<EventNode>) -> NodeId {
    match vnode.kind() {
        NodeKind::Lazy(lazy) => render(host, lazy.force(), events),

        NodeKind::Text(text) => host.create_text(text),

        NodeKind::Tagged(_) => {
            let (chain, inner) = collect_chain(vnode);
            let sub = EventNode::tagged(chain, Rc::clone(events));
            let node = render(host, inner, &sub);
            host.set_event_root(node, Some(sub));
            node
        }

        NodeKind::Custom(custom) => {
            let node = custom.widget().render(host);
            apply_facts(host, node, events, &custom.facts().to_full_diff());
            node
        }

        NodeKind::Element(el) => {
            let node = host.create_element(el.tag(), el.namespace());
            apply_facts(host, node, events, &el.facts().to_full_diff());
            for child in el.children() {
                let live = render(host, child, events);
                host.append_child(node, live);
            }
            node
        }

        NodeKind::Keyed(el) => {
            let node = host.create_element(el.tag(), el.namespace());
            apply_facts(host, node, events, &el.facts().to_full_diff());
            for (_, child) in el.children() {
                let live = render(host, child, events);
                host.append_child(node, live);
            }
            node
        }
    }
}

/// Apply `patches`, a diff of `old` against a newer tree, to the live tree
/// rooted at `root`. Returns the live root afterwards.
pub fn apply_patches(
    host: &mut dyn Host,
    root: NodeId,
    old: &VNode,
    mut patches: Vec<Patch>,
    events: &Rc<EventNode>,
) -> Result<NodeId, ApplyError> {
    if patches.is_empty() {
        return Ok(root);
    }
    let span = vtree_core::debug_span!("vtree.apply", patches = patches.len());
    let _guard = span.enter();

    index_patches(host, root, old, &mut patches, events);
    apply_indexed(host, root, patches)
}

fn apply_indexed(host: &mut dyn Host, root: NodeId, patches: Vec<Patch>) -> Result<NodeId, ApplyError> {
    let mut root = root;
    for patch in patches {
        let local = resolved(&patch)?;
        let replaced = apply_patch(host, local, patch)?;
        if local == root {
            root = replaced;
        }
    }
    Ok(root)
}

fn resolved(patch: &Patch) -> Result<NodeId, ApplyError> {
    patch.node.ok_or(ApplyError::Unindexed {
        index: patch.index,
        kind: patch.kind.name(),
    })
}

fn apply_patch(host: &mut dyn Host, node: NodeId, patch: Patch) -> Result<NodeId, ApplyError> {
    let Patch {
        kind,
        index,
        event_root,
        ..
    } = patch;
    let events = event_root.ok_or(ApplyError::Unindexed {
        index,
        kind: kind.name(),
    })?;

    vtree_core::trace!(index, kind = kind.name(), "apply patch");

    match kind {
        PatchKind::Redraw(vnode) => Ok(redraw(host, node, &vnode, &events)),

        PatchKind::UpdateFacts(diff) => {
            apply_facts(host, node, &events, &diff);
            Ok(node)
        }

        PatchKind::ReplaceText(text) => {
            host.set_text(node, &text);
            Ok(node)
        }

        PatchKind::EnterSubtree(sub) => apply_indexed(host, node, sub),

        PatchKind::ReplaceTaggers(chain) => {
            let retargeted = host
                .event_root(node)
                .is_some_and(|record| record.replace_taggers(chain.clone()));
            if !retargeted {
                host.set_event_root(node, Some(EventNode::tagged(chain, events)));
            }
            Ok(node)
        }

        PatchKind::RemoveTail { start, count } => {
            for removed in 0..count {
                let child = host.child_at(node, start).ok_or(ApplyError::MissingChild {
                    index,
                    position: start + removed,
                })?;
                host.remove_child(node, child);
            }
            Ok(node)
        }

        PatchKind::AppendTail { start, children } => {
            let reference = host.child_at(node, start);
            for child in &children {
                let live = render(host, child, &events);
                host.insert_before(node, live, reference);
            }
            Ok(node)
        }

        PatchKind::KeyedReorder(reorder) => apply_reorder(host, node, reorder, &events),

        PatchKind::KeyedRemove(None) => {
            if let Some(parent) = host.parent(node) {
                host.remove_child(parent, node);
            }
            Ok(node)
        }

        PatchKind::KeyedRemove(Some(_)) => Err(ApplyError::StrayRelocation { index }),

        PatchKind::Custom(patch) => {
            let replaced = patch.apply(host, node);
            if replaced != node {
                carry_event_root(host, node, replaced);
                if let Some(parent) = host.parent(node) {
                    host.replace_child(parent, replaced, node);
                }
            }
            Ok(replaced)
        }
    }
}

fn redraw(host: &mut dyn Host, node: NodeId, vnode: &VNode, events: &Rc<EventNode>) -> NodeId {
    let parent = host.parent(node);
    let fresh = render(host, vnode, events);
    carry_event_root(host, node, fresh);
    if let Some(parent) = parent {
        host.replace_child(parent, fresh, node);
    }
    fresh
}

/// Move the tagging record of a replaced node to its successor, unless the
/// successor was rendered with its own.
fn carry_event_root(host: &mut dyn Host, from: NodeId, to: NodeId) {
    if host.event_root(to).is_none() {
        let carried = host.event_root(from);
        if carried.is_some() {
            host.set_event_root(to, carried);
        }
    }
}

fn apply_reorder(
    host: &mut dyn Host,
    node: NodeId,
    reorder: Reorder,
    events: &Rc<EventNode>,
) -> Result<NodeId, ApplyError> {
    let Reorder {
        patches,
        entries,
        inserts,
        end_inserts,
    } = reorder;
    let mut moved: Vec<Option<NodeId>> = vec![None; entries.len()];

    for patch in patches {
        let local = resolved(&patch)?;
        match patch.kind {
            PatchKind::KeyedRemove(relocation) => {
                detach(host, local, relocation, &mut moved)?;
            }
            kind => {
                apply_patch(host, local, Patch { kind, ..patch })?;
            }
        }
    }

    for Insert { position, entry } in inserts {
        let child = entry_node(host, &entries, &moved, entry, events)?;
        let reference = host.child_at(node, position);
        host.insert_before(node, child, reference);
    }

    if !end_inserts.is_empty() {
        let fragment = host.create_fragment();
        for entry in end_inserts {
            let child = entry_node(host, &entries, &moved, entry, events)?;
            host.append_child(fragment, child);
        }
        host.append_child(node, fragment);
    }

    Ok(node)
}

/// Detach a keyed child. A moving child is patched while detached and kept
/// for reinsertion.
fn detach(
    host: &mut dyn Host,
    node: NodeId,
    relocation: Option<Relocation>,
    moved: &mut [Option<NodeId>],
) -> Result<(), ApplyError> {
    if let Some(parent) = host.parent(node) {
        host.remove_child(parent, node);
    }
    if let Some(Relocation { entry, patches }) = relocation {
        let live = apply_indexed(host, node, patches)?;
        let slot = moved
            .get_mut(entry)
            .ok_or(ApplyError::MissingRelocation { entry })?;
        *slot = Some(live);
    }
    Ok(())
}

fn entry_node(
    host: &mut dyn Host,
    entries: &[Entry],
    moved: &[Option<NodeId>],
    id: usize,
    events: &Rc<EventNode>,
) -> Result<NodeId, ApplyError> {
    let entry = entries
        .get(id)
        .ok_or(ApplyError::MissingRelocation { entry: id })?;
    match entry.state {
        EntryState::Moved => moved
            .get(id)
            .copied()
            .flatten()
            .ok_or(ApplyError::MissingRelocation { entry: id }),
        EntryState::Inserted | EntryState::Removed => Ok(render(host, &entry.node, events)),
    }
}

/// Write a facts diff onto a live node.
pub(crate) fn apply_facts(host: &mut dyn Host, node: NodeId, events: &Rc<EventNode>, diff: &FactsDiff) {
    for (name, value) in &diff.styles {
        host.set_style(node, name, value);
    }
    for (name, handler) in &diff.events {
        apply_event(host, node, events, name, handler.as_ref());
    }
    for (name, value) in &diff.attributes {
        match value {
            Some(value) => host.set_attribute(node, name, value),
            None => host.remove_attribute(node, name),
        }
    }
    for (name, ns) in &diff.attributes_ns {
        match &ns.value {
            Some(value) => host.set_attribute_ns(node, &ns.namespace, name, value),
            None => host.remove_attribute_ns(node, &ns.namespace, name),
        }
    }
    for (name, value) in &diff.properties {
        let user_editable = name == "value" || name == "checked";
        if user_editable && host.property(node, name).as_ref() == Some(value) {
            continue;
        }
        host.set_property(node, name, value);
    }
}

fn apply_event(
    host: &mut dyn Host,
    node: NodeId,
    events: &Rc<EventNode>,
    name: &str,
    handler: Option<&Handler>,
) {
    let existing = host.listener(node, name);
    let Some(handler) = handler else {
        if existing.is_some() {
            host.remove_listener(node, name);
        }
        return;
    };

    if let Some(listener) = existing {
        if listener.kind() == handler.kind() {
            listener.replace_handler(handler.clone());
            return;
        }
        host.remove_listener(node, name);
    }

    let listener = Rc::new(Listener::new(handler.clone(), Rc::clone(events)));
    host.add_listener(node, name, listener, handler.kind().is_passive());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::events::Dispatcher;
    use crate::facts::{Fact, Facts};
    use crate::headless::HeadlessDom;
    use crate::node::{Widget, WidgetPatch};
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use vtree_core::decode::Decoder;
    use vtree_core::handler::HandlerKind;
    use vtree_core::message::{AnyMsg, Tagger};

    fn el(tag: &str, facts: Vec<Fact>, children: Vec<VNode>) -> VNode {
        VNode::element(tag, Facts::organize(facts), children)
    }

    fn text(s: &str) -> VNode {
        VNode::text(s)
    }

    fn on(event: &str, handler: Handler) -> Fact {
        Fact::Event {
            name: event.into(),
            handler,
        }
    }

    fn prop(name: &str, value: Value) -> Fact {
        Fact::Property {
            name: name.into(),
            value,
        }
    }

    struct Fixture {
        dom: HeadlessDom,
        root: NodeId,
        events: Rc<EventNode>,
        current: VNode,
        inbox: Rc<RefCell<Vec<AnyMsg>>>,
    }

    impl Fixture {
        fn new(tree: VNode) -> Self {
            let mut dom = HeadlessDom::new();
            let inbox: Rc<RefCell<Vec<AnyMsg>>> = Rc::default();
            let sink = Rc::clone(&inbox);
            let events = EventNode::root(Dispatcher::new(move |msg, _| sink.borrow_mut().push(msg)));
            let root = render(&mut dom, &tree, &events);
            Self {
                dom,
                root,
                events,
                current: tree,
                inbox,
            }
        }

        fn update(&mut self, next: VNode) {
            let patches = diff(&self.current, &next);
            self.root = apply_patches(&mut self.dom, self.root, &self.current, patches, &self.events)
                .expect("apply");
            assert!(self.dom.mirrors(self.root, &next), "live tree diverged from {next:?}");
            self.current = next;
        }
    }

    // ---- Rendering ----

    #[test]
    fn render_builds_markup() {
        let tree = el(
            "div",
            vec![Fact::Attribute {
                name: "id".into(),
                value: "main".into(),
            }],
            vec![text("hi"), el("b", vec![], vec![text("!")])],
        );
        let fx = Fixture::new(tree);
        assert_eq!(fx.dom.to_markup(fx.root), r#"<div id="main">hi<b>!</b></div>"#);
    }

    #[test]
    fn render_registers_passive_listeners() {
        let tree = el(
            "div",
            vec![
                on("click", Handler::Normal(Decoder::succeed(1u8)).erase()),
                on(
                    "submit",
                    Handler::MayPreventDefault(Decoder::succeed((1u8, true))).erase(),
                ),
            ],
            vec![],
        );
        let fx = Fixture::new(tree);
        assert_eq!(fx.dom.is_passive(fx.root, "click"), Some(true));
        assert_eq!(fx.dom.is_passive(fx.root, "submit"), Some(false));
    }

    // ---- Patching ----

    #[test]
    fn root_redraw_returns_new_root() {
        let mut fx = Fixture::new(el("div", vec![], vec![]));
        let before = fx.root;
        fx.update(el("section", vec![], vec![]));
        assert_ne!(fx.root, before);
        assert_eq!(fx.dom.to_markup(fx.root), "<section></section>");
    }

    #[test]
    fn tail_changes_round_trip() {
        let mut fx = Fixture::new(el("ul", vec![], vec![text("a"), text("b"), text("c")]));
        fx.update(el("ul", vec![], vec![text("a")]));
        fx.update(el("ul", vec![], vec![text("x"), text("y"), text("z")]));
        assert_eq!(fx.dom.to_markup(fx.root), "<ul>xyz</ul>");
    }

    #[test]
    fn keyed_swap_moves_the_live_node() {
        let list = |keys: &[&str]| {
            VNode::keyed(
                "ul",
                Facts::default(),
                keys.iter()
                    .map(|k| ((*k).to_owned(), el("li", vec![], vec![text(k)])))
                    .collect(),
            )
        };
        let mut fx = Fixture::new(list(&["a", "b", "c"]));
        let b_before = fx.dom.child_at(fx.root, 1).unwrap();
        fx.dom.reset_stats();
        fx.update(list(&["b", "a", "c"]));
        assert_eq!(fx.dom.child_at(fx.root, 0), Some(b_before));
        let stats = fx.dom.stats();
        assert_eq!(stats.created, 0);
    }

    #[test]
    fn keyed_reversal_reuses_every_node() {
        let list = |keys: &[&str]| {
            VNode::keyed(
                "ul",
                Facts::default(),
                keys.iter().map(|k| ((*k).to_owned(), text(k))).collect(),
            )
        };
        let mut fx = Fixture::new(list(&["a", "b", "c", "d"]));
        let before: Vec<_> = (0..4).map(|i| fx.dom.child_at(fx.root, i).unwrap()).collect();
        fx.dom.reset_stats();
        fx.update(list(&["d", "c", "b", "a"]));
        let after: Vec<_> = (0..4).map(|i| fx.dom.child_at(fx.root, i).unwrap()).collect();
        let mut reversed = before.clone();
        reversed.reverse();
        assert_eq!(after, reversed);
        assert_eq!(fx.dom.stats().created, 0);
    }

    #[test]
    fn user_edited_value_is_not_rewritten() {
        let input = |v: &str| el("input", vec![prop("value", json!(v))], vec![]);
        let mut fx = Fixture::new(input("a"));
        // The user types; the model catches up to the same value.
        fx.dom.set_property(fx.root, "value", &json!("ab"));
        fx.dom.reset_stats();
        fx.update(input("ab"));
        assert_eq!(fx.dom.stats().fact_writes, 0);
        assert_eq!(fx.dom.property(fx.root, "value"), Some(json!("ab")));
    }

    #[test]
    fn same_kind_handler_is_rebound_in_place() {
        let button = |n: u8| el("button", vec![on("click", Handler::Normal(Decoder::succeed(n)).erase())], vec![]);
        let mut fx = Fixture::new(button(1));
        let listener = fx.dom.listener(fx.root, "click").unwrap();
        fx.dom.reset_stats();
        fx.update(button(2));
        let after = fx.dom.listener(fx.root, "click").unwrap();
        assert!(Rc::ptr_eq(&listener, &after));
        assert_eq!(fx.dom.stats().listeners_added, 0);

        fx.dom.fire(fx.root, "click", &Value::Null);
        assert_eq!(fx.inbox.borrow()[0].downcast_ref::<u8>(), Some(&2));
    }

    #[test]
    fn kind_change_rebinds_listener() {
        let plain = el("a", vec![on("click", Handler::Normal(Decoder::succeed(1u8)).erase())], vec![]);
        let preventing = el(
            "a",
            vec![on(
                "click",
                Handler::MayPreventDefault(Decoder::succeed((1u8, true))).erase(),
            )],
            vec![],
        );
        let mut fx = Fixture::new(plain);
        fx.update(preventing);
        let listener = fx.dom.listener(fx.root, "click").unwrap();
        assert_eq!(listener.kind(), HandlerKind::MayPreventDefault);
        assert_eq!(fx.dom.is_passive(fx.root, "click"), Some(false));
    }

    #[test]
    fn replace_taggers_retargets_rendered_listeners() {
        fn first(x: u8) -> u16 {
            u16::from(x)
        }
        fn second(x: u8) -> u16 {
            u16::from(x) + 100
        }
        let view = |tagger: fn(u8) -> u16| {
            el(
                "div",
                vec![],
                vec![VNode::tagged(
                    Tagger::from_fn(tagger),
                    el("button", vec![on("click", Handler::Normal(Decoder::succeed(7u8)).erase())], vec![]),
                )],
            )
        };
        let mut fx = Fixture::new(view(first));
        fx.update(view(second));
        let button = fx.dom.child_at(fx.root, 0).unwrap();
        fx.dom.fire(button, "click", &Value::Null);
        assert_eq!(fx.inbox.borrow()[0].downcast_ref::<u16>(), Some(&107));
    }

    #[test]
    fn unindexed_patch_is_an_error() {
        let old = el("div", vec![], vec![text("a")]);
        let new = el("div", vec![], vec![text("b")]);
        let mut dom = HeadlessDom::new();
        let events = EventNode::root(Dispatcher::ignore());
        let root = dom.create_element("div", None);
        let err = apply_patches(&mut dom, root, &old, diff(&old, &new), &events).unwrap_err();
        assert_eq!(
            err,
            ApplyError::Unindexed {
                index: 1,
                kind: "replace-text"
            }
        );
        assert_eq!(err.to_string(), "no live node for replace-text patch at index 1");
    }

    #[test]
    fn tail_removal_past_the_live_children_is_an_error() {
        let old = el("ul", vec![], vec![text("a"), text("b"), text("c")]);
        let new = el("ul", vec![], vec![text("a")]);
        let mut fx = Fixture::new(old.clone());
        let last = fx.dom.child_at(fx.root, 2).unwrap();
        fx.dom.remove_child(fx.root, last);

        let err = apply_patches(&mut fx.dom, fx.root, &old, diff(&old, &new), &fx.events).unwrap_err();
        assert_eq!(err, ApplyError::MissingChild { index: 0, position: 2 });
        assert_eq!(err.to_string(), "no live child at position 2 for patch at index 0");
    }

    // ---- Widgets ----

    /// Renders a fresh `<output>` whenever its value changes.
    struct Readout(u8);

    impl Widget for Readout {
        fn render(&self, host: &mut dyn Host) -> NodeId {
            let node = host.create_element("output", None);
            host.set_attribute(node, "value", &self.0.to_string());
            node
        }

        fn diff(&self, previous: &dyn Widget) -> Option<WidgetPatch> {
            let previous = previous.as_any().downcast_ref::<Readout>()?;
            if previous.0 == self.0 {
                return None;
            }
            let value = self.0;
            Some(WidgetPatch::new(move |host, _| Readout(value).render(host)))
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn replaced_widget_keeps_its_tagging_record() {
        fn widen(x: u8) -> u16 {
            u16::from(x)
        }
        let view = |n: u8| {
            el(
                "div",
                vec![],
                vec![VNode::tagged(
                    Tagger::from_fn(widen),
                    VNode::custom(Facts::default(), Readout(n)),
                )],
            )
        };
        let mut fx = Fixture::new(view(1));
        let before = fx.dom.child_at(fx.root, 0).unwrap();
        let record = fx.dom.event_root(before).unwrap();

        fx.update(view(2));
        let after = fx.dom.child_at(fx.root, 0).unwrap();
        assert_ne!(after, before);
        assert_eq!(fx.dom.attribute(after, "value"), Some("2"));
        assert!(Rc::ptr_eq(&fx.dom.event_root(after).unwrap(), &record));
    }

    #[test]
    fn colliding_click_messages_still_rebind() {
        // Both tuples hash alike under FxHash.
        let button = |msg: (u64, u64)| el("button", vec![on("click", Handler::Normal(Decoder::succeed(msg)).erase())], vec![]);
        let mut fx = Fixture::new(button((1, 0)));
        fx.update(button((0, 0xf135_7aea_2e62_a9c5)));

        fx.dom.fire(fx.root, "click", &Value::Null);
        assert_eq!(
            fx.inbox.borrow()[0].downcast_ref::<(u64, u64)>(),
            Some(&(0, 0xf135_7aea_2e62_a9c5))
        );
    }
}
