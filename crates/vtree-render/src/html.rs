#![forbid(unsafe_code)]

//! Typed view builders.
//!
//! [`Html<M>`] is a [`VNode`] that only produces messages of type `M`.
//! The type parameter is erased at this boundary: every handler is stored as
//! a `Handler<AnyMsg>` and [`Html::map`] inserts a tagging node whose tagger
//! downcasts and re-boxes.
//!
//! # Usage
//!
//! ```
//! use vtree_render::html::{Attribute, Html};
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! enum Msg {
//!     Increment,
//! }
//!
//! fn view(count: u32) -> Html<Msg> {
//!     Html::node(
//!         "div",
//!         vec![Attribute::class("counter")],
//!         vec![
//!             Html::text(count.to_string()),
//!             Html::node("button", vec![Attribute::on_click(Msg::Increment)], vec![Html::text("+")]),
//!         ],
//!     )
//! }
//!
//! assert_eq!(view(3).as_node().descendants(), 3);
//! ```

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use serde_json::Value;
use vtree_core::decode::Decoder;
use vtree_core::handler::Handler;
use vtree_core::message::Tagger;

use crate::facts::{Fact, Facts};
use crate::node::{Token, VNode, Widget};

const TARGET_VALUE: &[&str] = &["target", "value"];
const TARGET_CHECKED: &[&str] = &["target", "checked"];

/// A virtual node producing messages of type `M`.
pub struct Html<M> {
    node: VNode,
    _msg: PhantomData<fn() -> M>,
}

impl<M> Clone for Html<M> {
    fn clone(&self) -> Self {
        Self::wrap(self.node.clone())
    }
}

impl<M> fmt::Debug for Html<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.fmt(f)
    }
}

impl<M> From<Html<M>> for VNode {
    fn from(html: Html<M>) -> Self {
        html.node
    }
}

impl<M> Html<M> {
    fn wrap(node: VNode) -> Self {
        Self {
            node,
            _msg: PhantomData,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::wrap(VNode::text(content))
    }

    pub fn node(tag: impl Into<String>, attributes: Vec<Attribute<M>>, children: Vec<Html<M>>) -> Self {
        Self::wrap(VNode::element(
            tag,
            organize(attributes),
            children.into_iter().map(Html::into_node).collect(),
        ))
    }

    pub fn node_ns(
        namespace: impl Into<String>,
        tag: impl Into<String>,
        attributes: Vec<Attribute<M>>,
        children: Vec<Html<M>>,
    ) -> Self {
        Self::wrap(VNode::element_ns(
            namespace,
            tag,
            organize(attributes),
            children.into_iter().map(Html::into_node).collect(),
        ))
    }

    /// Element whose children are tracked by key across renders.
    pub fn keyed(
        tag: impl Into<String>,
        attributes: Vec<Attribute<M>>,
        children: Vec<(String, Html<M>)>,
    ) -> Self {
        Self::wrap(VNode::keyed(
            tag,
            organize(attributes),
            children
                .into_iter()
                .map(|(key, child)| (key, child.into_node()))
                .collect(),
        ))
    }

    pub fn custom(attributes: Vec<Attribute<M>>, widget: impl Widget) -> Self {
        Self::wrap(VNode::custom(organize(attributes), widget))
    }

    /// Memoized subtree. `view` runs only when some token in `refs` differs
    /// from the previous render's.
    pub fn lazy(refs: Vec<Token>, view: impl Fn() -> Html<M> + 'static) -> Self {
        Self::wrap(VNode::lazy(refs, move || view().into_node()))
    }

    #[inline]
    #[must_use]
    pub fn as_node(&self) -> &VNode {
        &self.node
    }

    #[inline]
    #[must_use]
    pub fn into_node(self) -> VNode {
        self.node
    }
}

impl<M: 'static> Html<M> {
    /// Translate every message of this subtree with `f`.
    pub fn map<N: 'static>(self, f: fn(M) -> N) -> Html<N> {
        Html::wrap(VNode::tagged(Tagger::from_fn(f), self.node))
    }

    /// Translate with a prebuilt tagger. The tagger must map `M` to `N`.
    pub fn map_with<N: 'static>(self, tagger: Tagger) -> Html<N> {
        Html::wrap(VNode::tagged(tagger, self.node))
    }
}

fn organize<M>(attributes: Vec<Attribute<M>>) -> Facts {
    Facts::organize(attributes.into_iter().map(|attr| attr.fact))
}

/// One fact of an [`Html<M>`] node.
pub struct Attribute<M> {
    fact: Fact,
    _msg: PhantomData<fn() -> M>,
}

impl<M> fmt::Debug for Attribute<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fact.fmt(f)
    }
}

impl<M> Attribute<M> {
    fn wrap(fact: Fact) -> Self {
        Self {
            fact,
            _msg: PhantomData,
        }
    }

    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::wrap(Fact::Attribute {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn attribute_ns(
        namespace: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::wrap(Fact::AttributeNs {
            namespace: namespace.into(),
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn style(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::wrap(Fact::Style {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn property(name: impl Into<String>, value: Value) -> Self {
        Self::wrap(Fact::Property {
            name: name.into(),
            value,
        })
    }

    /// `class` attribute. Several of these on one node are joined.
    pub fn class(name: impl Into<String>) -> Self {
        Self::attribute("class", name)
    }

    #[must_use]
    pub fn into_fact(self) -> Fact {
        self.fact
    }
}

impl<M: 'static> Attribute<M> {
    /// Listen for `event`, producing whatever `decoder` yields.
    pub fn on(event: impl Into<String>, decoder: Decoder<M>) -> Self {
        Self::on_with(event, Handler::Normal(decoder))
    }

    /// Listen for `event` with a handler of any kind.
    pub fn on_with(event: impl Into<String>, handler: Handler<M>) -> Self {
        Self::wrap(Fact::Event {
            name: event.into(),
            handler: handler.erase(),
        })
    }

    pub fn on_click(msg: M) -> Self
    where
        M: Clone + Hash + PartialEq,
    {
        Self::on("click", Decoder::succeed(msg))
    }

    /// `input` events, reading `target.value`. Stops propagation so the
    /// resulting render lands before the host resumes.
    pub fn on_input(f: fn(String) -> M) -> Self {
        let decoder = Decoder::at_string(TARGET_VALUE, f).map(always_stop::<M>);
        Self::on_with("input", Handler::MayStopPropagation(decoder))
    }

    /// `change` events, reading `target.checked`.
    pub fn on_check(f: fn(bool) -> M) -> Self {
        Self::on("change", Decoder::at_bool(TARGET_CHECKED, f))
    }

    /// Translate the messages of an event attribute with `f`. Other facts
    /// pass through.
    pub fn map<N: 'static>(self, f: fn(M) -> N) -> Attribute<N> {
        let fact = match self.fact {
            Fact::Event { name, handler } => Fact::Event {
                name,
                handler: handler.map_with(Tagger::from_fn(f)),
            },
            other => other,
        };
        Attribute::wrap(fact)
    }
}

fn always_stop<M>(msg: M) -> (M, bool) {
    (msg, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use serde_json::json;
    use vtree_core::handler::{EventFlags, HandlerKind};
    use vtree_core::message::AnyMsg;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Child {
        Typed(String),
        Toggled(bool),
        Click,
    }

    #[derive(Debug, PartialEq)]
    enum Parent {
        Child(Child),
    }

    fn event_handler(node: &VNode, name: &str) -> Handler<AnyMsg> {
        let NodeKind::Element(el) = node.kind() else {
            panic!("expected element, got {node:?}");
        };
        el.facts().events()[name].clone()
    }

    #[test]
    fn classes_merge() {
        let html: Html<Child> = Html::node("p", vec![Attribute::class("a"), Attribute::class("b")], vec![]);
        let NodeKind::Element(el) = html.as_node().kind() else {
            panic!("expected element");
        };
        assert_eq!(el.facts().attributes()["class"], "a b");
    }

    #[test]
    fn on_input_reads_target_value() {
        let html: Html<Child> = Html::node("input", vec![Attribute::on_input(Child::Typed)], vec![]);
        let handler = event_handler(html.as_node(), "input");
        assert_eq!(handler.kind(), HandlerKind::MayStopPropagation);
        let (msg, flags) = handler.run(&json!({"target": {"value": "hi"}})).unwrap();
        assert_eq!(msg.downcast_ref::<Child>(), Some(&Child::Typed("hi".into())));
        assert_eq!(flags, EventFlags::STOP_PROPAGATION);
        assert!(handler.run(&json!({"target": {}})).is_err());
    }

    #[test]
    fn on_check_reads_target_checked() {
        let html: Html<Child> = Html::node("input", vec![Attribute::on_check(Child::Toggled)], vec![]);
        let handler = event_handler(html.as_node(), "change");
        let (msg, _) = handler.run(&json!({"target": {"checked": true}})).unwrap();
        assert_eq!(msg.downcast_ref::<Child>(), Some(&Child::Toggled(true)));
    }

    #[test]
    fn rebuilt_handlers_are_equivalent() {
        let a = Attribute::<Child>::on_input(Child::Typed).into_fact();
        let b = Attribute::<Child>::on_input(Child::Typed).into_fact();
        let (Fact::Event { handler: a, .. }, Fact::Event { handler: b, .. }) = (a, b) else {
            panic!("expected events");
        };
        assert!(a.equivalent(&b));
    }

    #[test]
    fn map_inserts_a_tagging_node() {
        let child: Html<Child> = Html::text("x");
        let parent: Html<Parent> = child.map(Parent::Child);
        let NodeKind::Tagged(tagged) = parent.as_node().kind() else {
            panic!("expected tagged");
        };
        let out = tagged.tagger().apply(Box::new(Child::Click));
        assert_eq!(out.downcast_ref::<Parent>(), Some(&Parent::Child(Child::Click)));
    }

    #[test]
    fn attribute_map_wraps_event_messages() {
        let attr: Attribute<Parent> = Attribute::on_click(Child::Click).map(Parent::Child);
        let Fact::Event { handler, .. } = attr.into_fact() else {
            panic!("expected event");
        };
        let (msg, _) = handler.run(&Value::Null).unwrap();
        assert_eq!(msg.downcast_ref::<Parent>(), Some(&Parent::Child(Child::Click)));
    }

    #[test]
    fn attribute_map_keeps_plain_facts() {
        let attr: Attribute<Parent> = Attribute::<Child>::style("color", "red").map(Parent::Child);
        assert!(matches!(attr.into_fact(), Fact::Style { ref value, .. } if value == "red"));
    }
}
