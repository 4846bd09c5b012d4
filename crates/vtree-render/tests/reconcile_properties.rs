//! Property tests for the differ and applier.
//!
//! Trees are generated from a plain-data [`Shape`] so failures shrink to a
//! readable description. Lazy subtrees are a pure function of their token,
//! which is what the lazy short-circuit assumes of application views.

use proptest::prelude::*;
use serde_json::json;
use vtree_core::decode::Decoder;
use vtree_core::handler::Handler;
use vtree_core::message::Tagger;
use vtree_render::apply::{apply_patches, render};
use vtree_render::diff::diff;
use vtree_render::events::{Dispatcher, EventNode};
use vtree_render::facts::{Fact, Facts};
use vtree_render::headless::HeadlessDom;
use vtree_render::node::{Token, VNode};

const TAGS: [&str; 3] = ["div", "span", "p"];
const ATTRS: [&str; 3] = ["id", "title", "class"];

#[derive(Debug, Clone)]
enum Shape {
    Text(u8),
    Element {
        tag: usize,
        attrs: Vec<(usize, u8)>,
        color: Option<u8>,
        value: Option<u8>,
        click: Option<u8>,
        children: Vec<Shape>,
    },
    Keyed {
        tag: usize,
        children: Vec<(u8, Shape)>,
    },
    Tagged {
        alternate: bool,
        inner: Box<Shape>,
    },
    Lazy(u8),
}

fn plus_one(x: u8) -> u8 {
    x.wrapping_add(1)
}

fn times_two(x: u8) -> u8 {
    x.wrapping_mul(2)
}

fn lazy_body(seed: u8) -> VNode {
    VNode::element(
        "section",
        Facts::organize([Fact::Attribute {
            name: "data-seed".into(),
            value: seed.to_string(),
        }]),
        (0..seed % 3).map(|i| VNode::text(format!("{seed}:{i}"))).collect(),
    )
}

fn build(shape: &Shape) -> VNode {
    match shape {
        Shape::Text(n) => VNode::text(n.to_string()),
        Shape::Element {
            tag,
            attrs,
            color,
            value,
            click,
            children,
        } => {
            let mut facts: Vec<Fact> = attrs
                .iter()
                .map(|(name, value)| Fact::Attribute {
                    name: ATTRS[*name].into(),
                    value: value.to_string(),
                })
                .collect();
            if let Some(color) = color {
                facts.push(Fact::Style {
                    name: "color".into(),
                    value: format!("#{color:02x}"),
                });
            }
            if let Some(value) = value {
                facts.push(Fact::Property {
                    name: "value".into(),
                    value: json!(value.to_string()),
                });
            }
            if let Some(msg) = click {
                facts.push(Fact::Event {
                    name: "click".into(),
                    handler: Handler::Normal(Decoder::succeed(*msg)).erase(),
                });
            }
            VNode::element(
                TAGS[*tag],
                Facts::organize(facts),
                children.iter().map(build).collect(),
            )
        }
        Shape::Keyed { tag, children } => VNode::keyed(
            TAGS[*tag],
            Facts::default(),
            children
                .iter()
                .map(|(key, child)| (format!("k{key}"), build(child)))
                .collect(),
        ),
        Shape::Tagged { alternate, inner } => {
            let tagger = if *alternate {
                Tagger::from_fn(times_two)
            } else {
                Tagger::from_fn(plus_one)
            };
            VNode::tagged(tagger, build(inner))
        }
        Shape::Lazy(seed) => {
            let seed = *seed;
            VNode::lazy(vec![Token::value(seed)], move || lazy_body(seed))
        }
    }
}

/// Keys drawn from a small range so duplicates and reorders are common.
fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        (0u8..6).prop_map(Shape::Text),
        (0u8..4).prop_map(Shape::Lazy),
    ];
    leaf.prop_recursive(4, 32, 5, |inner| {
        prop_oneof![
            (
                0..TAGS.len(),
                prop::collection::vec((0..ATTRS.len(), 0u8..3), 0..3),
                prop::option::of(0u8..3),
                prop::option::of(0u8..3),
                prop::option::of(0u8..2),
                prop::collection::vec(inner.clone(), 0..5),
            )
                .prop_map(|(tag, attrs, color, value, click, children)| Shape::Element {
                    tag,
                    attrs,
                    color,
                    value,
                    click,
                    children,
                }),
            (0..TAGS.len(), prop::collection::vec((0u8..6, inner.clone()), 0..6))
                .prop_map(|(tag, children)| Shape::Keyed { tag, children }),
            (any::<bool>(), inner).prop_map(|(alternate, inner)| Shape::Tagged {
                alternate,
                inner: Box::new(inner),
            }),
        ]
    })
}

fn round_trip(old: &VNode, new: &VNode) -> Result<(), TestCaseError> {
    let mut dom = HeadlessDom::new();
    let events = EventNode::root(Dispatcher::ignore());
    let root = render(&mut dom, old, &events);
    prop_assert!(dom.mirrors(root, old), "fresh render does not mirror {old:?}");

    let patches = diff(old, new);
    let root = apply_patches(&mut dom, root, old, patches, &events)
        .map_err(|err| TestCaseError::fail(err.to_string()))?;
    prop_assert!(dom.mirrors(root, new), "patched tree does not mirror {new:?}");
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// A tree diffed against its deep copy yields nothing.
    #[test]
    fn diff_against_deep_copy_is_empty(s in shape()) {
        let tree = build(&s);
        prop_assert!(diff(&tree, &tree.deep_clone()).is_empty());
    }

    /// Rebuilding from the same description also yields nothing.
    #[test]
    fn diff_against_rebuild_is_empty(s in shape()) {
        prop_assert!(diff(&build(&s), &build(&s)).is_empty());
    }

    /// Applying a diff to a live rendering of the old tree produces a live
    /// rendering of the new one.
    #[test]
    fn patches_round_trip(a in shape(), b in shape()) {
        round_trip(&build(&a), &build(&b))?;
    }

    /// Three successive renders keep the live tree in step, so adopted lazy
    /// caches and carried event roots stay consistent.
    #[test]
    fn successive_updates_round_trip(a in shape(), b in shape(), c in shape()) {
        let trees = [build(&a), build(&b), build(&c)];
        let mut dom = HeadlessDom::new();
        let events = EventNode::root(Dispatcher::ignore());
        let mut root = render(&mut dom, &trees[0], &events);
        for pair in trees.windows(2) {
            let patches = diff(&pair[0], &pair[1]);
            root = apply_patches(&mut dom, root, &pair[0], patches, &events)
                .map_err(|err| TestCaseError::fail(err.to_string()))?;
            prop_assert!(dom.mirrors(root, &pair[1]));
        }
    }

    /// Keyed lists with repeated keys, diffed against any permutation of
    /// themselves, terminate and apply cleanly.
    #[test]
    fn duplicate_keys_terminate(
        keys in prop::collection::vec(0u8..3, 0..10),
        order in any::<u64>(),
    ) {
        let children: Vec<(String, VNode)> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| (format!("k{key}"), VNode::text(i.to_string())))
            .collect();
        let mut shuffled = children.clone();
        let len = shuffled.len().max(1) as u64;
        shuffled.rotate_left((order % len) as usize);
        if order % 2 == 0 {
            shuffled.reverse();
        }
        let old = VNode::keyed("ul", Facts::default(), children);
        let new = VNode::keyed("ul", Facts::default(), shuffled);
        round_trip(&old, &new)?;
    }
}

#[test]
fn tagged_subtree_round_trips_with_listeners() {
    let old = build(&Shape::Tagged {
        alternate: false,
        inner: Box::new(Shape::Element {
            tag: 0,
            attrs: vec![],
            color: None,
            value: None,
            click: Some(1),
            children: vec![Shape::Text(1)],
        }),
    });
    let new = build(&Shape::Tagged {
        alternate: true,
        inner: Box::new(Shape::Text(2)),
    });
    let mut dom = HeadlessDom::new();
    let events = EventNode::root(Dispatcher::ignore());
    let root = render(&mut dom, &old, &events);
    let patches = diff(&old, &new);
    let root = apply_patches(&mut dom, root, &old, patches, &events).unwrap();
    assert!(dom.mirrors(root, &new));
}
