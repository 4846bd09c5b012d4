#![forbid(unsafe_code)]

//! Element facts: listeners, styles, attributes, and properties.
//!
//! Facts are organized once, when a node is built, into per-category maps.
//! [`diff_facts`] compares two organized sets and produces a [`FactsDiff`]
//! carrying only what the live node needs to change.
//!
//! # Removal sentinels
//!
//! | Category             | Removed entry becomes                    |
//! |----------------------|------------------------------------------|
//! | listener             | `None` (unbind)                          |
//! | style                | `""`                                     |
//! | attribute            | `None` (remove attribute)                |
//! | namespaced attribute | namespace kept, value `None`             |
//! | property             | `""` if the old value was a string, else `null` |
//!
//! Properties compare by value like every other category. Users can edit
//! `value` and `checked` behind the engine's back, so the applier compares
//! those two against the live value before writing.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use vtree_core::handler::Handler;

/// Attribute whose repeated occurrences are merged instead of overwritten.
const CLASS_ATTRIBUTE: &str = "class";
/// Property counterpart of [`CLASS_ATTRIBUTE`].
const CLASS_PROPERTY: &str = "className";

/// One unorganized fact, as produced by attribute builders.
#[derive(Clone)]
pub enum Fact {
    Event { name: String, handler: Handler },
    Style { name: String, value: String },
    Attribute { name: String, value: String },
    AttributeNs { namespace: String, name: String, value: String },
    Property { name: String, value: Value },
}

impl fmt::Debug for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event { name, handler } => write!(f, "on {name}: {handler:?}"),
            Self::Style { name, value } => write!(f, "style {name}: {value}"),
            Self::Attribute { name, value } => write!(f, "attr {name}={value:?}"),
            Self::AttributeNs { namespace, name, value } => {
                write!(f, "attr {{{namespace}}}{name}={value:?}")
            }
            Self::Property { name, value } => write!(f, "prop {name}={value}"),
        }
    }
}

/// A namespaced attribute value. `None` clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsValue {
    pub namespace: String,
    pub value: Option<String>,
}

/// Organized facts of one node. Later duplicates win, except for class
/// names, which are joined with a space.
#[derive(Debug, Clone, Default)]
pub struct Facts {
    events: BTreeMap<String, Handler>,
    styles: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
    attributes_ns: BTreeMap<String, NsValue>,
    properties: BTreeMap<String, Value>,
}

fn merge_class(existing: Option<&str>, value: &str) -> String {
    match existing {
        Some(prev) if !prev.is_empty() => format!("{prev} {value}"),
        _ => value.to_owned(),
    }
}

impl Facts {
    /// Organize a flat fact list.
    pub fn organize(facts: impl IntoIterator<Item = Fact>) -> Self {
        let mut out = Facts::default();
        for fact in facts {
            match fact {
                Fact::Event { name, handler } => {
                    out.events.insert(name, handler);
                }
                Fact::Style { name, value } => {
                    out.styles.insert(name, value);
                }
                Fact::Attribute { name, value } => {
                    let value = if name == CLASS_ATTRIBUTE {
                        merge_class(out.attributes.get(&name).map(String::as_str), &value)
                    } else {
                        value
                    };
                    out.attributes.insert(name, value);
                }
                Fact::AttributeNs {
                    namespace,
                    name,
                    value,
                } => {
                    out.attributes_ns.insert(
                        name,
                        NsValue {
                            namespace,
                            value: Some(value),
                        },
                    );
                }
                Fact::Property { name, value } => {
                    let value = match value {
                        Value::String(class) if name == CLASS_PROPERTY => {
                            let prev = out.properties.get(&name).and_then(Value::as_str);
                            Value::String(merge_class(prev, &class))
                        }
                        other => other,
                    };
                    out.properties.insert(name, value);
                }
            }
        }
        out
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.styles.is_empty()
            && self.attributes.is_empty()
            && self.attributes_ns.is_empty()
            && self.properties.is_empty()
    }

    #[must_use]
    pub fn events(&self) -> &BTreeMap<String, Handler> {
        &self.events
    }

    #[must_use]
    pub fn styles(&self) -> &BTreeMap<String, String> {
        &self.styles
    }

    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    #[must_use]
    pub fn attributes_ns(&self) -> &BTreeMap<String, NsValue> {
        &self.attributes_ns
    }

    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Every fact as an addition, for initial render.
    #[must_use]
    pub fn to_full_diff(&self) -> FactsDiff {
        FactsDiff {
            events: self
                .events
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.clone())))
                .collect(),
            styles: self.styles.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            attributes: self
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.clone())))
                .collect(),
            attributes_ns: self
                .attributes_ns
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            properties: self
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Per-category changes between two fact sets.
#[derive(Debug, Clone, Default)]
pub struct FactsDiff {
    pub events: Vec<(String, Option<Handler>)>,
    pub styles: Vec<(String, String)>,
    pub attributes: Vec<(String, Option<String>)>,
    pub attributes_ns: Vec<(String, NsValue)>,
    pub properties: Vec<(String, Value)>,
}

impl FactsDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.styles.is_empty()
            && self.attributes.is_empty()
            && self.attributes_ns.is_empty()
            && self.properties.is_empty()
    }

    /// Total number of entries across categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
            + self.styles.len()
            + self.attributes.len()
            + self.attributes_ns.len()
            + self.properties.len()
    }
}

/// Compare one category. Changed and removed entries come first in key
/// order, then additions.
fn diff_category<V, O>(
    old: &BTreeMap<String, V>,
    new: &BTreeMap<String, V>,
    out: &mut Vec<(String, O)>,
    changed: impl Fn(&str, &V, &V) -> bool,
    removed: impl Fn(&V) -> O,
    current: impl Fn(&V) -> O,
) {
    for (key, old_value) in old {
        match new.get(key) {
            None => out.push((key.clone(), removed(old_value))),
            Some(new_value) if changed(key, old_value, new_value) => {
                out.push((key.clone(), current(new_value)));
            }
            Some(_) => {}
        }
    }
    for (key, new_value) in new {
        if !old.contains_key(key) {
            out.push((key.clone(), current(new_value)));
        }
    }
}

/// Changes needed to turn `old` into `new`, or `None` when there are none.
#[must_use]
pub fn diff_facts(old: &Facts, new: &Facts) -> Option<FactsDiff> {
    let mut diff = FactsDiff::default();

    diff_category(
        &old.events,
        &new.events,
        &mut diff.events,
        |_, a, b| !a.equivalent(b),
        |_| None,
        |h| Some(h.clone()),
    );
    diff_category(
        &old.styles,
        &new.styles,
        &mut diff.styles,
        |_, a, b| a != b,
        |_| String::new(),
        Clone::clone,
    );
    diff_category(
        &old.attributes,
        &new.attributes,
        &mut diff.attributes,
        |_, a, b| a != b,
        |_| None,
        |v| Some(v.clone()),
    );
    diff_category(
        &old.attributes_ns,
        &new.attributes_ns,
        &mut diff.attributes_ns,
        |_, a, b| a != b,
        |v| NsValue {
            namespace: v.namespace.clone(),
            value: None,
        },
        Clone::clone,
    );
    diff_category(
        &old.properties,
        &new.properties,
        &mut diff.properties,
        |_, a, b| a != b,
        |v| match v {
            Value::String(_) => Value::String(String::new()),
            _ => Value::Null,
        },
        Clone::clone,
    );

    if diff.is_empty() { None } else { Some(diff) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vtree_core::decode::Decoder;

    fn attr(name: &str, value: &str) -> Fact {
        Fact::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    fn style(name: &str, value: &str) -> Fact {
        Fact::Style {
            name: name.into(),
            value: value.into(),
        }
    }

    fn prop(name: &str, value: Value) -> Fact {
        Fact::Property {
            name: name.into(),
            value,
        }
    }

    fn click(msg: u8) -> Fact {
        Fact::Event {
            name: "click".into(),
            handler: Handler::Normal(Decoder::succeed(msg)).erase(),
        }
    }

    // ---- Organizing ----

    #[test]
    fn later_duplicates_win() {
        let facts = Facts::organize([attr("id", "a"), attr("id", "b")]);
        assert_eq!(facts.attributes().get("id").map(String::as_str), Some("b"));
    }

    #[test]
    fn class_attributes_merge() {
        let facts = Facts::organize([attr("class", "a"), attr("id", "x"), attr("class", "b")]);
        assert_eq!(facts.attributes().get("class").map(String::as_str), Some("a b"));
    }

    #[test]
    fn class_name_properties_merge() {
        let facts = Facts::organize([
            prop("className", json!("a")),
            prop("className", json!("b")),
        ]);
        assert_eq!(facts.properties().get("className"), Some(&json!("a b")));
    }

    // ---- Diffing ----

    #[test]
    fn identical_facts_have_no_diff() {
        let a = Facts::organize([attr("id", "x"), style("color", "red"), click(1)]);
        let b = Facts::organize([attr("id", "x"), style("color", "red"), click(1)]);
        assert!(diff_facts(&a, &b).is_none());
    }

    #[test]
    fn changes_removals_and_additions() {
        let old = Facts::organize([attr("id", "x"), attr("title", "t"), style("color", "red")]);
        let new = Facts::organize([attr("id", "y"), style("width", "1px")]);
        let diff = diff_facts(&old, &new).unwrap();
        assert_eq!(
            diff.attributes,
            vec![("id".to_owned(), Some("y".to_owned())), ("title".to_owned(), None)]
        );
        assert_eq!(
            diff.styles,
            vec![
                ("color".to_owned(), String::new()),
                ("width".to_owned(), "1px".to_owned())
            ]
        );
        assert_eq!(diff.len(), 4);
    }

    #[test]
    fn property_removal_sentinel_follows_old_type() {
        let old = Facts::organize([prop("title", json!("t")), prop("tabIndex", json!(3))]);
        let diff = diff_facts(&old, &Facts::default()).unwrap();
        assert_eq!(
            diff.properties,
            vec![
                ("tabIndex".to_owned(), Value::Null),
                ("title".to_owned(), json!("")),
            ]
        );
    }

    #[test]
    fn unchanged_value_and_checked_have_no_diff() {
        let a = Facts::organize([prop("value", json!("x")), prop("checked", json!(true))]);
        let b = Facts::organize([prop("value", json!("x")), prop("checked", json!(true))]);
        assert!(diff_facts(&a, &b).is_none());

        let c = Facts::organize([prop("value", json!("y")), prop("checked", json!(true))]);
        let diff = diff_facts(&a, &c).unwrap();
        assert_eq!(diff.properties, vec![("value".to_owned(), json!("y"))]);
    }

    #[test]
    fn handler_change_is_reported() {
        let a = Facts::organize([click(1)]);
        let b = Facts::organize([click(2)]);
        let diff = diff_facts(&a, &b).unwrap();
        assert_eq!(diff.events.len(), 1);
        assert!(diff.events[0].1.is_some());

        let removed = diff_facts(&a, &Facts::default()).unwrap();
        assert!(removed.events[0].1.is_none());
    }

    #[test]
    fn namespaced_removal_keeps_namespace() {
        let old = Facts::organize([Fact::AttributeNs {
            namespace: "http://www.w3.org/1999/xlink".into(),
            name: "href".into(),
            value: "#a".into(),
        }]);
        let diff = diff_facts(&old, &Facts::default()).unwrap();
        assert_eq!(
            diff.attributes_ns,
            vec![(
                "href".to_owned(),
                NsValue {
                    namespace: "http://www.w3.org/1999/xlink".into(),
                    value: None
                }
            )]
        );
    }

    #[test]
    fn full_diff_lists_everything() {
        let facts = Facts::organize([attr("id", "x"), style("color", "red"), click(1)]);
        let full = facts.to_full_diff();
        assert_eq!(full.len(), 3);
        assert!(!full.is_empty());
    }
}
