#![forbid(unsafe_code)]

//! Event payload decoders.
//!
//! A [`Decoder`] turns the raw payload a host hands to a listener (a
//! `serde_json::Value`) into a value, or rejects it with a [`DecodeError`].
//!
//! Decoders are rebuilt on every render, so the differ cannot compare them by
//! allocation. Each decoder carries a [`Fingerprint`] instead: decoders built
//! by the same constructor from equal arguments share a structural
//! fingerprint, and decoders wrapping an arbitrary closure are identified by
//! that closure's allocation. Structural fingerprints keep the arguments and
//! compare them with `PartialEq`; the hash only short-circuits mismatches.
//!
//! # Usage
//!
//! ```
//! use serde_json::json;
//! use vtree_core::decode::Decoder;
//!
//! fn typed(text: String) -> usize {
//!     text.len()
//! }
//!
//! let input = Decoder::at_string(&["target", "value"], typed);
//! assert_eq!(input.decode(&json!({ "target": { "value": "abc" } })), Ok(3));
//! assert!(input.decode(&json!({ "target": {} })).is_err());
//!
//! // Equal construction, equal fingerprint.
//! let again = Decoder::at_string(&["target", "value"], typed);
//! assert_eq!(input.fingerprint(), again.fingerprint());
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHasher;
use serde_json::Value;

/// Why a payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    path: Vec<String>,
    reason: String,
}

impl DecodeError {
    /// Rejection at the payload root.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            reason: reason.into(),
        }
    }

    /// Rejection at a field path.
    pub fn at(path: &[&str], reason: impl Into<String>) -> Self {
        Self {
            path: path.iter().map(|s| (*s).to_owned()).collect(),
            reason: reason.into(),
        }
    }

    /// Field path that failed, outermost first. Empty for the root.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "decode failed: {}", self.reason)
        } else {
            write!(f, "decode failed at {}: {}", self.path.join("."), self.reason)
        }
    }
}

impl std::error::Error for DecodeError {}

/// Comparable identity of a decoder.
#[derive(Clone)]
pub struct Fingerprint(Repr);

#[derive(Clone)]
enum Repr {
    /// Address of the closure allocation behind the decoder.
    Identity(usize),
    /// The constructor and its arguments.
    Structural {
        hash: u64,
        key: Rc<dyn Any>,
        eq: fn(&dyn Any, &dyn Any) -> bool,
    },
}

impl Fingerprint {
    /// Fingerprint of something identified by address alone.
    pub(crate) fn identity(addr: usize) -> Self {
        Self(Repr::Identity(addr))
    }

    /// Whether the fingerprint is an allocation address.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self.0, Repr::Identity(_))
    }
}

fn key_eq<K: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<K>(), b.downcast_ref::<K>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Identity(a), Repr::Identity(b)) => a == b,
            (
                Repr::Structural { hash, key, eq },
                Repr::Structural {
                    hash: other_hash,
                    key: other_key,
                    ..
                },
            ) => hash == other_hash && eq(&**key, &**other_key),
            _ => false,
        }
    }
}

impl Eq for Fingerprint {}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Repr::Identity(addr) => {
                state.write_u8(0);
                addr.hash(state);
            }
            Repr::Structural { hash, .. } => {
                state.write_u8(1);
                hash.hash(state);
            }
        }
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Identity(addr) => write!(f, "Identity({addr:#x})"),
            Repr::Structural { hash, .. } => write!(f, "Structural({hash:#018x})"),
        }
    }
}

type RunFn<T> = dyn Fn(&Value) -> Result<T, DecodeError>;

/// A reusable payload decoder producing `T`.
pub struct Decoder<T> {
    run: Rc<RunFn<T>>,
    fingerprint: Fingerprint,
}

impl<T> Clone for Decoder<T> {
    fn clone(&self) -> Self {
        Self {
            run: Rc::clone(&self.run),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

impl<T> fmt::Debug for Decoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl<T> Decoder<T> {
    /// Run the decoder against a payload.
    pub fn decode(&self, payload: &Value) -> Result<T, DecodeError> {
        (self.run)(payload)
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint.clone()
    }

    /// Whether two decoders are interchangeable.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

fn structural<K: Hash + PartialEq + 'static>(key: K) -> Fingerprint {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    Fingerprint(Repr::Structural {
        hash: hasher.finish(),
        key: Rc::new(key),
        eq: key_eq::<K>,
    })
}

/// Walk `path` through nested objects.
fn walk<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Value, DecodeError> {
    let mut current = value;
    for (depth, field) in path.iter().enumerate() {
        current = current
            .get(*field)
            .ok_or_else(|| DecodeError::at(&path[..=depth], "missing field"))?;
    }
    Ok(current)
}

impl<T: 'static> Decoder<T> {
    /// Wrap an arbitrary closure. The fingerprint is the closure's
    /// allocation, so two calls to `new` never compare equal.
    pub fn new(run: impl Fn(&Value) -> Result<T, DecodeError> + 'static) -> Self {
        let run: Rc<RunFn<T>> = Rc::new(run);
        let fingerprint = Fingerprint::identity(Rc::as_ptr(&run).cast::<()>() as usize);
        Self { run, fingerprint }
    }

    /// Wrap a closure under a caller-chosen key. Decoders built with equal
    /// keys for the same output type compare equal.
    pub fn with_fingerprint<K: Hash + PartialEq + 'static>(
        key: K,
        run: impl Fn(&Value) -> Result<T, DecodeError> + 'static,
    ) -> Self {
        Self {
            run: Rc::new(run),
            fingerprint: structural(("custom", TypeId::of::<T>(), key)),
        }
    }

    /// Ignore the payload and always produce `value`.
    pub fn succeed(value: T) -> Self
    where
        T: Clone + Hash + PartialEq,
    {
        let fingerprint = structural(("succeed", value.clone()));
        Self {
            run: Rc::new(move |_: &Value| Ok(value.clone())),
            fingerprint,
        }
    }

    /// Always reject with `reason`.
    pub fn fail(reason: &'static str) -> Self {
        Self {
            run: Rc::new(move |_: &Value| Err(DecodeError::new(reason))),
            fingerprint: structural(("fail", TypeId::of::<T>(), reason)),
        }
    }

    /// Read the string at `path` and convert it with `f`.
    pub fn at_string(path: &'static [&'static str], f: fn(String) -> T) -> Self {
        let fingerprint = structural(("string", TypeId::of::<T>(), path, f as *const () as usize));
        Self {
            run: Rc::new(move |value: &Value| {
                let field = walk(value, path)?;
                field
                    .as_str()
                    .map(|s| f(s.to_owned()))
                    .ok_or_else(|| DecodeError::at(path, "expected a string"))
            }),
            fingerprint,
        }
    }

    /// Read the boolean at `path` and convert it with `f`.
    pub fn at_bool(path: &'static [&'static str], f: fn(bool) -> T) -> Self {
        let fingerprint = structural(("bool", TypeId::of::<T>(), path, f as *const () as usize));
        Self {
            run: Rc::new(move |value: &Value| {
                let field = walk(value, path)?;
                field
                    .as_bool()
                    .map(f)
                    .ok_or_else(|| DecodeError::at(path, "expected a boolean"))
            }),
            fingerprint,
        }
    }

    /// Read the number at `path` and convert it with `f`.
    pub fn at_f64(path: &'static [&'static str], f: fn(f64) -> T) -> Self {
        let fingerprint = structural(("f64", TypeId::of::<T>(), path, f as *const () as usize));
        Self {
            run: Rc::new(move |value: &Value| {
                let field = walk(value, path)?;
                field
                    .as_f64()
                    .map(f)
                    .ok_or_else(|| DecodeError::at(path, "expected a number"))
            }),
            fingerprint,
        }
    }

    /// Post-process every decoded value with `f`.
    pub fn map<U: 'static>(self, f: fn(T) -> U) -> Decoder<U> {
        let salt = structural(("map", f as *const () as usize));
        self.transform(Some(salt), f)
    }

    /// Convert the output with `f`.
    ///
    /// With `salt == None` the fingerprint is kept as is, which is only
    /// correct when `f` is the same function for every decoder it is applied
    /// to (type erasure, for instance).
    pub(crate) fn transform<U: 'static>(
        self,
        salt: Option<Fingerprint>,
        f: impl Fn(T) -> U + 'static,
    ) -> Decoder<U> {
        let fingerprint = match salt {
            None => self.fingerprint,
            Some(salt) => structural((self.fingerprint, salt)),
        };
        let inner = self.run;
        Decoder {
            run: Rc::new(move |value: &Value| inner(value).map(&f)),
            fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Msg {
        Clicked,
        Typed(String),
        Checked(bool),
    }

    // ---- Decoding ----

    #[test]
    fn succeed_ignores_payload() {
        let decoder = Decoder::succeed(Msg::Clicked);
        assert_eq!(decoder.decode(&Value::Null), Ok(Msg::Clicked));
        assert_eq!(decoder.decode(&json!({"x": 1})), Ok(Msg::Clicked));
    }

    #[test]
    fn at_string_reads_nested_field() {
        let decoder = Decoder::at_string(&["target", "value"], Msg::Typed);
        let payload = json!({ "target": { "value": "hello" } });
        assert_eq!(decoder.decode(&payload), Ok(Msg::Typed("hello".into())));
    }

    #[test]
    fn at_string_reports_missing_path() {
        let decoder = Decoder::at_string(&["target", "value"], Msg::Typed);
        let err = decoder.decode(&json!({ "target": {} })).unwrap_err();
        assert_eq!(err.path(), ["target", "value"]);
        assert_eq!(err.reason(), "missing field");
        assert_eq!(err.to_string(), "decode failed at target.value: missing field");
    }

    #[test]
    fn at_string_rejects_wrong_type() {
        let decoder = Decoder::at_string(&["target", "value"], Msg::Typed);
        let err = decoder
            .decode(&json!({ "target": { "value": 7 } }))
            .unwrap_err();
        assert_eq!(err.reason(), "expected a string");
    }

    #[test]
    fn at_bool_reads_checked() {
        let decoder = Decoder::at_bool(&["target", "checked"], Msg::Checked);
        let payload = json!({ "target": { "checked": true } });
        assert_eq!(decoder.decode(&payload), Ok(Msg::Checked(true)));
    }

    #[test]
    fn at_f64_reads_number() {
        let decoder = Decoder::at_f64(&["deltaY"], |d| d as i64);
        assert_eq!(decoder.decode(&json!({ "deltaY": 12.0 })), Ok(12));
    }

    #[test]
    fn fail_always_rejects() {
        let decoder: Decoder<Msg> = Decoder::fail("nope");
        assert_eq!(decoder.decode(&Value::Null).unwrap_err().to_string(), "decode failed: nope");
    }

    #[test]
    fn map_post_processes() {
        let decoder = Decoder::at_string(&["key"], |s| s).map(|s| s.len());
        assert_eq!(decoder.decode(&json!({ "key": "Enter" })), Ok(5));
    }

    // ---- Fingerprints ----

    #[test]
    fn equal_construction_shares_fingerprint() {
        let a = Decoder::succeed(Msg::Clicked);
        let b = Decoder::succeed(Msg::Clicked);
        assert!(a.same(&b));

        let c = Decoder::at_string(&["target", "value"], Msg::Typed);
        let d = Decoder::at_string(&["target", "value"], Msg::Typed);
        assert!(c.same(&d));
    }

    #[test]
    fn different_arguments_differ() {
        let a = Decoder::succeed(Msg::Clicked);
        let b = Decoder::succeed(Msg::Typed("x".into()));
        assert!(!a.same(&b));

        let c = Decoder::at_string(&["target", "value"], Msg::Typed);
        let d = Decoder::at_string(&["target", "name"], Msg::Typed);
        assert!(!c.same(&d));
    }

    #[test]
    fn closures_compare_by_allocation() {
        let a: Decoder<u8> = Decoder::new(|_| Ok(1));
        let b: Decoder<u8> = Decoder::new(|_| Ok(1));
        assert!(!a.same(&b));
        assert!(a.same(&a.clone()));
    }

    #[test]
    fn keyed_closures_compare_by_key() {
        let a: Decoder<u8> = Decoder::with_fingerprint("wheel", |_| Ok(1));
        let b: Decoder<u8> = Decoder::with_fingerprint("wheel", |_| Ok(2));
        let c: Decoder<u8> = Decoder::with_fingerprint("scroll", |_| Ok(1));
        assert!(a.same(&b));
        assert!(!a.same(&c));
    }

    #[test]
    fn map_changes_fingerprint_per_function() {
        fn double(x: u8) -> u8 {
            x * 2
        }
        fn triple(x: u8) -> u8 {
            x * 3
        }
        let base = Decoder::succeed(2u8);
        let a = base.clone().map(double);
        let b = base.clone().map(double);
        let c = base.clone().map(triple);
        assert!(a.same(&b));
        assert!(!a.same(&c));
        assert!(!a.same(&base));
    }

    #[test]
    fn hash_collisions_do_not_alias() {
        // These two tuples share an FxHash.
        let low = (1u64, 0u64);
        let high = (0u64, 0xf135_7aea_2e62_a9c5_u64);
        let a = Decoder::succeed(low);
        let b = Decoder::succeed(high);
        assert!(!a.same(&b));
        assert!(a.same(&Decoder::succeed(low)));
    }

    #[test]
    fn equal_keys_of_different_types_differ() {
        let a: Decoder<u8> = Decoder::with_fingerprint(1u32, |_| Ok(1));
        let b: Decoder<u8> = Decoder::with_fingerprint(1u64, |_| Ok(1));
        assert!(!a.same(&b));
        assert!(!Decoder::succeed(1u32).fingerprint().is_identity());
    }
}
