#![forbid(unsafe_code)]

//! Type-erased messages and message transformers.
//!
//! The reconciler is not generic over the application's message type. Every
//! message travels as an [`AnyMsg`] and is rewrapped by [`Tagger`]s on its
//! way up to the root dispatcher, which downcasts it back.
//!
//! # Invariants
//!
//! 1. A [`TaggerChain`] is stored outermost first and applied innermost
//!    first.
//! 2. Two taggers are [`Tagger::same`] only when they wrap the same function
//!    pointer or the same closure allocation.

use std::any::{Any, type_name};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// A message with its concrete type erased.
pub type AnyMsg = Box<dyn Any>;

/// Erase a typed message.
#[inline]
pub fn erase<M: 'static>(msg: M) -> AnyMsg {
    Box::new(msg)
}

type TagFn = dyn Fn(AnyMsg) -> AnyMsg;

/// Wraps messages produced inside a subtree before they reach the parent.
#[derive(Clone)]
pub struct Tagger {
    call: Rc<TagFn>,
    identity: usize,
    label: &'static str,
}

impl Tagger {
    /// Tagger from a function pointer. Identity is the function address, so
    /// the same function used on successive renders compares equal.
    pub fn from_fn<A: 'static, B: 'static>(f: fn(A) -> B) -> Self {
        Self {
            call: Rc::new(move |msg: AnyMsg| retag(msg, f)),
            identity: f as *const () as usize,
            label: type_name::<B>(),
        }
    }

    /// Tagger from a closure. Identity is the closure allocation; keep the
    /// tagger around between renders to avoid re-registering taggers.
    pub fn from_closure<A: 'static, B: 'static>(f: impl Fn(A) -> B + 'static) -> Self {
        let call: Rc<TagFn> = Rc::new(move |msg: AnyMsg| retag(msg, &f));
        let identity = Rc::as_ptr(&call).cast::<()>() as usize;
        Self {
            call,
            identity,
            label: type_name::<B>(),
        }
    }

    /// Transform one message.
    #[inline]
    pub fn apply(&self, msg: AnyMsg) -> AnyMsg {
        (self.call)(msg)
    }

    #[inline]
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        self.identity == other.identity
    }

    #[must_use]
    pub fn identity(&self) -> usize {
        self.identity
    }
}

impl fmt::Debug for Tagger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tagger(-> {} @ {:#x})", self.label, self.identity)
    }
}

/// Downcast to `A`, map, and re-erase. A message of the wrong type passes
/// through untouched so the root can report it.
fn retag<A: 'static, B: 'static>(msg: AnyMsg, f: impl Fn(A) -> B) -> AnyMsg {
    match msg.downcast::<A>() {
        Ok(inner) => Box::new(f(*inner)),
        Err(other) => {
            crate::trace!(
                expected = type_name::<A>(),
                "tagger received a message of another type"
            );
            other
        }
    }
}

/// Taggers collected from directly nested tagging nodes, outermost first.
pub type TaggerChain = SmallVec<[Tagger; 1]>;

/// Pairwise identity comparison of two chains.
#[must_use]
pub fn chains_equal(a: &[Tagger], b: &[Tagger]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same(y))
}

/// Run `msg` through a chain, innermost tagger first.
pub fn apply_chain(chain: &[Tagger], msg: AnyMsg) -> AnyMsg {
    chain.iter().rev().fold(msg, |msg, tagger| tagger.apply(msg))
}
