#![forbid(unsafe_code)]

//! Event routing from live listeners to the root dispatcher.
//!
//! Every live node rendered under a tagging node shares one [`EventNode`]
//! holding that tagging node's chain and a pointer to the enclosing record.
//! The chain sits in a `RefCell` so a
//! [`ReplaceTaggers`](crate::patch::PatchKind::ReplaceTaggers) patch can
//! retarget every listener in the subtree without touching them.
//!
//! A [`Listener`] owns its current handler the same way, so rebinding a
//! handler of the same kind swaps it in place instead of re-registering with
//! the host.
//!
//! # Dispatch
//!
//! 1. Decode the payload with the current handler. A rejected payload is
//!    dropped.
//! 2. Walk the event-node chain outward, applying each chain innermost
//!    tagger first.
//! 3. Hand the message to the root [`Dispatcher`], flagged synchronous when
//!    the handler requested stop-propagation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use vtree_core::handler::{EventFlags, Handler, HandlerKind};
use vtree_core::message::{AnyMsg, TaggerChain, apply_chain};

/// Receives fully tagged messages at the root.
///
/// The boolean is `true` when the message should be rendered synchronously.
#[derive(Clone)]
pub struct Dispatcher(Rc<dyn Fn(AnyMsg, bool)>);

impl Dispatcher {
    pub fn new(dispatch: impl Fn(AnyMsg, bool) + 'static) -> Self {
        Self(Rc::new(dispatch))
    }

    /// A dispatcher that drops everything.
    #[must_use]
    pub fn ignore() -> Self {
        Self::new(|_, _| {})
    }

    pub fn dispatch(&self, msg: AnyMsg, sync: bool) {
        (self.0)(msg, sync);
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dispatcher(..)")
    }
}

/// Back-pointer chain from a subtree to the root dispatcher.
pub enum EventNode {
    Root(Dispatcher),
    Tagged {
        taggers: RefCell<TaggerChain>,
        parent: Rc<EventNode>,
    },
}

impl EventNode {
    #[must_use]
    pub fn root(dispatcher: Dispatcher) -> Rc<Self> {
        Rc::new(Self::Root(dispatcher))
    }

    #[must_use]
    pub fn tagged(taggers: TaggerChain, parent: Rc<EventNode>) -> Rc<Self> {
        Rc::new(Self::Tagged {
            taggers: RefCell::new(taggers),
            parent,
        })
    }

    /// Swap the chain of a tagged record. Returns `false` on the root.
    pub fn replace_taggers(&self, chain: TaggerChain) -> bool {
        match self {
            Self::Root(_) => false,
            Self::Tagged { taggers, .. } => {
                *taggers.borrow_mut() = chain;
                true
            }
        }
    }

    /// Current chain of a tagged record.
    #[must_use]
    pub fn taggers(&self) -> Option<TaggerChain> {
        match self {
            Self::Root(_) => None,
            Self::Tagged { taggers, .. } => Some(taggers.borrow().clone()),
        }
    }

    /// Tag `msg` on the way up and dispatch it at the root.
    pub fn deliver(&self, msg: AnyMsg, sync: bool) {
        let mut msg = msg;
        let mut current = self;
        loop {
            match current {
                Self::Root(dispatcher) => {
                    dispatcher.dispatch(msg, sync);
                    return;
                }
                Self::Tagged { taggers, parent } => {
                    let chain = taggers.borrow().clone();
                    msg = apply_chain(&chain, msg);
                    current = &**parent;
                }
            }
        }
    }
}

impl fmt::Debug for EventNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root(_) => f.write_str("EventNode::Root"),
            Self::Tagged { taggers, parent } => f
                .debug_struct("EventNode::Tagged")
                .field("taggers", &*taggers.borrow())
                .field("parent", parent)
                .finish(),
        }
    }
}

/// A bound event listener.
pub struct Listener {
    handler: RefCell<Handler>,
    events: Rc<EventNode>,
}

impl Listener {
    #[must_use]
    pub fn new(handler: Handler, events: Rc<EventNode>) -> Self {
        Self {
            handler: RefCell::new(handler),
            events,
        }
    }

    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        self.handler.borrow().kind()
    }

    /// Replace the handler. The caller keeps the kind unchanged so the
    /// host registration stays valid.
    pub fn replace_handler(&self, handler: Handler) {
        debug_assert_eq!(self.kind(), handler.kind());
        *self.handler.borrow_mut() = handler;
    }

    /// Run the listener for one host event and report which side effects
    /// the host should apply to it.
    pub fn handle(&self, payload: &Value) -> EventFlags {
        let outcome = self.handler.borrow().run(payload);
        match outcome {
            Ok((msg, flags)) => {
                self.events
                    .deliver(msg, flags.contains(EventFlags::STOP_PROPAGATION));
                flags
            }
            Err(_err) => {
                vtree_core::trace!(error = %_err, "event payload rejected");
                EventFlags::empty()
            }
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("handler", &*self.handler.borrow())
            .finish_non_exhaustive()
    }
}
