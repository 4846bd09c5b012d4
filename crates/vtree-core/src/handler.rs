#![forbid(unsafe_code)]

//! Event handlers.
//!
//! A [`Handler`] pairs a [`Decoder`] with the way its result controls the
//! host event: plain messages, messages that may stop propagation, messages
//! that may prevent the default action, or a fully custom record.
//!
//! Handlers are generic over the message type for construction and erased to
//! [`Handler<AnyMsg>`] once they enter the tree.

use std::fmt;

use bitflags::bitflags;
use serde_json::Value;

use crate::decode::{DecodeError, Decoder, Fingerprint};
use crate::message::{AnyMsg, Tagger};

bitflags! {
    /// Side effects a handler requests on the host event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u8 {
        const STOP_PROPAGATION = 0b01;
        const PREVENT_DEFAULT = 0b10;
    }
}

/// Which of the four handler shapes a handler has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Normal,
    MayStopPropagation,
    MayPreventDefault,
    Custom,
}

impl HandlerKind {
    /// Handlers that can never prevent the default action are registered as
    /// passive listeners.
    #[inline]
    #[must_use]
    pub const fn is_passive(self) -> bool {
        matches!(self, Self::Normal | Self::MayStopPropagation)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::MayStopPropagation => "may-stop-propagation",
            Self::MayPreventDefault => "may-prevent-default",
            Self::Custom => "custom",
        }
    }
}

/// Decoded result of a [`Handler::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handled<M> {
    pub message: M,
    pub stop_propagation: bool,
    pub prevent_default: bool,
}

impl<M> Handled<M> {
    fn flags(&self) -> EventFlags {
        let mut flags = EventFlags::empty();
        flags.set(EventFlags::STOP_PROPAGATION, self.stop_propagation);
        flags.set(EventFlags::PREVENT_DEFAULT, self.prevent_default);
        flags
    }
}

/// A decoder plus its event-control shape.
pub enum Handler<M = AnyMsg> {
    Normal(Decoder<M>),
    /// The boolean requests stop-propagation.
    MayStopPropagation(Decoder<(M, bool)>),
    /// The boolean requests prevent-default.
    MayPreventDefault(Decoder<(M, bool)>),
    Custom(Decoder<Handled<M>>),
}

impl<M> Clone for Handler<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Normal(d) => Self::Normal(d.clone()),
            Self::MayStopPropagation(d) => Self::MayStopPropagation(d.clone()),
            Self::MayPreventDefault(d) => Self::MayPreventDefault(d.clone()),
            Self::Custom(d) => Self::Custom(d.clone()),
        }
    }
}

impl<M> fmt::Debug for Handler<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler")
            .field(&self.kind())
            .field(&self.fingerprint())
            .finish()
    }
}

impl<M> Handler<M> {
    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Normal(_) => HandlerKind::Normal,
            Self::MayStopPropagation(_) => HandlerKind::MayStopPropagation,
            Self::MayPreventDefault(_) => HandlerKind::MayPreventDefault,
            Self::Custom(_) => HandlerKind::Custom,
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        match self {
            Self::Normal(d) => d.fingerprint(),
            Self::MayStopPropagation(d) | Self::MayPreventDefault(d) => d.fingerprint(),
            Self::Custom(d) => d.fingerprint(),
        }
    }

    /// Same shape and interchangeable decoder.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.fingerprint() == other.fingerprint()
    }
}

impl<M: 'static> Handler<M> {
    /// Decode a payload into a message and the flags to apply to the event.
    pub fn run(&self, payload: &Value) -> Result<(M, EventFlags), DecodeError> {
        match self {
            Self::Normal(d) => Ok((d.decode(payload)?, EventFlags::empty())),
            Self::MayStopPropagation(d) => {
                let (msg, stop) = d.decode(payload)?;
                let flags = if stop {
                    EventFlags::STOP_PROPAGATION
                } else {
                    EventFlags::empty()
                };
                Ok((msg, flags))
            }
            Self::MayPreventDefault(d) => {
                let (msg, prevent) = d.decode(payload)?;
                let flags = if prevent {
                    EventFlags::PREVENT_DEFAULT
                } else {
                    EventFlags::empty()
                };
                Ok((msg, flags))
            }
            Self::Custom(d) => {
                let handled = d.decode(payload)?;
                let flags = handled.flags();
                Ok((handled.message, flags))
            }
        }
    }

    /// Erase the message type. Fingerprints are preserved.
    pub fn erase(self) -> Handler<AnyMsg> {
        self.convert(None, |msg: M| -> AnyMsg { Box::new(msg) })
    }

    fn convert(self, salt: Option<Fingerprint>, f: impl Fn(M) -> AnyMsg + 'static) -> Handler<AnyMsg> {
        match self {
            Self::Normal(d) => Handler::Normal(d.transform(salt, f)),
            Self::MayStopPropagation(d) => {
                Handler::MayStopPropagation(d.transform(salt, move |(m, b)| (f(m), b)))
            }
            Self::MayPreventDefault(d) => {
                Handler::MayPreventDefault(d.transform(salt, move |(m, b)| (f(m), b)))
            }
            Self::Custom(d) => Handler::Custom(d.transform(salt, move |h: Handled<M>| Handled {
                message: f(h.message),
                stop_propagation: h.stop_propagation,
                prevent_default: h.prevent_default,
            })),
        }
    }
}

impl Handler<AnyMsg> {
    /// Route every decoded message through `tagger`. The fingerprint is
    /// salted with the tagger identity.
    pub fn map_with(self, tagger: Tagger) -> Handler<AnyMsg> {
        let salt = Fingerprint::identity(tagger.identity());
        self.convert(Some(salt), move |msg| tagger.apply(msg))
    }
}
