#![forbid(unsafe_code)]

//! Core: event decoders, handlers, and type-erased messages.

pub mod decode;
pub mod handler;
pub mod logging;
pub mod message;

pub use decode::{DecodeError, Decoder, Fingerprint};
pub use handler::{EventFlags, Handled, Handler, HandlerKind};
pub use message::{AnyMsg, Tagger, TaggerChain};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, debug_span, trace, trace_span, warn};
