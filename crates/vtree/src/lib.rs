#![forbid(unsafe_code)]

//! vtree public facade crate.
//!
//! Re-exports the types an application needs from the internal crates and
//! offers a prelude for day-to-day use.
//!
//! ```
//! use vtree::prelude::*;
//!
//! let mut dom = HeadlessDom::new();
//! let mount = dom.create_mount("div");
//! let view = Html::<()>::node("p", vec![Attribute::class("greeting")], vec![Html::text("hi")]);
//! let reconciler = Reconciler::mount(&mut dom, mount, view.into_node(), Dispatcher::ignore());
//! assert_eq!(dom.to_markup(reconciler.root()), r#"<p class="greeting">hi</p>"#);
//! ```

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use vtree_core::{
    AnyMsg, DecodeError, Decoder, EventFlags, Handled, Handler, HandlerKind, Tagger,
};

// --- Render re-exports -----------------------------------------------------

pub use vtree_render::{
    ApplyError, Attribute, Dispatcher, Fact, Facts, HeadlessDom, Host, HostStats, Html, NodeId,
    Patch, Reconciler, RenderStats, Token, VNode, Widget, WidgetPatch, diff, virtualize,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use vtree_runtime::{
    Cmd, FrameHandle, Model, Program, ProgramConfig, ProgramError, RenderScheduler, StepResult,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for vtree apps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A patch could not be applied to the live tree.
    Apply(ApplyError),
    /// The program loop failed.
    #[cfg(feature = "runtime")]
    Program(ProgramError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Program(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Apply(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Program(err) => Some(err),
        }
    }
}

impl From<ApplyError> for Error {
    fn from(err: ApplyError) -> Self {
        Self::Apply(err)
    }
}

#[cfg(feature = "runtime")]
impl From<ProgramError> for Error {
    fn from(err: ProgramError) -> Self {
        Self::Program(err)
    }
}

/// Standard result type for vtree APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Attribute, Decoder, Dispatcher, Error, HeadlessDom, Host, Html, NodeId, Reconciler, Result,
        Tagger, Token, VNode,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{Cmd, Model, Program, ProgramConfig};

    pub use crate::{core, render};

    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use vtree_core as core;
pub use vtree_render as render;
#[cfg(feature = "runtime")]
pub use vtree_runtime as runtime;
