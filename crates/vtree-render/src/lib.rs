#![forbid(unsafe_code)]

//! Reconciliation kernel: virtual nodes, diffing, patch application, and
//! event routing over a pluggable live tree.
//!
//! One render pass is `diff` (old and new virtual trees to a patch list),
//! index (patch positions to live nodes), then apply. [`Reconciler`] runs
//! the whole pass; the stages are public for hosts that schedule them
//! themselves.

pub mod apply;
pub mod diff;
pub mod events;
pub mod facts;
pub mod headless;
pub mod host;
pub mod html;
mod index;
mod keyed;
pub mod node;
pub mod patch;
pub mod reconciler;

pub use apply::{ApplyError, apply_patches, render};
pub use diff::diff;
pub use events::{Dispatcher, EventNode, Listener};
pub use facts::{Fact, Facts, FactsDiff, diff_facts};
pub use headless::{HeadlessDom, HostStats};
pub use host::{Host, NodeId, NodeShape};
pub use html::{Attribute, Html};
pub use node::{NodeKind, Token, VNode, Widget, WidgetPatch};
pub use patch::{Patch, PatchKind};
pub use reconciler::{Reconciler, RenderStats, virtualize};
