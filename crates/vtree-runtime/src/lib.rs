#![forbid(unsafe_code)]

//! Program loop for vtree applications.
//!
//! Ties a [`Model`](program::Model) to a live tree through a
//! [`Reconciler`](vtree_render::reconciler::Reconciler), with frame
//! coalescing handled by [`RenderScheduler`](scheduler::RenderScheduler).
//! The host drives everything: it delivers events, calls
//! [`Program::step`](program::Program::step), and answers frame requests
//! with [`Program::on_frame`](program::Program::on_frame).

pub mod debug_trace;
pub mod error;
pub mod program;
pub mod scheduler;

pub use error::ProgramError;
pub use program::{Cmd, Model, Program, ProgramConfig, StepResult};
pub use scheduler::{FrameAction, FrameHandle, RenderScheduler, Request, SchedulerState};
