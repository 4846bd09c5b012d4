#![forbid(unsafe_code)]

//! Elm-architecture program loop over a [`Host`].
//!
//! A [`Model`] owns application state, turns messages into new state in
//! [`Model::update`], and describes the live tree in [`Model::view`]. A
//! [`Program`] owns the model, the host, and one [`Reconciler`], and is
//! driven entirely by the host:
//!
//! - [`Program::init`] renders the first view and runs the init command.
//! - Event listeners push messages into the program inbox; so does
//!   [`Program::send`].
//! - [`Program::step`] drains the inbox through `update`, and either draws
//!   immediately or asks the host for a refresh callback.
//! - [`Program::on_frame`] is that callback.
//!
//! # Usage
//!
//! ```
//! use vtree_render::headless::HeadlessDom;
//! use vtree_render::html::{Attribute, Html};
//! use vtree_runtime::program::{Cmd, Model, Program, ProgramConfig};
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! enum Msg {
//!     Increment,
//! }
//!
//! struct Counter(u32);
//!
//! impl Model for Counter {
//!     type Message = Msg;
//!
//!     fn update(&mut self, msg: Msg) -> Cmd<Msg> {
//!         match msg {
//!             Msg::Increment => self.0 += 1,
//!         }
//!         Cmd::none()
//!     }
//!
//!     fn view(&self) -> Html<Msg> {
//!         Html::node(
//!             "button",
//!             vec![Attribute::on_click(Msg::Increment)],
//!             vec![Html::text(self.0.to_string())],
//!         )
//!     }
//! }
//!
//! let mut dom = HeadlessDom::new();
//! let mount = dom.create_mount("button");
//! let config = ProgramConfig::default().with_frame_coalescing(false);
//! let mut program = Program::new(Counter(0), dom, mount, config);
//! program.init().unwrap();
//!
//! program.send(Msg::Increment);
//! program.step().unwrap();
//! assert_eq!(program.host().to_markup(mount), "<button>1</button>");
//! ```
//!
//! # Invariants
//!
//! - The live tree always mirrors the last drawn view.
//! - At most one refresh callback is outstanding; see [`RenderScheduler`].
//! - After quit no message is processed and no frame draws.
//!
//! # Failure Modes
//!
//! A render pass that hits an [`ApplyError`](vtree_render::apply::ApplyError)
//! returns [`ProgramError::Apply`]; the previous virtual tree is kept so a
//! later pass diffs against what was last drawn successfully.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, info, warn};
use vtree_render::events::Dispatcher;
use vtree_render::host::{Host, NodeId};
use vtree_render::html::Html;
use vtree_render::reconciler::{Reconciler, RenderStats};

use crate::debug_trace;
use crate::error::ProgramError;
use crate::scheduler::{FrameAction, FrameHandle, RenderScheduler, Request};

/// Application state and behaviour.
pub trait Model: Sized {
    /// Messages produced by the view and by commands.
    type Message: 'static;

    /// Startup command, run once after the first render.
    fn init(&mut self) -> Cmd<Self::Message> {
        Cmd::none()
    }

    /// Apply one message.
    fn update(&mut self, msg: Self::Message) -> Cmd<Self::Message>;

    /// Describe the live tree for the current state.
    fn view(&self) -> Html<Self::Message>;
}

/// Side effects requested by [`Model::init`] and [`Model::update`].
#[derive(Default)]
pub enum Cmd<M> {
    /// No operation.
    #[default]
    None,
    /// Stop the program.
    Quit,
    /// Run each command in turn.
    Batch(Vec<Cmd<M>>),
    /// Run each command in turn; stops early on quit.
    Sequence(Vec<Cmd<M>>),
    /// Queue a message for the model.
    Msg(M),
    /// Record a log line.
    Log(String),
}

impl<M: std::fmt::Debug> std::fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Quit => write!(f, "Quit"),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Sequence(cmds) => f.debug_tuple("Sequence").field(cmds).finish(),
            Self::Msg(m) => f.debug_tuple("Msg").field(m).finish(),
            Self::Log(s) => f.debug_tuple("Log").field(s).finish(),
        }
    }
}

impl<M> Cmd<M> {
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    #[inline]
    pub fn quit() -> Self {
        Self::Quit
    }

    #[inline]
    pub fn msg(m: M) -> Self {
        Self::Msg(m)
    }

    #[inline]
    pub fn log(msg: impl Into<String>) -> Self {
        Self::Log(msg.into())
    }

    /// Create a batch of commands. Zero commands collapse to `None`, one to
    /// itself.
    pub fn batch(cmds: Vec<Self>) -> Self {
        Self::collapse(cmds, Self::Batch)
    }

    /// Create a sequence of commands, collapsing like [`Cmd::batch`].
    pub fn sequence(cmds: Vec<Self>) -> Self {
        Self::collapse(cmds, Self::Sequence)
    }

    fn collapse(mut cmds: Vec<Self>, wrap: fn(Vec<Self>) -> Self) -> Self {
        match cmds.len() {
            0 => Self::None,
            1 => cmds.pop().unwrap_or(Self::None),
            _ => wrap(cmds),
        }
    }

    /// Stable name for tracing.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Quit => "Quit",
            Self::Batch(_) => "Batch",
            Self::Sequence(_) => "Sequence",
            Self::Msg(_) => "Msg",
            Self::Log(_) => "Log",
        }
    }
}

/// Program configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramConfig {
    /// Coalesce updates into one render per refresh callback. Off, every
    /// update draws immediately.
    pub frame_coalescing: bool,
    /// Messages from listeners that stopped propagation draw immediately.
    pub sync_on_stop_propagation: bool,
    /// Diff the first view against the content already under the mount
    /// node instead of replacing it.
    pub hydrate_mount: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            frame_coalescing: true,
            sync_on_stop_propagation: true,
            hydrate_mount: true,
        }
    }
}

impl ProgramConfig {
    #[must_use]
    pub fn with_frame_coalescing(mut self, enabled: bool) -> Self {
        self.frame_coalescing = enabled;
        self
    }

    #[must_use]
    pub fn with_sync_on_stop_propagation(mut self, enabled: bool) -> Self {
        self.sync_on_stop_propagation = enabled;
        self
    }

    #[must_use]
    pub fn with_hydrate_mount(mut self, enabled: bool) -> Self {
        self.hydrate_mount = enabled;
        self
    }
}

/// Outcome of one [`Program::step`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// Messages passed to `update`.
    pub messages: usize,
    /// Render passes run during the step.
    pub draws: usize,
    /// A refresh callback the host must deliver to [`Program::on_frame`].
    pub requested_frame: Option<FrameHandle>,
    pub running: bool,
}

type Inbox<Msg> = Rc<RefCell<VecDeque<(Msg, bool)>>>;

/// A running model bound to a host.
pub struct Program<M: Model, H: Host> {
    model: M,
    host: H,
    mount: NodeId,
    config: ProgramConfig,
    reconciler: Option<Reconciler>,
    scheduler: RenderScheduler,
    inbox: Inbox<M::Message>,
    running: bool,
    frames: u64,
    last_stats: Option<RenderStats>,
    logs: Vec<String>,
}

impl<M: Model, H: Host> std::fmt::Debug for Program<M, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("mount", &self.mount)
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .field("pending_messages", &self.inbox.borrow().len())
            .field("running", &self.running)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl<M: Model, H: Host> Program<M, H> {
    /// Bind `model` to `host`. Nothing renders until [`Program::init`].
    pub fn new(model: M, host: H, mount: NodeId, config: ProgramConfig) -> Self {
        Self {
            model,
            host,
            mount,
            config,
            reconciler: None,
            scheduler: RenderScheduler::new(config.frame_coalescing),
            inbox: Rc::default(),
            running: true,
            frames: 0,
            last_stats: None,
            logs: Vec::new(),
        }
    }

    /// Render the first view at the mount node and run the init command.
    /// Messages it produces are handled by the first [`Program::step`].
    ///
    /// # Panics
    ///
    /// When called twice.
    pub fn init(&mut self) -> Result<(), ProgramError> {
        assert!(self.reconciler.is_none(), "Program::init called twice");

        let view = self.model.view().into_node();
        let dispatcher = root_dispatcher(
            Rc::clone(&self.inbox),
            self.config.sync_on_stop_propagation,
        );
        let reconciler = if self.config.hydrate_mount {
            let (reconciler, stats) =
                Reconciler::hydrate(&mut self.host, self.mount, view, dispatcher)?;
            self.last_stats = Some(stats);
            reconciler
        } else {
            Reconciler::mount(&mut self.host, self.mount, view, dispatcher)
        };
        self.reconciler = Some(reconciler);
        self.frames = 1;
        info!(hydrate = self.config.hydrate_mount, "program initialized");
        debug_trace!("init hydrate={}", self.config.hydrate_mount);

        let cmd = self.model.init();
        self.execute_cmd(cmd);
        Ok(())
    }

    /// Queue a message as if a listener had produced it.
    pub fn send(&mut self, msg: M::Message) {
        if self.running {
            self.inbox.borrow_mut().push_back((msg, false));
        }
    }

    /// Drain the inbox through `update`.
    ///
    /// # Panics
    ///
    /// When called before [`Program::init`].
    pub fn step(&mut self) -> Result<StepResult, ProgramError> {
        assert!(self.reconciler.is_some(), "Program::step called before init");

        let mut result = StepResult::default();
        while self.running {
            let next = self.inbox.borrow_mut().pop_front();
            let Some((msg, sync)) = next else {
                break;
            };
            result.messages += 1;
            let cmd = self.model.update(msg);
            self.execute_cmd(cmd);
            if !self.running {
                break;
            }
            match self.scheduler.request(sync) {
                Request::DrawNow => {
                    self.draw()?;
                    result.draws += 1;
                }
                Request::RequestFrame(handle) => {
                    debug_trace!("requested {handle}");
                    result.requested_frame = Some(handle);
                }
                Request::Coalesced => {}
            }
        }
        result.running = self.running;
        Ok(result)
    }

    /// Refresh callback for `handle`. Returns the follow-up frame the host
    /// must deliver next, if any.
    pub fn on_frame(&mut self, handle: FrameHandle) -> Result<Option<FrameHandle>, ProgramError> {
        if !self.running {
            return Ok(None);
        }
        match self.scheduler.on_frame(handle) {
            FrameAction::Draw { next } => {
                self.draw()?;
                Ok(Some(next))
            }
            FrameAction::Settle => Ok(None),
            FrameAction::Stale => {
                debug_trace!("ignored stale {handle}");
                Ok(None)
            }
        }
    }

    fn draw(&mut self) -> Result<(), ProgramError> {
        let Some(reconciler) = self.reconciler.as_mut() else {
            return Ok(());
        };
        let view = self.model.view().into_node();
        let stats = reconciler.update(&mut self.host, view)?;
        self.frames += 1;
        self.last_stats = Some(stats);
        debug!(
            frame = self.frames,
            patches = stats.patches,
            redraws = stats.redraws,
            replaced_root = stats.replaced_root,
            "frame drawn"
        );
        debug_trace!(
            "frame {} drew {} patches ({} redraws)",
            self.frames,
            stats.patches,
            stats.redraws
        );
        Ok(())
    }

    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => self.quit(),
            Cmd::Msg(m) => self.inbox.borrow_mut().push_back((m, false)),
            Cmd::Batch(cmds) | Cmd::Sequence(cmds) => {
                for cmd in cmds {
                    if !self.running {
                        break;
                    }
                    self.execute_cmd(cmd);
                }
            }
            Cmd::Log(line) => {
                info!(target: "vtree_runtime::log", "{line}");
                self.logs.push(line);
            }
        }
    }

    fn quit(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.scheduler.cancel();
        self.inbox.borrow_mut().clear();
        info!(frames = self.frames, "program quit");
        debug_trace!("quit after {} frames", self.frames);
    }

    #[inline]
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    #[inline]
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[inline]
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> ProgramConfig {
        self.config
    }

    /// Live root of the mounted tree, once initialized.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.reconciler.as_ref().map(Reconciler::root)
    }

    /// The refresh callback the host currently owes, if any.
    #[must_use]
    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.scheduler.requested()
    }

    #[must_use]
    pub fn pending_messages(&self) -> usize {
        self.inbox.borrow().len()
    }

    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Render passes so far, the initial one included.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    #[inline]
    #[must_use]
    pub fn last_stats(&self) -> Option<RenderStats> {
        self.last_stats
    }

    /// Lines recorded by [`Cmd::Log`].
    #[must_use]
    pub fn logs(&self) -> &[String] {
        &self.logs
    }
}

fn root_dispatcher<Msg: 'static>(inbox: Inbox<Msg>, honour_sync: bool) -> Dispatcher {
    Dispatcher::new(move |msg, sync| match msg.downcast::<Msg>() {
        Ok(msg) => inbox.borrow_mut().push_back((*msg, sync && honour_sync)),
        Err(_) => warn!(
            expected = std::any::type_name::<Msg>(),
            "dropped message of unexpected type at the root"
        ),
    })
}
