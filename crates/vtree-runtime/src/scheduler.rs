#![forbid(unsafe_code)]

//! Frame scheduling for render passes.
//!
//! [`RenderScheduler`] decides when a state change turns into a render pass.
//! Updates arriving before the next display refresh are coalesced into one
//! pass; a synchronous update draws immediately.
//!
//! # States
//!
//! | state      | meaning                                                        |
//! |------------|----------------------------------------------------------------|
//! | `Idle`     | nothing to draw, no frame requested                            |
//! | `Pending`  | the model changed; a frame was requested and will draw         |
//! | `InFlight` | a frame just drew; one more frame was requested to absorb      |
//! |            | updates arriving in its wake, and will draw only if they do    |
//!
//! # Transitions
//!
//! | from       | event             | to         | action                     |
//! |------------|-------------------|------------|----------------------------|
//! | `Idle`     | async update      | `Pending`  | request a frame            |
//! | `Pending`  | async update      | `Pending`  | coalesce                   |
//! | `InFlight` | async update      | `Pending`  | coalesce into the request  |
//! | any        | sync update       | unchanged* | draw now                   |
//! | `Pending`  | frame             | `InFlight` | draw, request a follow-up  |
//! | `InFlight` | frame             | `Idle`     | nothing                    |
//! | any        | `cancel`          | `Idle`     | forget the request         |
//!
//! \* A sync draw while `Pending` moves to `InFlight`: the requested frame
//! has nothing left to draw.
//!
//! Every requested frame gets a fresh [`FrameHandle`]. A frame delivered
//! with any other handle is stale and ignored, so a cancelled request can
//! never draw.

use std::fmt;

/// Identifies one requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

impl FrameHandle {
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Pending(FrameHandle),
    InFlight(FrameHandle),
}

/// What the caller should do after reporting an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Render now.
    DrawNow,
    /// Ask the host for a refresh callback carrying this handle.
    RequestFrame(FrameHandle),
    /// A frame is already requested and will pick the update up.
    Coalesced,
}

/// What the caller should do on a refresh callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    /// Render now, then ask the host for a follow-up frame with `next`.
    Draw { next: FrameHandle },
    /// Nothing changed since the last draw.
    Settle,
    /// Unknown or superseded handle.
    Stale,
}

/// Three-state frame scheduler.
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    state: SchedulerState,
    coalescing: bool,
    next_handle: u64,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RenderScheduler {
    /// With `coalescing` off every update draws immediately.
    #[must_use]
    pub fn new(coalescing: bool) -> Self {
        Self {
            state: SchedulerState::Idle,
            coalescing,
            next_handle: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Handle of the frame the host owes us, if any.
    #[must_use]
    pub fn requested(&self) -> Option<FrameHandle> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Pending(handle) | SchedulerState::InFlight(handle) => Some(handle),
        }
    }

    /// Report a model change.
    pub fn request(&mut self, sync: bool) -> Request {
        if sync || !self.coalescing {
            if let SchedulerState::Pending(handle) = self.state {
                self.state = SchedulerState::InFlight(handle);
            }
            return Request::DrawNow;
        }
        match self.state {
            SchedulerState::Idle => {
                let handle = self.fresh_handle();
                self.state = SchedulerState::Pending(handle);
                Request::RequestFrame(handle)
            }
            SchedulerState::Pending(_) => Request::Coalesced,
            SchedulerState::InFlight(handle) => {
                self.state = SchedulerState::Pending(handle);
                Request::Coalesced
            }
        }
    }

    /// Report a refresh callback for `handle`.
    pub fn on_frame(&mut self, handle: FrameHandle) -> FrameAction {
        match self.state {
            SchedulerState::Pending(current) if current == handle => {
                let next = self.fresh_handle();
                self.state = SchedulerState::InFlight(next);
                FrameAction::Draw { next }
            }
            SchedulerState::InFlight(current) if current == handle => {
                self.state = SchedulerState::Idle;
                FrameAction::Settle
            }
            _ => FrameAction::Stale,
        }
    }

    /// Drop any requested frame.
    pub fn cancel(&mut self) {
        self.state = SchedulerState::Idle;
    }

    fn fresh_handle(&mut self) -> FrameHandle {
        self.next_handle += 1;
        FrameHandle(self.next_handle)
    }
}
