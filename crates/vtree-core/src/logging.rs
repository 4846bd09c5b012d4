#![forbid(unsafe_code)]

//! Logging shims for the reconciler crates.
//!
//! With the `tracing` feature enabled the macros below are the real
//! `tracing` macros. Without it they expand to nothing, so the differ and
//! applier can log unconditionally without paying for it in release builds
//! that do not collect spans.
//!
//! Downstream crates call these through the crate root
//! (`vtree_core::trace!`, `vtree_core::debug_span!`) so they compile the
//! same way in both configurations.

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, trace, trace_span, warn};

#[cfg(not(feature = "tracing"))]
mod noop_macros {
    /// No-op debug macro when tracing is disabled.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op debug_span macro when tracing is disabled.
    #[macro_export]
    macro_rules! debug_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op trace macro when tracing is disabled.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op trace_span macro when tracing is disabled.
    #[macro_export]
    macro_rules! trace_span {
        ($($arg:tt)*) => {
            $crate::logging::NoopSpan
        };
    }

    /// No-op warn macro when tracing is disabled.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }
}

/// Stand-in span returned by the no-op span macros.
#[cfg(not(feature = "tracing"))]
pub struct NoopSpan;

#[cfg(not(feature = "tracing"))]
impl NoopSpan {
    /// Enter the span. Returns a guard that does nothing.
    pub fn enter(&self) -> NoopGuard {
        NoopGuard
    }
}

/// Guard returned by [`NoopSpan::enter`].
#[cfg(not(feature = "tracing"))]
pub struct NoopGuard;

#[cfg(test)]
mod tests {
    #[test]
    fn span_macros_enter_in_both_configurations() {
        let span = crate::debug_span!("diff", patches = 3);
        let _guard = span.enter();
        crate::trace!("inside span");
        crate::debug!(count = 1, "debug event");
        crate::warn!("warn event");
        let other = crate::trace_span!("apply");
        let _other_guard = other.enter();
    }
}
