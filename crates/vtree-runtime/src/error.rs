#![forbid(unsafe_code)]

//! Runtime errors.

use std::fmt;

use vtree_render::apply::ApplyError;

/// Failure of a render pass driven by the program loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// Patching the live tree hit a contract violation.
    Apply(ApplyError),
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply(err) => write!(f, "render failed: {err}"),
        }
    }
}

impl std::error::Error for ProgramError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Apply(err) => Some(err),
        }
    }
}

impl From<ApplyError> for ProgramError {
    fn from(err: ApplyError) -> Self {
        Self::Apply(err)
    }
}
