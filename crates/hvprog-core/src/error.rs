//! Error types for hvprog-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.
//!
//! Note that a stuck target discovered during a busy-poll is not reported
//! through this type at all: the engine recovers locally with a forced
//! physical reset and the session simply continues (see
//! [`crate::protocol::serial::wait_busy`]). Callers that care can watch the
//! log output for the warning.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No device variant answered its signature poll within the detection
    /// timeout. Surfaced to the host as a non-zero status byte from the
    /// enter-programming-mode request; recoverable by fixing the wiring and
    /// re-issuing connect/detection.
    DetectionFailed,
    /// A chunk call arrived while the session was idle or streaming in the
    /// other direction. Rejected before any device query; the transport
    /// maps this to its distinguished reply length.
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DetectionFailed => write!(f, "no target answered during variant detection"),
            Self::InvalidState => write!(f, "chunk call outside a matching streaming state"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
