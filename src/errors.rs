//! Error handling module
//!
//! Registration has exactly one failure mode: the OS refused to report or
//! install a handler for the requested signal number.

use libc::c_int;
use nix::errno::Errno;
use thiserror::Error;

/// Errors raised while installing a signal dispatcher
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    /// The OS rejected the handler for this signal number
    #[error("failed to install handler for signal {signal}: {source}")]
    Installation { signal: c_int, source: Errno },
}

impl SignalError {
    /// Create an installation error for `signal`
    pub fn installation(signal: c_int, source: Errno) -> Self {
        Self::Installation { signal, source }
    }

    /// The signal number that could not be handled
    pub fn signal(&self) -> c_int {
        match self {
            Self::Installation { signal, .. } => *signal,
        }
    }

    /// The errno reported by the OS
    pub fn errno(&self) -> Errno {
        match self {
            Self::Installation { source, .. } => *source,
        }
    }
}

/// Result type alias for registry operations
pub type SignalResult<T> = Result<T, SignalError>;
