//! Error types for the lock daemon.

use std::process::ExitStatus;

use thiserror::Error;
use zbus::fdo;

use crate::inhibit::Cookie;

/// Errors raised by the lock coordinator and its collaborators.
#[derive(Error, Debug)]
pub enum LockdError {
    /// The lock command could not be started.
    #[error("Failed to spawn locker `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The lock process exited with a failure status.
    #[error("Locker exited abnormally ({0})")]
    AbnormalExit(ExitStatus),

    /// Uninhibit was called with a cookie that is not registered.
    #[error("No inhibition with cookie {0}")]
    NotFound(Cookie),

    /// The idle-time source could not be read.
    #[error("Idle source unavailable: {0}")]
    IdleSource(String),

    /// The coordinator event loop is no longer running.
    #[error("Lock coordinator is not running")]
    CoordinatorGone,
}

impl From<LockdError> for fdo::Error {
    fn from(err: LockdError) -> Self {
        match err {
            LockdError::NotFound(_) => fdo::Error::InvalidArgs(err.to_string()),
            other => fdo::Error::Failed(other.to_string()),
        }
    }
}
