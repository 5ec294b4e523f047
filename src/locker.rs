//! Lock program lifecycle.
//!
//! The coordinator drives the screen lock through the [`Locker`] trait so the
//! way a lock program signals completion stays an implementation detail.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::error::LockdError;

/// Control over an opaque screen lock mechanism.
#[async_trait]
pub trait Locker: Send {
    /// Start the lock if it is not already engaged.
    ///
    /// Must not wait for the lock to be released.
    fn ensure_lock(&mut self) -> Result<(), LockdError>;

    /// Release the lock and wait until it is confirmed gone.
    ///
    /// Failures are logged; the locker always ends up unlocked.
    async fn ensure_unlock(&mut self);

    /// Whether the lock is currently engaged.
    ///
    /// Reconciles with the underlying mechanism, so a lock that ended on its
    /// own is reported (and forgotten) here.
    fn is_locked(&mut self) -> bool;
}

/// Locker for programs that keep running until the screen is unlocked,
/// such as `i3lock -n`, `slock` or `pyxtrlock`.
#[derive(Debug)]
pub struct BlockingLocker {
    /// Shell command line of the lock program.
    command: String,

    /// Grace period between SIGTERM and SIGKILL on unlock.
    unlock_timeout: Duration,

    /// The running lock program, if any.
    current: Option<Child>,
}

impl BlockingLocker {
    pub fn new(command: impl Into<String>, unlock_timeout: Duration) -> Self {
        Self {
            command: command.into(),
            unlock_timeout,
            current: None,
        }
    }
}

#[async_trait]
impl Locker for BlockingLocker {
    fn ensure_lock(&mut self) -> Result<(), LockdError> {
        if self.is_locked() {
            debug!("Locker already running");
            return Ok(());
        }

        info!("Starting locker: {}", self.command);
        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LockdError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        debug!("Locker running with pid {:?}", child.id());
        self.current = Some(child);
        Ok(())
    }

    async fn ensure_unlock(&mut self) {
        info!("Unlocking");
        let Some(mut child) = self.current.take() else {
            return;
        };

        terminate(&child);

        let graceful = tokio::time::timeout(self.unlock_timeout, child.wait()).await;
        let waited = match graceful {
            Ok(waited) => waited,
            Err(_) => {
                warn!(
                    "Locker did not exit within {:?} of SIGTERM, killing it",
                    self.unlock_timeout
                );
                if let Err(e) = child.start_kill() {
                    error!("Failed to kill locker: {}", e);
                }
                child.wait().await
            }
        };

        match waited {
            // Death by our own signal is the expected outcome here.
            Ok(status) if status.code().is_none() => debug!("Locker terminated ({})", status),
            Ok(status) => log_exit(status),
            Err(e) => error!("Failed to wait for locker: {}", e),
        }
    }

    fn is_locked(&mut self) -> bool {
        let Some(child) = self.current.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("Locker has quit");
                log_exit(status);
                self.current = None;
                false
            }
            Err(e) => {
                error!("Failed to poll locker status: {}", e);
                self.current = None;
                false
            }
        }
    }
}

/// Ask the locker to exit with SIGTERM.
fn terminate(child: &Child) {
    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        // Already reaped
        return;
    };

    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!("Failed to send SIGTERM to locker: {}", e);
    }
}

fn log_exit(status: ExitStatus) {
    if status.success() {
        debug!("Locker exited cleanly");
    } else {
        error!("{}", LockdError::AbnormalExit(status));
    }
}
