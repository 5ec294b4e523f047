//! Domain types shared between the coordinator and its surfaces.

use std::fmt;

/// An automatic lock trigger.
///
/// Automatic triggers are subject to the enable switch and to inhibitions,
/// unlike an explicit `Lock()` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The idle threshold was crossed.
    Idle,
    /// The system is about to sleep.
    Sleep,
    /// The lid was closed.
    LidClose,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle threshold crossed",
            Self::Sleep => "system is going to sleep",
            Self::LidClose => "lid is closed",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the observable daemon state, as exposed over the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockState {
    /// Whether `Unlock()` is honored.
    pub allow_unlock: bool,

    /// Whether a locker process is currently running.
    pub locked: bool,

    /// Whether automatic locking is currently possible: the daemon is
    /// enabled and no inhibition is outstanding.
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_display() {
        assert_eq!(Trigger::Idle.to_string(), "idle threshold crossed");
        assert_eq!(Trigger::Sleep.to_string(), "system is going to sleep");
        assert_eq!(Trigger::LidClose.to_string(), "lid is closed");
    }
}
