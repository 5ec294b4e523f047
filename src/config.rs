//! Configuration loading and defaults for autolockd.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Unit in which `lock.idletime` is expressed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdleUnit {
    Hour,
    /// Minutes (default).
    #[default]
    Min,
    Sec,
}

impl IdleUnit {
    /// Length of one unit in milliseconds.
    pub fn millis(self) -> u64 {
        match self {
            Self::Hour => 60 * 60 * 1000,
            Self::Min => 60 * 1000,
            Self::Sec => 1000,
        }
    }
}

/// The `[lock]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSection {
    /// Lock command, run through `sh -c` (default: "pyxtrlock").
    pub cmd: String,

    /// Lock after `idletime` of user inactivity (default: true).
    pub onidle: bool,

    /// Idle threshold, in `idleunit` units (default: 5).
    pub idletime: u64,

    /// Unit for `idletime` (default: min).
    pub idleunit: IdleUnit,

    /// Lock when the lid closes (default: true).
    pub onlidclose: bool,

    /// Lock when the system is about to sleep (default: true).
    pub onsleep: bool,

    /// How long an unlock waits for the locker to exit before killing it (default: 5).
    pub unlock_timeout_seconds: u64,
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            cmd: "pyxtrlock".to_string(),
            onidle: true,
            idletime: 5,
            idleunit: IdleUnit::default(),
            onlidclose: true,
            onsleep: true,
            unlock_timeout_seconds: 5,
        }
    }
}

/// The `[unlock]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockSection {
    /// Whether the `Unlock()` command is honored (default: true).
    pub allow: bool,
}

impl Default for UnlockSection {
    fn default() -> Self {
        Self { allow: true }
    }
}

/// Main configuration for autolockd.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lock: LockSection,
    pub unlock: UnlockSection,
}

/// The subset of the configuration the coordinator decides with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub on_idle: bool,
    pub on_sleep: bool,
    pub on_lid_close: bool,
    pub allow_unlock: bool,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Config::default().policy()
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("autolockd").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }

    /// Idle duration after which an idle lock triggers.
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.lock.idletime.saturating_mul(self.lock.idleunit.millis()))
    }

    /// Upper bound on the wait for the locker to exit during unlock.
    pub fn unlock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock.unlock_timeout_seconds)
    }

    pub fn policy(&self) -> LockPolicy {
        LockPolicy {
            on_idle: self.lock.onidle,
            on_sleep: self.lock.onsleep,
            on_lid_close: self.lock.onlidclose,
            allow_unlock: self.unlock.allow,
        }
    }
}
