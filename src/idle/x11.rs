//! Idle time from the X11 MIT-SCREEN-SAVER extension.

use std::time::Duration;

use tracing::info;
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::screensaver::{self, ConnectionExt as _};
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use super::IdleSource;
use crate::error::LockdError;

/// Reads the user's idle time from the X server.
pub struct X11IdleSource {
    connection: RustConnection,
    root: Window,
}

impl X11IdleSource {
    /// Connect to `display_name`, or to `$DISPLAY` when `None`.
    ///
    /// Fails if the display cannot be opened or lacks the screensaver extension.
    pub fn connect(display_name: Option<&str>) -> Result<Self, LockdError> {
        let (connection, screen_num) = RustConnection::connect(display_name)
            .map_err(|e| LockdError::IdleSource(format!("Could not open display: {e}")))?;

        let extension = connection
            .extension_information(screensaver::X11_EXTENSION_NAME)
            .map_err(|e| LockdError::IdleSource(e.to_string()))?;
        if extension.is_none() {
            return Err(LockdError::IdleSource(
                "XScreenSaver extension not supported".to_string(),
            ));
        }

        let root = connection
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| LockdError::IdleSource(format!("No screen {screen_num}")))?;

        info!("Reading idle time from X11 screen {}", screen_num);
        Ok(Self { connection, root })
    }
}

impl IdleSource for X11IdleSource {
    fn idle_time(&self) -> Result<Duration, LockdError> {
        let info = self
            .connection
            .screensaver_query_info(self.root)
            .map_err(|e| LockdError::IdleSource(e.to_string()))?
            .reply()
            .map_err(|e| LockdError::IdleSource(e.to_string()))?;

        Ok(Duration::from_millis(u64::from(info.ms_since_user_input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_display_is_idle_source_error() {
        let result = X11IdleSource::connect(Some(":4242"));
        match result {
            Err(LockdError::IdleSource(msg)) => assert!(msg.contains("Could not open display")),
            Err(other) => panic!("Expected IdleSource error, got {other:?}"),
            Ok(_) => panic!("Display :4242 should not exist"),
        }
    }
}
