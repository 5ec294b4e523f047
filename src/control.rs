//! The `net.zombofant.autolockd` bus interface.
//!
//! Methods and property reads are forwarded to the coordinator. Properties
//! are read-only: their setters exist only to answer `Set` with
//! `PropertyReadOnly`. zbus faults on unknown properties and interfaces.

use anyhow::{Context, Result};
use tracing::info;
use zbus::{Connection, fdo, interface};

use crate::coordinator::CoordinatorHandle;
use crate::inhibit::Cookie;

/// Well-known bus name and interface name.
pub const BUS_NAME: &str = "net.zombofant.autolockd";
pub const INTERFACE: &str = "net.zombofant.autolockd";
pub const OBJECT_PATH: &str = "/net/zombofant/autolockd";

/// Bus-facing adapter over [`CoordinatorHandle`].
pub struct ControlSurface {
    coordinator: CoordinatorHandle,
}

impl ControlSurface {
    pub fn new(coordinator: CoordinatorHandle) -> Self {
        Self { coordinator }
    }
}

#[interface(name = "net.zombofant.autolockd")]
impl ControlSurface {
    /// Lock now, regardless of inhibitions or the enable switch.
    async fn lock(&self) -> fdo::Result<()> {
        Ok(self.coordinator.lock().await?)
    }

    /// Unlock, if allowed by the configuration.
    async fn unlock(&self) -> fdo::Result<()> {
        Ok(self.coordinator.unlock().await?)
    }

    /// Re-enable automatic locking.
    async fn enable(&self) -> fdo::Result<()> {
        Ok(self.coordinator.enable().await?)
    }

    /// Disable automatic locking. Does not unlock.
    async fn disable(&self) -> fdo::Result<()> {
        Ok(self.coordinator.disable().await?)
    }

    /// Suppress automatic locking until the returned cookie is released.
    async fn inhibit(&self) -> fdo::Result<Cookie> {
        let cookie = self.coordinator.inhibit().await?;
        info!("Inhibition {} granted", cookie);
        Ok(cookie)
    }

    /// Release an inhibition obtained from `Inhibit`.
    async fn uninhibit(&self, cookie: Cookie) -> fdo::Result<()> {
        self.coordinator.uninhibit(cookie).await?;
        info!("Inhibition {} released", cookie);
        Ok(())
    }

    #[zbus(property)]
    async fn allow_unlock(&self) -> fdo::Result<bool> {
        Ok(self.coordinator.state().await?.allow_unlock)
    }

    #[zbus(property)]
    async fn set_allow_unlock(&self, _value: bool) -> fdo::Result<()> {
        Err(read_only("AllowUnlock"))
    }

    #[zbus(property)]
    async fn locked(&self) -> fdo::Result<bool> {
        Ok(self.coordinator.state().await?.locked)
    }

    #[zbus(property)]
    async fn set_locked(&self, _value: bool) -> fdo::Result<()> {
        Err(read_only("Locked"))
    }

    /// True while automatic locking can happen: enabled and not inhibited.
    #[zbus(property)]
    async fn enabled(&self) -> fdo::Result<bool> {
        Ok(self.coordinator.state().await?.enabled)
    }

    #[zbus(property)]
    async fn set_enabled(&self, _value: bool) -> fdo::Result<()> {
        Err(read_only("Enabled"))
    }
}

// zbus answers `Set` on a getter-only property with `UnknownProperty`.
fn read_only(property: &str) -> fdo::Error {
    fdo::Error::PropertyReadOnly(format!("Property '{property}' is read-only"))
}

/// Export the control surface on the session bus and claim [`BUS_NAME`].
///
/// The returned connection must be kept alive for the interface to stay up.
pub async fn serve(coordinator: CoordinatorHandle) -> Result<Connection> {
    let connection = zbus::connection::Builder::session()
        .context("Failed to connect to session DBus")?
        .name(BUS_NAME)
        .context("Invalid bus name")?
        .serve_at(OBJECT_PATH, ControlSurface::new(coordinator))
        .context("Failed to export control interface")?
        .build()
        .await
        .with_context(|| format!("Failed to register {BUS_NAME} on the session bus"))?;

    info!("Control interface available at {} on {}", OBJECT_PATH, BUS_NAME);
    Ok(connection)
}
