//! Power-management signals from UPower and systemd-logind.
//!
//! Sleep is announced by UPower's legacy `Sleeping` signal or by logind's
//! `PrepareForSleep(true)`. Lid state arrives as UPower's legacy `Changed`
//! signal (after which `LidIsClosed` is queried) or as a `LidIsClosed`
//! property change. Whichever the running services provide is forwarded.
//! The lid state found at startup is not an event.

use anyhow::{Context, Result};
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::proxy::CacheProperties;
use zbus::{Connection, proxy};

use crate::coordinator::Event;

#[proxy(
    interface = "org.freedesktop.UPower",
    default_service = "org.freedesktop.UPower",
    default_path = "/org/freedesktop/UPower"
)]
trait UPower {
    #[zbus(signal)]
    fn sleeping(&self) -> zbus::Result<()>;

    #[zbus(signal)]
    fn changed(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn lid_is_closed(&self) -> zbus::Result<bool>;
}

#[proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LoginManager {
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

/// A raw notification, before the lid state is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PowerSignal {
    Sleeping,
    /// UPower changed something; the lid state has to be queried.
    Changed,
    Lid(bool),
}

/// Subscribe to power signals on the system bus and forward them to the
/// coordinator from a background task.
pub async fn start(system: &Connection, events: mpsc::Sender<Event>) -> Result<JoinHandle<()>> {
    let upower = UPowerProxy::new(system)
        .await
        .context("Failed to create UPower proxy")?;
    // The cached proxy lags behind `Changed`, so the lid is queried uncached
    let lid_query = UPowerProxy::builder(system)
        .cache_properties(CacheProperties::No)
        .build()
        .await
        .context("Failed to create UPower proxy")?;

    let mut signals: Vec<BoxStream<'static, PowerSignal>> = Vec::new();

    signals.push(
        upower
            .receive_sleeping()
            .await
            .context("Failed to subscribe to UPower Sleeping")?
            .map(|_| PowerSignal::Sleeping)
            .boxed(),
    );
    signals.push(
        upower
            .receive_changed()
            .await
            .context("Failed to subscribe to UPower Changed")?
            .map(|_| PowerSignal::Changed)
            .boxed(),
    );
    signals.push(
        upower
            .receive_lid_is_closed_changed()
            .await
            // The first item is the current value, not a change
            .skip(1)
            .then(|change| async move {
                match change.get().await {
                    Ok(closed) => Some(PowerSignal::Lid(closed)),
                    Err(e) => {
                        warn!("Failed to read LidIsClosed change: {}", e);
                        None
                    }
                }
            })
            .filter_map(|signal| async move { signal })
            .boxed(),
    );

    match login_manager_sleep(system).await {
        Ok(stream) => signals.push(stream),
        Err(e) => warn!("logind sleep notifications unavailable: {:#}", e),
    }

    let mut signals = stream::select_all(signals);

    Ok(tokio::spawn(async move {
        info!("Listening for power-management signals");
        while let Some(signal) = signals.next().await {
            let event = match signal {
                PowerSignal::Sleeping => Event::Sleeping,
                PowerSignal::Lid(closed) => Event::LidChanged { closed },
                PowerSignal::Changed => match lid_query.lid_is_closed().await {
                    Ok(closed) => Event::LidChanged { closed },
                    Err(e) => {
                        warn!("Failed to query LidIsClosed: {}", e);
                        continue;
                    }
                },
            };

            debug!("Power event: {:?}", event);
            if events.send(event).await.is_err() {
                debug!("Coordinator gone, stopping power listener");
                return;
            }
        }
        warn!("Power signal streams ended");
    }))
}

async fn login_manager_sleep(system: &Connection) -> Result<BoxStream<'static, PowerSignal>> {
    let manager = LoginManagerProxy::new(system)
        .await
        .context("Failed to create logind Manager proxy")?;
    let stream = manager
        .receive_prepare_for_sleep()
        .await
        .context("Failed to subscribe to PrepareForSleep")?;

    Ok(stream
        .filter_map(|signal| async move {
            match signal.args() {
                Ok(args) if *args.start() => Some(PowerSignal::Sleeping),
                Ok(_) => None,
                Err(e) => {
                    warn!("Malformed PrepareForSleep signal: {}", e);
                    None
                }
            }
        })
        .boxed())
}
