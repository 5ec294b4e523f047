//! Lock coordinator.
//!
//! All trigger sources (idle polling, power signals, bus commands) feed one
//! ordered event channel. The coordinator consumes it from a single task and
//! runs every handler to completion before taking the next event, so the
//! guard check and the lock action it gates can never interleave with another
//! event.
//!
//! Policy:
//! - Automatic triggers lock only while the daemon is enabled and no
//!   inhibition is outstanding.
//! - An explicit `Lock()` always locks.
//! - Nothing ever unlocks implicitly. Enabling, disabling or releasing the
//!   last inhibition leaves the current lock state alone.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::config::LockPolicy;
use crate::domain::{LockState, Trigger};
use crate::error::LockdError;
use crate::inhibit::{Cookie, InhibitionRegistry};
use crate::locker::Locker;

/// Capacity of the coordinator's event queue.
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// Something the coordinator reacts to.
#[derive(Debug)]
pub enum Event {
    /// The idle monitor saw idle time above the threshold.
    IdleThresholdCrossed,

    /// The system announced it is about to sleep.
    Sleeping,

    /// The lid state was reported.
    LidChanged { closed: bool },

    /// A command from the control surface.
    Command(Command),
}

/// Commands issued over the control surface. Each carries a reply channel.
#[derive(Debug)]
pub enum Command {
    Lock(oneshot::Sender<Result<(), LockdError>>),
    Unlock(oneshot::Sender<()>),
    Enable(oneshot::Sender<()>),
    Disable(oneshot::Sender<()>),
    Inhibit(oneshot::Sender<Cookie>),
    Uninhibit(Cookie, oneshot::Sender<Result<(), LockdError>>),
    State(oneshot::Sender<LockState>),
}

/// Owner of the lock state.
pub struct LockCoordinator<L> {
    /// Master switch, flipped only by `Enable()` / `Disable()`.
    active: bool,
    inhibitions: InhibitionRegistry,
    locker: L,
    policy: LockPolicy,
}

impl<L: Locker> LockCoordinator<L> {
    pub fn new(locker: L, policy: LockPolicy) -> Self {
        Self {
            active: true,
            inhibitions: InhibitionRegistry::new(),
            locker,
            policy,
        }
    }

    /// Consume events until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<Event>) {
        debug!("Lock coordinator started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("Event channel closed, lock coordinator stopping");
    }

    /// Handle a single event.
    pub async fn handle(&mut self, event: Event) {
        match event {
            Event::IdleThresholdCrossed => self.lock_filtered(Trigger::Idle),
            Event::Sleeping => self.lock_filtered(Trigger::Sleep),
            Event::LidChanged { closed: true } => self.lock_filtered(Trigger::LidClose),
            Event::LidChanged { closed: false } => debug!("Lid opened"),
            Event::Command(command) => self.handle_command(command).await,
        }
    }

    async fn handle_command(&mut self, command: Command) {
        // A dropped reply receiver means the caller went away; the command
        // itself has still been applied.
        match command {
            Command::Lock(reply) => {
                let _ = reply.send(self.lock());
            }
            Command::Unlock(reply) => {
                self.unlock().await;
                let _ = reply.send(());
            }
            Command::Enable(reply) => {
                self.enable();
                let _ = reply.send(());
            }
            Command::Disable(reply) => {
                self.disable();
                let _ = reply.send(());
            }
            Command::Inhibit(reply) => {
                let _ = reply.send(self.inhibit());
            }
            Command::Uninhibit(cookie, reply) => {
                let _ = reply.send(self.uninhibit(cookie));
            }
            Command::State(reply) => {
                let _ = reply.send(self.state());
            }
        }
    }

    /// Whether automatic triggers may lock right now.
    pub fn is_armed(&self) -> bool {
        self.active && self.inhibitions.is_empty()
    }

    fn trigger_enabled(&self, trigger: Trigger) -> bool {
        match trigger {
            Trigger::Idle => self.policy.on_idle,
            Trigger::Sleep => self.policy.on_sleep,
            Trigger::LidClose => self.policy.on_lid_close,
        }
    }

    /// Lock in response to an automatic trigger, if the guard allows it.
    pub fn lock_filtered(&mut self, trigger: Trigger) {
        if !self.trigger_enabled(trigger) {
            debug!("Ignoring trigger ({}): disabled in config", trigger);
            return;
        }
        if !self.is_armed() {
            debug!(
                "Not locking ({}): active={}, inhibitions={}",
                trigger,
                self.active,
                self.inhibitions.len()
            );
            return;
        }

        if !self.locker.is_locked() {
            info!("Locking: {}", trigger);
        }
        if let Err(e) = self.locker.ensure_lock() {
            error!("Lock attempt failed: {}", e);
        }
    }

    /// Lock unconditionally.
    pub fn lock(&mut self) -> Result<(), LockdError> {
        info!("Received lock command");
        self.locker.ensure_lock()
    }

    /// Unlock, if the configuration permits it.
    pub async fn unlock(&mut self) {
        info!("Received unlock command");
        if !self.policy.allow_unlock {
            info!("Unlocking not allowed by config");
            return;
        }
        self.locker.ensure_unlock().await;
    }

    pub fn enable(&mut self) {
        info!("Received enable command, enabling");
        self.active = true;
    }

    pub fn disable(&mut self) {
        info!("Received disable command, disabling");
        self.active = false;
    }

    pub fn inhibit(&mut self) -> Cookie {
        self.inhibitions.inhibit()
    }

    /// Release an inhibition. Never locks or unlocks by itself.
    pub fn uninhibit(&mut self, cookie: Cookie) -> Result<(), LockdError> {
        self.inhibitions.uninhibit(cookie)
    }

    /// Current observable state. Reconciles the locker first.
    pub fn state(&mut self) -> LockState {
        LockState {
            allow_unlock: self.policy.allow_unlock,
            locked: self.locker.is_locked(),
            enabled: self.is_armed(),
        }
    }
}

/// Cloneable sender side used by the control surface.
///
/// Every call is queued behind events already in flight and answered once
/// the coordinator has handled it.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    events: mpsc::Sender<Event>,
}

impl CoordinatorHandle {
    pub fn new(events: mpsc::Sender<Event>) -> Self {
        Self { events }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, LockdError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(Event::Command(command(reply)))
            .await
            .map_err(|_| LockdError::CoordinatorGone)?;
        response.await.map_err(|_| LockdError::CoordinatorGone)
    }

    pub async fn lock(&self) -> Result<(), LockdError> {
        self.request(Command::Lock).await?
    }

    pub async fn unlock(&self) -> Result<(), LockdError> {
        self.request(Command::Unlock).await
    }

    pub async fn enable(&self) -> Result<(), LockdError> {
        self.request(Command::Enable).await
    }

    pub async fn disable(&self) -> Result<(), LockdError> {
        self.request(Command::Disable).await
    }

    pub async fn inhibit(&self) -> Result<Cookie, LockdError> {
        self.request(Command::Inhibit).await
    }

    pub async fn uninhibit(&self, cookie: Cookie) -> Result<(), LockdError> {
        self.request(|reply| Command::Uninhibit(cookie, reply)).await?
    }

    pub async fn state(&self) -> Result<LockState, LockdError> {
        self.request(Command::State).await
    }
}
