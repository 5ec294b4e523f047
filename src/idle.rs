//! Idle detection.
//!
//! Polls an [`IdleSource`] on a fixed interval and reports to the coordinator
//! whenever the user has been idle for longer than the threshold. Sources may
//! block (an X11 round-trip does), so samples are taken on the blocking pool.

pub mod x11;

pub use x11::X11IdleSource;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::coordinator::Event;
use crate::error::LockdError;

/// Interval between idle-time samples.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Anything that can tell how long the user has been idle.
pub trait IdleSource: Send + Sync + 'static {
    /// Time since the last user input.
    fn idle_time(&self) -> Result<Duration, LockdError>;
}

/// Whether `idle` is past `threshold`. Reaching it exactly is not enough.
pub fn exceeds_threshold(idle: Duration, threshold: Duration) -> bool {
    idle > threshold
}

/// Periodic idle-time sampler.
pub struct IdleMonitor<S> {
    source: Arc<S>,
    threshold: Duration,
    interval: Duration,
}

impl<S: IdleSource> IdleMonitor<S> {
    /// Create a monitor polling every [`POLL_INTERVAL`].
    pub fn new(source: S, threshold: Duration) -> Self {
        Self {
            source: Arc::new(source),
            threshold,
            interval: POLL_INTERVAL,
        }
    }

    /// Sample the idle source once.
    ///
    /// Returns whether the threshold is exceeded. A failed read is logged and
    /// counts as not idle.
    pub async fn check(&self) -> bool {
        let source = Arc::clone(&self.source);
        let sample = match tokio::task::spawn_blocking(move || source.idle_time()).await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Idle sampling task failed: {}", e);
                return false;
            }
        };

        match sample {
            Ok(idle) => {
                trace!("Idle for {:?}", idle);
                exceeds_threshold(idle, self.threshold)
            }
            Err(e) => {
                warn!("Failed to read idle time: {}", e);
                false
            }
        }
    }

    /// Start the background polling task.
    ///
    /// The task runs until the coordinator stops accepting events.
    pub fn start_polling(self, events: mpsc::Sender<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Idle monitor started, threshold {:?}, polling every {:?}",
                self.threshold, self.interval
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if !self.check().await {
                    continue;
                }

                debug!("Idle threshold of {:?} exceeded", self.threshold);
                if events.send(Event::IdleThresholdCrossed).await.is_err() {
                    debug!("Coordinator gone, stopping idle monitor");
                    return;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays a fixed sequence of samples, then reports no idleness.
    struct ScriptedSource {
        samples: Mutex<VecDeque<Result<Duration, LockdError>>>,
    }

    impl ScriptedSource {
        fn new(samples: Vec<Result<Duration, LockdError>>) -> Self {
            Self {
                samples: Mutex::new(samples.into()),
            }
        }
    }

    impl IdleSource for ScriptedSource {
        fn idle_time(&self) -> Result<Duration, LockdError> {
            self.samples
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Duration::ZERO))
        }
    }

    fn minutes(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    #[test]
    fn test_threshold_boundary() {
        let threshold = Duration::from_millis(300_000);
        assert!(exceeds_threshold(Duration::from_millis(300_001), threshold));
        assert!(!exceeds_threshold(Duration::from_millis(300_000), threshold));
        assert!(!exceeds_threshold(Duration::from_millis(299_999), threshold));
    }

    #[tokio::test]
    async fn test_check() {
        let monitor = IdleMonitor::new(
            ScriptedSource::new(vec![
                Ok(Duration::from_millis(299_999)),
                Ok(Duration::from_millis(300_001)),
            ]),
            minutes(5),
        );
        assert!(!monitor.check().await);
        assert!(monitor.check().await);
    }

    #[tokio::test]
    async fn test_check_survives_source_error() {
        let monitor = IdleMonitor::new(
            ScriptedSource::new(vec![
                Err(LockdError::IdleSource("display went away".to_string())),
                Ok(minutes(10)),
            ]),
            minutes(5),
        );
        assert!(!monitor.check().await);
        assert!(monitor.check().await);
    }

    /// Answers only after holding its thread for a while, like a stuck X server.
    struct StalledSource(Duration);

    impl IdleSource for StalledSource {
        fn idle_time(&self) -> Result<Duration, LockdError> {
            std::thread::sleep(self.0);
            Ok(minutes(10))
        }
    }

    #[tokio::test]
    async fn test_slow_source_does_not_stall_runtime() {
        let monitor = IdleMonitor::new(StalledSource(Duration::from_millis(800)), minutes(5));
        let start = Instant::now();
        let other = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Instant::now()
        });

        assert!(monitor.check().await);
        let other_done = other.await.unwrap();
        assert!(
            other_done - start < Duration::from_millis(500),
            "Other tasks must keep running while the source blocks"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_emits_event() {
        let source = ScriptedSource::new(vec![
            Ok(minutes(1)),
            Err(LockdError::IdleSource("transient".to_string())),
            Ok(minutes(6)),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let start = Instant::now();
        let task = IdleMonitor::new(source, minutes(5)).start_polling(tx);

        let event = rx.recv().await.expect("Monitor should emit an event");
        assert!(matches!(event, Event::IdleThresholdCrossed));
        // Third sample, taken two intervals after the first
        assert!(start.elapsed() >= 2 * POLL_INTERVAL);
        assert!(!task.is_finished(), "Errors must not stop polling");

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_coordinator_gone() {
        let source = ScriptedSource::new(vec![Ok(minutes(10))]);
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let task = IdleMonitor::new(source, minutes(5)).start_polling(tx);
        task.await.unwrap();
    }
}
