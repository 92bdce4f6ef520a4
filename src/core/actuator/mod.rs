// src/core/actuator/mod.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::hardware::ActuatorDriver;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    high: bool,
    /// Bumped on every open/close. A deferred close fires only if its
    /// generation still matches, so a stale timer can never close a channel
    /// that was re-opened after it was armed.
    generation: u64,
}

/// Owns all level changes on the lock hardware. `open` drives a channel high
/// and arms a deferred close; `close` drives it low immediately and cancels
/// anything pending. All state lives behind one mutex held only for the
/// duration of a level change.
pub struct ActuatorController {
    driver: Arc<dyn ActuatorDriver>,
    channels: Arc<Mutex<HashMap<u8, ChannelState>>>,
    auto_close: Duration,
}

impl ActuatorController {
    pub fn new(driver: Arc<dyn ActuatorDriver>, auto_close: Duration) -> Self {
        Self {
            driver,
            channels: Arc::new(Mutex::new(HashMap::new())),
            auto_close,
        }
    }

    /// Drives `channel` high and schedules a close after the auto-close
    /// interval. A second open while a close is pending replaces the pending
    /// timer rather than stacking a second one.
    pub fn open(&self, channel: u8) -> Result<()> {
        let generation = {
            let mut channels = self.channels.lock();
            let state = channels.entry(channel).or_default();
            state.generation += 1;
            self.driver.set_level(channel, true)?;
            state.high = true;
            state.generation
        };
        info!(channel, "opened locker channel");

        let driver = Arc::clone(&self.driver);
        let channels = Arc::clone(&self.channels);
        let auto_close = self.auto_close;
        tokio::spawn(async move {
            tokio::time::sleep(auto_close).await;
            let mut channels = channels.lock();
            let Some(state) = channels.get_mut(&channel) else {
                return;
            };
            if state.generation != generation {
                // A later open or close superseded this timer.
                return;
            }
            match driver.set_level(channel, false) {
                Ok(()) => {
                    state.high = false;
                    info!(channel, "auto-closed locker channel");
                }
                Err(e) => warn!(channel, error = %e, "auto-close failed"),
            }
        });

        Ok(())
    }

    /// Drives `channel` low immediately, cancelling any pending auto-close.
    pub fn close(&self, channel: u8) -> Result<()> {
        let mut channels = self.channels.lock();
        let state = channels.entry(channel).or_default();
        state.generation += 1;
        self.driver.set_level(channel, false)?;
        state.high = false;
        info!(channel, "closed locker channel");
        Ok(())
    }

    /// Registers `channels` and forces them low. Used at startup to bring
    /// every persisted assignment's hardware into the closed state.
    pub fn reset(&self, channels: impl IntoIterator<Item = u8>) {
        let mut states = self.channels.lock();
        for channel in channels {
            let state = states.entry(channel).or_default();
            state.generation += 1;
            if let Err(e) = self.driver.set_level(channel, false) {
                warn!(channel, error = %e, "failed to reset channel");
                continue;
            }
            state.high = false;
        }
    }

    /// Forces every known channel low, regardless of in-flight timers. Called
    /// before the driver is released at shutdown.
    pub fn shutdown_all(&self) {
        let mut channels = self.channels.lock();
        for (&channel, state) in channels.iter_mut() {
            state.generation += 1;
            match self.driver.set_level(channel, false) {
                Ok(()) => state.high = false,
                Err(e) => warn!(channel, error = %e, "failed to close channel at shutdown"),
            }
        }
        info!("all locker channels closed");
    }

    pub fn is_open(&self, channel: u8) -> bool {
        self.channels.lock().get(&channel).map_or(false, |s| s.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Records every level transition instead of touching hardware.
    #[derive(Default)]
    struct RecordingDriver {
        transitions: Mutex<Vec<(u8, bool)>>,
        closes: AtomicU64,
    }

    impl ActuatorDriver for RecordingDriver {
        fn set_level(&self, channel: u8, high: bool) -> Result<()> {
            self.transitions.lock().push((channel, high));
            if !high {
                self.closes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn open_auto_closes_after_interval() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = ActuatorController::new(driver.clone(), Duration::from_secs(5));

        controller.open(3).unwrap();
        assert!(controller.is_open(3));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!controller.is_open(3));
        assert_eq!(driver.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reopen_supersedes_pending_timer() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = ActuatorController::new(driver.clone(), Duration::from_secs(5));

        controller.open(3).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        controller.open(3).unwrap();

        // First timer's deadline passes; the channel must stay open because
        // the second open bumped the generation.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(controller.is_open(3));
        assert_eq!(driver.closes.load(Ordering::SeqCst), 0);

        // Second timer fires: exactly one close.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!controller.is_open(3));
        assert_eq!(driver.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_close_cancels_pending_timer() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = ActuatorController::new(driver.clone(), Duration::from_secs(5));

        controller.open(3).unwrap();
        controller.close(3).unwrap();
        assert_eq!(driver.closes.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        // The armed timer was cancelled by the generation bump.
        assert_eq!(driver.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_forces_every_known_channel_low() {
        let driver = Arc::new(RecordingDriver::default());
        let controller = ActuatorController::new(driver.clone(), Duration::from_secs(60));

        controller.open(3).unwrap();
        controller.open(4).unwrap();
        controller.shutdown_all();

        assert!(!controller.is_open(3));
        assert!(!controller.is_open(4));
        assert_eq!(driver.closes.load(Ordering::SeqCst), 2);
    }
}
