//! Process-wide time source.
//!
//! Prediction and logging code must behave identically whether it is driven
//! by a live feed or by replayed history, so nothing reads the wall clock
//! directly. Everything goes through [`SystemClock`], which defaults to live
//! time and can be switched exactly once into playback mode, after which the
//! time only moves when it is explicitly set (typically to the timestamp of
//! the last replayed report).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

/// Explicitly settable epoch time used in playback mode.
#[derive(Debug)]
pub struct SettableTime {
    epoch_ms: AtomicI64,
}

impl SettableTime {
    fn new(epoch_ms: i64) -> Self {
        Self {
            epoch_ms: AtomicI64::new(epoch_ms),
        }
    }

    fn get(&self) -> i64 {
        self.epoch_ms.load(Ordering::SeqCst)
    }

    fn set(&self, epoch_ms: i64) {
        self.epoch_ms.store(epoch_ms, Ordering::SeqCst);
    }
}

/// The time source consulted by all time-dependent logic.
#[derive(Debug, Default)]
pub struct SystemClock {
    // Present only once playback mode has been enabled. Single writer,
    // many readers; the atomic inside guarantees reads are never torn.
    playback: OnceLock<Arc<SettableTime>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch time in milliseconds. Wall clock when live, the last
    /// explicitly set value when in playback mode.
    pub fn now_ms(&self) -> i64 {
        match self.playback.get() {
            Some(settable) => settable.get(),
            None => chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Switch to playback mode. May be called at most once per process;
    /// later calls are reported and ignored.
    pub fn enable_playback(&self, epoch_ms: i64) {
        if self
            .playback
            .set(Arc::new(SettableTime::new(epoch_ms)))
            .is_err()
        {
            tracing::error!("playback mode already enabled, ignoring");
        }
    }

    pub fn is_playback(&self) -> bool {
        self.playback.get().is_some()
    }

    /// Advance the playback clock. No-op with a report when live, since a
    /// live clock must never be set.
    pub fn set_ms(&self, epoch_ms: i64) {
        match self.playback.get() {
            Some(settable) => settable.set(epoch_ms),
            None => tracing::error!("attempt to set the clock outside playback mode"),
        }
    }
}
