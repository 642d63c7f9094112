use serde::{Deserialize, Serialize};

/// Default simulation step, in milliseconds.
pub const DEFAULT_MSEC_PER_TICK: u32 = 16;

/// Simulation clock: a tick counter plus a fixed step length.
///
/// Deferred events are scheduled in game milliseconds so that delays written
/// in configuration ("wait 0.25") do not depend on the step length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    tick: u64,
    msec_per_tick: u32,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_MSEC_PER_TICK)
    }
}

impl Clock {
    pub fn new(msec_per_tick: u32) -> Self {
        Self {
            tick: 0,
            msec_per_tick: msec_per_tick.max(1),
        }
    }

    /// Rebuild a clock from persisted parts.
    pub fn from_parts(tick: u64, msec_per_tick: u32) -> Self {
        Self {
            tick,
            msec_per_tick: msec_per_tick.max(1),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn msec_per_tick(&self) -> u32 {
        self.msec_per_tick
    }

    /// Current game time in milliseconds.
    pub fn time_ms(&self) -> u64 {
        self.tick * u64::from(self.msec_per_tick)
    }

    /// Length of one step in seconds.
    pub fn frame_seconds(&self) -> f32 {
        self.msec_per_tick as f32 / 1000.0
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }
}

/// Seconds to milliseconds, clamped at zero.
pub fn sec_to_ms(seconds: f32) -> u64 {
    if seconds <= 0.0 || !seconds.is_finite() {
        0
    } else {
        (seconds * 1000.0).round() as u64
    }
}

pub fn ms_to_sec(ms: i64) -> f32 {
    ms as f32 / 1000.0
}
