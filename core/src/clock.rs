//! Simulation clock: owns elapsed time, tick count and speed control.

use crate::types::{Days, Tick};
use serde::{Deserialize, Serialize};

pub const MIN_TIME_SPEED: f64 = 0.1;
pub const MAX_TIME_SPEED: f64 = 1000.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub elapsed_days: Days,
    pub current_tick: Tick,
    pub time_speed:   f64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            elapsed_days: 0.0,
            current_tick: 0,
            time_speed:   1.0,
        }
    }
}

impl SimClock {
    /// Advance by `dt` days. Returns the new tick number.
    /// Negative or non-finite deltas are treated as zero so time never
    /// runs backwards.
    pub fn advance(&mut self, dt: Days) -> Tick {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed_days += dt;
        }
        self.current_tick += 1;
        self.current_tick
    }

    /// Set the speed multiplier, clamped to the supported range.
    /// Returns the value actually applied.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        self.time_speed = clamp_speed(speed);
        self.time_speed
    }
}

pub fn clamp_speed(speed: f64) -> f64 {
    if !speed.is_finite() {
        return 1.0;
    }
    speed.clamp(MIN_TIME_SPEED, MAX_TIME_SPEED)
}
