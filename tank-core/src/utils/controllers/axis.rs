//! Per-wheel state and tuning for the tank drive.
//!
//! A `WheelAxis` carries the commanded and realized speed of one wheel plus the
//! timestamp of its last step pulse. Only the `DriveController` owns axes; the
//! slew limiter and the pulse generator borrow them for the duration of a tick.

use serde::{Deserialize, Serialize};

/// Longest cooperative pause allowed between ticks (µs).
pub const MAX_YIELD_US: u32 = 5_000;

/// Errors raised while validating drive tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// A speed or rate was zero, negative or not finite.
    NonPositive,
    /// Braking must be at least as strong as acceleration.
    DecelBelowAccel { accel_rate: f32, decel_rate: f32 },
    /// The loop pause would coarsen step timing beyond `MAX_YIELD_US`.
    YieldTooLong(u32),
}

/// Speed ceiling and slew rates for one wheel.
///
/// Speeds are in steps/second, rates in steps/second per millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    pub max_speed: f32,
    pub accel_rate: f32,
    pub decel_rate: f32,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            max_speed: 1500.0,
            accel_rate: 2.0,
            decel_rate: 5.0,
        }
    }
}

impl AxisConfig {
    /// Build a validated axis configuration.
    pub fn new(
        max_speed: f32,
        accel_rate: f32,
        decel_rate: f32,
    ) -> Result<Self, ConfigError> {
        let cfg = Self {
            max_speed,
            accel_rate,
            decel_rate,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check that every value is usable and that braking outpaces acceleration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.max_speed) || !positive(self.accel_rate) || !positive(self.decel_rate) {
            return Err(ConfigError::NonPositive);
        }
        if self.decel_rate < self.accel_rate {
            return Err(ConfigError::DecelBelowAccel {
                accel_rate: self.accel_rate,
                decel_rate: self.decel_rate,
            });
        }
        Ok(())
    }
}

/// Tuning for the whole drive: both axes plus loop behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub left: AxisConfig,
    pub right: AxisConfig,
    /// Negate the right target; the right motor is mounted mirrored.
    pub invert_right: bool,
    /// Commanded magnitudes strictly below this snap to zero.
    pub deadband: f32,
    /// Cooperative pause between ticks (µs).
    pub yield_us: u32,
    /// Period of the status log line; 0 disables it.
    pub status_interval_ms: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            left: AxisConfig::default(),
            right: AxisConfig::default(),
            invert_right: true,
            deadband: 0.0,
            yield_us: 100,
            status_interval_ms: 0,
        }
    }
}

impl DriveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.left.validate()?;
        self.right.validate()?;
        if !self.deadband.is_finite() || self.deadband < 0.0 {
            return Err(ConfigError::NonPositive);
        }
        if self.yield_us > MAX_YIELD_US {
            return Err(ConfigError::YieldTooLong(self.yield_us));
        }
        Ok(())
    }
}

/// Realized and commanded speed of one wheel.
#[derive(Debug, Clone)]
pub struct WheelAxis {
    config: AxisConfig,
    current_speed: f32,
    target_speed: f32,
    last_pulse_us: u64,
}

impl WheelAxis {
    /// A wheel at rest with a zero target.
    pub fn new(config: AxisConfig) -> Self {
        Self {
            config,
            current_speed: 0.0,
            target_speed: 0.0,
            last_pulse_us: 0,
        }
    }

    pub fn config(&self) -> &AxisConfig {
        &self.config
    }

    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    pub fn target_speed(&self) -> f32 {
        self.target_speed
    }

    pub fn last_pulse_us(&self) -> u64 {
        self.last_pulse_us
    }

    /// Assign a new target, clamped to `±max_speed`. Returns the stored value.
    ///
    /// Non-finite input is treated as a stop request.
    pub fn set_target(
        &mut self,
        speed: f32,
    ) -> f32 {
        let max = self.config.max_speed;
        self.target_speed = if speed.is_finite() {
            // + 0.0 folds -0.0 into 0.0
            speed.clamp(-max, max) + 0.0
        } else {
            0.0
        };
        self.target_speed
    }

    pub(crate) fn set_current(
        &mut self,
        speed: f32,
    ) {
        let max = self.config.max_speed;
        self.current_speed = speed.clamp(-max, max);
    }

    pub(crate) fn mark_pulse(
        &mut self,
        now_us: u64,
    ) {
        self.last_pulse_us = now_us;
    }
}
