//! Slew-rate limiting for wheel speed.
//!
//! Each tick the realized speed of a wheel moves toward its target by at most
//! `rate * dt_ms`, where the rate depends on whether the wheel is speeding up
//! (`accel_rate`) or slowing down / reversing (`decel_rate`). The phase is
//! derived fresh from the current and target speeds every tick; nothing about
//! the previous tick is remembered.
//!
//! # Example
//! ```rust
//! use tank_core::utils::controllers::{AxisConfig, WheelAxis};
//! use tank_core::utils::math::slew;
//!
//! let mut axis = WheelAxis::new(AxisConfig::new(1000.0, 50.0, 100.0).unwrap());
//! axis.set_target(500.0);
//! assert_eq!(slew::advance(&mut axis, 20.0), 500.0);
//! ```

use libm::fabsf;

use crate::utils::controllers::WheelAxis;

/// Slew regime of a wheel for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AtTarget,
    /// Leaving rest, or gaining magnitude in the direction already turning.
    Accelerating,
    /// Losing magnitude toward zero, or heading for the opposite direction.
    Decelerating,
}

impl Phase {
    /// Classify the move from `current` to `target`.
    pub fn of(
        current: f32,
        target: f32,
    ) -> Self {
        let same_dir = target != 0.0 && (current > 0.0) == (target > 0.0);
        if current == target {
            Phase::AtTarget
        } else if current == 0.0 || (same_dir && fabsf(target) > fabsf(current)) {
            Phase::Accelerating
        } else {
            Phase::Decelerating
        }
    }
}

/// Move `axis` toward its target for `dt_ms` milliseconds of elapsed time.
///
/// Never overshoots the target. A zero (or negative) `dt_ms` leaves the axis
/// unchanged. Returns the new current speed.
pub fn advance(
    axis: &mut WheelAxis,
    dt_ms: f32,
) -> f32 {
    let current = axis.current_speed();
    let target = axis.target_speed();

    let rate = match Phase::of(current, target) {
        Phase::AtTarget => return current,
        Phase::Accelerating => axis.config().accel_rate,
        Phase::Decelerating => axis.config().decel_rate,
    };
    if dt_ms.is_nan() || dt_ms <= 0.0 {
        return current;
    }

    let delta = rate * dt_ms;
    let next = if target > current {
        (current + delta).min(target)
    } else {
        (current - delta).max(target)
    };
    axis.set_current(next);
    axis.current_speed()
}
