//! Step/direction pulse generation for one stepper driver.
//!
//! The generator owns the step and direction outputs of a wheel and is polled
//! once per control tick. It fires at most one pulse per poll, whenever the
//! time since the last pulse has reached the interval implied by the wheel's
//! current speed.

use embedded_hal::{delay::DelayNs, digital::OutputPin};
use libm::fabsf;

use super::WheelAxis;

/// High time of a step pulse (µs).
pub const PULSE_WIDTH_US: u32 = 1;

/// Errors that can occur while driving the step/direction outputs.
#[derive(Debug)]
pub enum StepperError<E: core::fmt::Debug> {
    Step(E),
    Direction(E),
}

/// Pulse scheduler over a step output and a direction output.
pub struct StepPulseGenerator<P> {
    step: P,
    dir: P,
    pulses: u32,
}

impl<P> StepPulseGenerator<P> {
    pub fn new(
        step: P,
        dir: P,
    ) -> Self {
        Self {
            step,
            dir,
            pulses: 0,
        }
    }

    /// Pulses emitted since construction (wrapping).
    pub fn pulse_count(&self) -> u32 {
        self.pulses
    }

    /// Desired spacing between pulses at `speed` steps/second, or `None` at rest.
    pub fn interval_us(speed: f32) -> Option<f32> {
        if speed == 0.0 {
            None
        } else {
            Some(1_000_000.0 / fabsf(speed))
        }
    }
}

impl<P, E> StepPulseGenerator<P>
where
    P: OutputPin<Error = E>,
    E: core::fmt::Debug,
{
    /// Emit a pulse for `axis` if one is due at `now_us`.
    ///
    /// Sets direction from the sign of the current speed, raises the step line
    /// for `PULSE_WIDTH_US` and records `now_us` as the pulse instant. Returns
    /// whether a pulse was emitted. On a pin failure the pulse instant is left
    /// untouched. If the step line fails to drop after going high, the drop is
    /// retried once; when that also fails the line may be left high and the
    /// error is returned.
    pub fn tick<D: DelayNs>(
        &mut self,
        axis: &mut WheelAxis,
        now_us: u64,
        delay: &mut D,
    ) -> Result<bool, StepperError<E>> {
        let speed = axis.current_speed();
        let Some(interval) = Self::interval_us(speed) else {
            return Ok(false);
        };
        let elapsed = now_us.saturating_sub(axis.last_pulse_us());
        if (elapsed as f32) < interval {
            return Ok(false);
        }

        let dir = if speed > 0.0 {
            self.dir.set_high()
        } else {
            self.dir.set_low()
        };
        dir.map_err(StepperError::Direction)?;

        self.step.set_high().map_err(StepperError::Step)?;
        delay.delay_us(PULSE_WIDTH_US);
        if let Err(error) = self.step.set_low() {
            tracing::warn!(?error, "step line stuck high, retrying");
            self.step.set_low().map_err(StepperError::Step)?;
        }

        axis.mark_pulse(now_us);
        self.pulses = self.pulses.wrapping_add(1);
        tracing::trace!(now_us, speed, "step");
        Ok(true)
    }
}
