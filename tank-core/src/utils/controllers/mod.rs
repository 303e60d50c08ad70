//! Module Exports
//!
//! This file exports the wheel-level control modules and the controller that
//! ties them together.
//!
//! - `axis`: per-wheel speed state and drive tuning.
//! - `stepper`: step/direction pulse generation.

pub mod axis;
/// Module for step/direction output timing.
pub mod stepper;

use embassy_time::{Duration, Instant, Timer};
use embedded_hal::{delay::DelayNs, digital::OutputPin};
use embedded_io_async::{Read, ReadReady, Write};
use libm::fabsf;

pub use axis::{AxisConfig, ConfigError, DriveConfig, WheelAxis, MAX_YIELD_US};
pub use stepper::{StepPulseGenerator, StepperError, PULSE_WIDTH_US};

use crate::utils::connection::{
    command::{targets_reply, text_reply},
    Command, CommandChannel, Inbound, Reply, HANDSHAKE_REPLY, USAGE_REPLY,
};
use crate::utils::math::slew::{self, Phase};

/// Read chunk size for the serial link.
const RX_CHUNK: usize = 32;

/// One wheel: its speed state and its outputs.
struct Wheel<P> {
    axis: WheelAxis,
    stepper: StepPulseGenerator<P>,
}

/// Point-in-time view of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSnapshot {
    pub current_speed: f32,
    pub target_speed: f32,
    pub phase: Phase,
    pub pulses: u32,
}

/// Point-in-time view of both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveSnapshot {
    pub left: AxisSnapshot,
    pub right: AxisSnapshot,
}

/// Owner of both wheel axes; runs one control tick per loop iteration.
///
/// Each tick applies at most one pending command line, advances both slew
/// limiters by the same elapsed time, then polls both pulse generators at the
/// same instant. A command is therefore always fully applied before any wheel
/// reacts to it.
pub struct DriveController<P, DL> {
    left: Wheel<P>,
    right: Wheel<P>,
    delay: DL,
    commands: CommandChannel,
    config: DriveConfig,
    last_tick_ms: Option<u64>,
}

impl<P, DL, E> DriveController<P, DL>
where
    P: OutputPin<Error = E>,
    DL: DelayNs,
    E: core::fmt::Debug,
{
    /// Build a controller from `(step, dir)` output pairs for each wheel.
    pub fn new(
        config: DriveConfig,
        left: (P, P),
        right: (P, P),
        delay: DL,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            left: Wheel {
                axis: WheelAxis::new(config.left),
                stepper: StepPulseGenerator::new(left.0, left.1),
            },
            right: Wheel {
                axis: WheelAxis::new(config.right),
                stepper: StepPulseGenerator::new(right.0, right.1),
            },
            delay,
            commands: CommandChannel::new(),
            config,
            last_tick_ms: None,
        })
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub fn left(&self) -> &WheelAxis {
        &self.left.axis
    }

    pub fn right(&self) -> &WheelAxis {
        &self.right.axis
    }

    /// Bytes lost because the command queue was full.
    pub fn dropped_bytes(&self) -> u32 {
        self.commands.dropped()
    }

    /// Queue raw bytes from the command link. Returns how many were kept.
    pub fn feed(
        &mut self,
        bytes: &[u8],
    ) -> usize {
        self.commands.push(bytes)
    }

    /// Liveness handshake; never touches the axes.
    pub fn handshake(&self) -> &'static str {
        HANDSHAKE_REPLY
    }

    /// Set both wheel targets from a left/right command.
    ///
    /// Values are deadbanded and clamped to each axis' `max_speed`; the right
    /// target is negated when `invert_right` is set. Returns the applied
    /// values in the caller's frame, i.e. before the right-side inversion.
    pub fn set_targets(
        &mut self,
        left: f32,
        right: f32,
    ) -> (f32, f32) {
        let (left, right) = (self.deadband(left), self.deadband(right));
        let left = self.left.axis.set_target(left);
        let right = if self.config.invert_right {
            // 0.0 - x keeps a zero target from echoing as -0
            0.0 - self.right.axis.set_target(-right)
        } else {
            self.right.axis.set_target(right)
        };
        (left, right)
    }

    fn deadband(
        &self,
        value: f32,
    ) -> f32 {
        if fabsf(value) < self.config.deadband {
            0.0
        } else {
            value
        }
    }

    fn apply(
        &mut self,
        inbound: Inbound,
    ) -> Reply {
        match inbound {
            Ok(Command::Hello) => {
                tracing::info!("handshake");
                text_reply(self.handshake())
            }
            Ok(Command::SetTargets { left, right }) => {
                let (left, right) = self.set_targets(left, right);
                tracing::info!(left, right, "targets set");
                targets_reply(left, right)
            }
            Err(error) => {
                tracing::warn!(?error, "rejected command line");
                text_reply(USAGE_REPLY)
            }
        }
    }

    /// Run one control tick at monotonic time `now_us`.
    ///
    /// Returns the reply to the command consumed this tick, if any.
    pub fn tick(
        &mut self,
        now_us: u64,
    ) -> Option<Reply> {
        let reply = self.commands.next_line().map(|inbound| self.apply(inbound));

        let now_ms = now_us / 1_000;
        let dt_ms = self
            .last_tick_ms
            .map_or(0, |last| now_ms.saturating_sub(last)) as f32;
        self.last_tick_ms = Some(now_ms);

        slew::advance(&mut self.left.axis, dt_ms);
        slew::advance(&mut self.right.axis, dt_ms);

        if let Err(error) = self.left.stepper.tick(&mut self.left.axis, now_us, &mut self.delay) {
            tracing::error!(?error, "left step output failed");
        }
        if let Err(error) = self.right.stepper.tick(&mut self.right.axis, now_us, &mut self.delay) {
            tracing::error!(?error, "right step output failed");
        }

        reply
    }

    pub fn snapshot(&self) -> DriveSnapshot {
        fn axis<P>(wheel: &Wheel<P>) -> AxisSnapshot {
            let current = wheel.axis.current_speed();
            let target = wheel.axis.target_speed();
            AxisSnapshot {
                current_speed: current,
                target_speed: target,
                phase: Phase::of(current, target),
                pulses: wheel.stepper.pulse_count(),
            }
        }
        DriveSnapshot {
            left: axis(&self.left),
            right: axis(&self.right),
        }
    }

    fn log_status(&self) {
        let s = self.snapshot();
        tracing::info!(
            left_speed = s.left.current_speed,
            left_target = s.left.target_speed,
            left_pulses = s.left.pulses,
            right_speed = s.right.current_speed,
            right_target = s.right.target_speed,
            right_pulses = s.right.pulses,
            "drive status"
        );
    }

    /// Run one loop iteration against the command link at time `now_us`.
    ///
    /// Reads a chunk only when the link reports data ready, so the tick never
    /// waits on the link. The reply to the command consumed this tick, if any,
    /// is written back with a newline and also returned.
    pub async fn serve<IO>(
        &mut self,
        io: &mut IO,
        now_us: u64,
    ) -> Option<Reply>
    where
        IO: Read + Write + ReadReady,
    {
        let mut chunk = [0u8; RX_CHUNK];
        match io.read_ready() {
            Ok(true) => match io.read(&mut chunk).await {
                Ok(n) => {
                    self.feed(&chunk[..n]);
                }
                Err(error) => tracing::warn!(?error, "serial read failed"),
            },
            Ok(false) => {}
            Err(error) => tracing::warn!(?error, "serial poll failed"),
        }

        let reply = self.tick(now_us)?;
        if let Err(error) = write_reply(io, &reply).await {
            tracing::warn!(?error, "serial write failed");
        }
        Some(reply)
    }

    /// Serve the command link and run the control loop forever.
    ///
    /// Between iterations the loop pauses for `yield_us`.
    pub async fn run<IO>(
        &mut self,
        mut io: IO,
    ) -> !
    where
        IO: Read + Write + ReadReady,
    {
        let pause = Duration::from_micros(self.config.yield_us as u64);
        let status_every = Duration::from_millis(self.config.status_interval_ms as u64);
        let mut last_status = Instant::now();

        tracing::info!(config = ?self.config, "drive loop started");

        loop {
            let now = Instant::now();
            self.serve(&mut io, now.as_micros()).await;

            if self.config.status_interval_ms > 0 && now.duration_since(last_status) >= status_every {
                last_status = now;
                self.log_status();
            }

            Timer::after(pause).await;
        }
    }
}

async fn write_reply<W: Write>(
    io: &mut W,
    reply: &str,
) -> Result<(), W::Error> {
    io.write_all(reply.as_bytes()).await?;
    io.write_all(b"\n").await?;
    io.flush().await
}
