use std::path::PathBuf;

use clap::Parser;
use embassy_executor::Executor;
use embassy_time::Delay;
use static_cell::StaticCell;
use tank_core::mk_static;
use tank_core::utils::controllers::{DriveConfig, DriveController};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod sim;
use sim::{SimPin, StdioSerial};

type Drive = DriveController<SimPin, Delay>;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// JSON drive configuration; the flags below override it
    #[clap(long)]
    config: Option<PathBuf>,
    /// Top wheel speed for both axes (steps/s)
    #[clap(long)]
    max_speed: Option<f32>,
    /// Acceleration rate for both axes (steps/s per ms)
    #[clap(long)]
    accel: Option<f32>,
    /// Deceleration rate for both axes (steps/s per ms)
    #[clap(long)]
    decel: Option<f32>,
    /// Commands with a smaller magnitude are treated as zero
    #[clap(long)]
    deadband: Option<f32>,
    /// Pause between control ticks (µs)
    #[clap(long)]
    yield_us: Option<u32>,
    /// Log a status line this often (ms); 0 disables it
    #[clap(long)]
    status_ms: Option<u32>,
    /// Do not negate the right wheel target
    #[clap(long)]
    no_invert_right: bool,
    /// Print the effective configuration as JSON and exit
    #[clap(long)]
    print_config: bool,
}

fn load_config(opts: &Opts) -> Result<DriveConfig, Box<dyn std::error::Error + Send + Sync>> {
    let mut config = match &opts.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => DriveConfig::default(),
    };

    for axis in [&mut config.left, &mut config.right] {
        if let Some(v) = opts.max_speed {
            axis.max_speed = v;
        }
        if let Some(v) = opts.accel {
            axis.accel_rate = v;
        }
        if let Some(v) = opts.decel {
            axis.decel_rate = v;
        }
    }
    if let Some(v) = opts.deadband {
        config.deadband = v;
    }
    if let Some(v) = opts.yield_us {
        config.yield_us = v;
    }
    if let Some(v) = opts.status_ms {
        config.status_interval_ms = v;
    }
    if opts.no_invert_right {
        config.invert_right = false;
    }

    config
        .validate()
        .map_err(|e| format!("invalid drive configuration: {e:?}"))?;
    Ok(config)
}

#[embassy_executor::task]
async fn drive_task(
    ctrl: &'static mut Drive,
    serial: StdioSerial,
) -> ! {
    ctrl.run(serial).await
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let config = match load_config(&opts) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };

    if opts.print_config {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("could not render configuration: {e}"),
        }
        return;
    }

    let drive = match DriveController::new(
        config,
        (SimPin::new("left_step"), SimPin::new("left_dir")),
        (SimPin::new("right_step"), SimPin::new("right_dir")),
        Delay,
    ) {
        Ok(drive) => drive,
        Err(e) => {
            error!("drive controller rejected configuration: {e:?}");
            std::process::exit(2);
        }
    };
    let drive = mk_static!(Drive, drive);

    info!("Reading 'L,R' or 'hello' lines from stdin");
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(drive_task(drive, StdioSerial::open())).unwrap();
    });
}
