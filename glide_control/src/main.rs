//! Balance controller binary.
//!
//! Runs the full control loop against the simulated board. On hardware
//! the same [`glide_control::cycle::CycleRunner`] is constructed with the
//! real driver handles instead; everything above the hal traits is
//! identical.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use glide_common::config::AppConfig;
use glide_common::hal::MotorLink;
use glide_control::console::Console;
use glide_control::controller::Controller;
use glide_control::cycle::{rt_setup, CycleRunner};
use glide_control::sim::{LogPlotSink, SimBoard, StdoutPrinter};
use glide_control::telemetry::Telemetry;

#[derive(Parser, Debug)]
#[command(name = "glide_control", about = "Single-wheel balance controller")]
struct Args {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulate a rider standing on the pads.
    #[arg(long)]
    rider: bool,

    /// CPU core to pin the control task to (rt builds).
    #[arg(long, default_value_t = 0)]
    cpu: usize,

    /// SCHED_FIFO priority (rt builds).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let app_config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => {
            warn!("no config file given, riding on defaults");
            AppConfig::default()
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        })?;
    }

    let telemetry = Arc::new(Telemetry::new());
    let board = SimBoard::new(args.rider);

    // Console thread: feed stdin lines to the command dispatcher.
    {
        let telemetry = telemetry.clone();
        std::thread::spawn(move || {
            let mut console = Console::new(telemetry, StdoutPrinter, LogPlotSink::default());
            let stdin = std::io::stdin();
            for line in stdin.lock().lines().map_while(Result::ok) {
                console.handle(&line);
            }
        });
    }

    rt_setup(args.cpu, args.rt_priority)?;

    let controller = Controller::new(&app_config);
    let mut runner = CycleRunner::new(
        controller,
        telemetry,
        Box::new(board.clone()),
        Box::new(board.clone()),
        Box::new(board.clone()),
        Box::new(board.clone()),
        Box::new(board.clone()),
        Box::new(StdoutPrinter),
        Box::new(LogPlotSink::default()),
        shutdown,
    );

    info!(rider = args.rider, "starting balance loop");
    runner.run();

    // Release the motor on the way out.
    let mut board = board;
    board.set_current(0.0);
    Ok(())
}
