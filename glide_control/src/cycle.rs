//! The realtime cycle.
//!
//! One cooperative task at fixed priority: read sensors → tick the
//! controller → apply outputs → publish telemetry → sleep out the
//! remainder of the period. The sleep is shortened by a low-passed
//! estimate of observed tardiness so the long-run cadence holds despite
//! jitter.
//!
//! RT setup (memory locking, CPU pinning, `SCHED_FIFO`) is gated behind
//! the `rt` cargo feature; the default build (simulation, tests, CI) runs
//! the same loop under the normal scheduler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use glide_common::hal::{Buzzer, FootPads, Imu, LockStore, MotorLink, PlotSink, Printer};

use crate::console;
use crate::controller::{BuzzerCmd, Controller, ControllerEvent, MotorAction};
use crate::sensors::FrameBuilder;
use crate::telemetry::{DebugFields, Telemetry};

/// Chime notes: switching frequencies for the startup tune [Hz].
const TUNE_FREQS: [f32; 4] = [2093.0, 2637.0, 3135.0, 4186.0];

/// Errors during RT setup. The loop itself never fails — failures inside
/// it are controller state transitions.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("RT setup error: {0}")]
    RtSetup(String),
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{mlockall, MlockAllFlags};
    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(()) // No-op in simulation mode
}

/// Prefault stack pages so the loop never page-faults.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the task to one CPU core.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;
    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(()) // No-op in simulation mode
}

/// Set `SCHED_FIFO` with the given priority.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(()) // No-op in simulation mode
}

/// Full RT setup sequence; call once before entering the loop.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Loop Timing ────────────────────────────────────────────────────

/// Cadence bookkeeping: observed period and low-passed overshoot.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopTiming {
    last_time_us: u64,
    pub diff_time_us: u64,
    pub filtered_diff_time_us: f32,
    pub loop_overshoot_us: i64,
    pub filtered_overshoot_us: f32,
}

impl LoopTiming {
    /// Record one loop start. `alpha == 0` disables overshoot tracking.
    pub fn observe(&mut self, now_us: u64, loop_time_us: u64, alpha: f32) {
        if self.last_time_us == 0 {
            self.last_time_us = now_us;
        }
        self.diff_time_us = now_us.saturating_sub(self.last_time_us);
        // Purely a metric.
        self.filtered_diff_time_us =
            0.03 * self.diff_time_us as f32 + 0.97 * self.filtered_diff_time_us;
        self.last_time_us = now_us;
        if alpha > 0.0 {
            self.loop_overshoot_us = self.diff_time_us as i64
                - (loop_time_us as i64 - self.filtered_overshoot_us.round() as i64);
            self.filtered_overshoot_us = alpha * self.loop_overshoot_us as f32
                + (1.0 - alpha) * self.filtered_overshoot_us;
        }
    }

    /// How long to sleep to hold the cadence [µs].
    pub fn sleep_us(&self, loop_time_us: u64) -> u64 {
        let sleep = loop_time_us as i64 - self.filtered_overshoot_us.round() as i64;
        sleep.max(0) as u64
    }
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the controller and the hardware handles and drives the loop.
pub struct CycleRunner {
    pub controller: Controller,
    pub telemetry: Arc<Telemetry>,
    pub timing: LoopTiming,
    frame_builder: FrameBuilder,
    imu: Box<dyn Imu + Send>,
    motor: Box<dyn MotorLink + Send>,
    pads: Box<dyn FootPads + Send>,
    buzzer: Box<dyn Buzzer + Send>,
    lock_store: Box<dyn LockStore + Send>,
    printer: Box<dyn Printer + Send>,
    plot: Box<dyn PlotSink + Send>,
    shutdown: Arc<AtomicBool>,
}

impl CycleRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        controller: Controller,
        telemetry: Arc<Telemetry>,
        imu: Box<dyn Imu + Send>,
        motor: Box<dyn MotorLink + Send>,
        pads: Box<dyn FootPads + Send>,
        buzzer: Box<dyn Buzzer + Send>,
        lock_store: Box<dyn LockStore + Send>,
        printer: Box<dyn Printer + Send>,
        plot: Box<dyn PlotSink + Send>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            controller,
            telemetry,
            timing: LoopTiming::default(),
            frame_builder: FrameBuilder::new(),
            imu,
            motor,
            pads,
            buzzer,
            lock_store,
            printer,
            plot,
            shutdown,
        }
    }

    /// Enter the loop; returns when the shutdown flag is raised. The motor
    /// is braked and the buzzer silenced on the way out.
    pub fn run(&mut self) {
        info!(
            hertz = self.controller.d.hertz,
            loop_time_us = self.controller.d.loop_time_us,
            "balance cycle started"
        );
        let epoch = Instant::now();
        while !self.shutdown.load(Ordering::Relaxed) {
            // The epoch offset keeps tick zero distinct from the timing
            // bookkeeping's unset state.
            let now_us = epoch.elapsed().as_micros() as u64 + 1;
            self.tick_once(now_us);
            std::thread::sleep(Duration::from_micros(
                self.timing.sleep_us(self.controller.d.loop_time_us),
            ));
        }
        // Force the buzzer off regardless of ongoing beep patterns, then
        // park the motor on the brake.
        self.buzzer.off(true);
        self.motor.timeout_reset();
        self.motor
            .set_brake_current(self.controller.cfg.brake_current);
        info!("balance cycle stopped");
    }

    /// One full iteration minus the pacing sleep.
    pub fn tick_once(&mut self, now_us: u64) {
        self.timing.observe(
            now_us,
            self.controller.d.loop_time_us,
            self.controller.d.loop_overshoot_alpha,
        );

        let frame = self.frame_builder.build(
            self.imu.as_ref(),
            self.motor.as_ref(),
            self.pads.as_ref(),
            self.controller.d.erpm_sign,
            now_us,
        );

        let prev_state = self.controller.state;
        let outputs = self.controller.tick(&frame);
        if self.controller.state != prev_state {
            debug!(from = ?prev_state, to = ?self.controller.state, "state transition");
        }

        for cmd in &outputs.buzzer {
            match *cmd {
                BuzzerCmd::On(force) => self.buzzer.on(force),
                BuzzerCmd::Off(force) => self.buzzer.off(force),
                BuzzerCmd::Alert(beeps, long) => self.buzzer.alert(beeps, long),
            }
        }
        self.buzzer.update();

        match outputs.motor {
            MotorAction::Current(current) => {
                self.motor.timeout_reset();
                self.motor
                    .set_current_off_delay(self.controller.d.motor_timeout_s);
                self.motor.set_current(current);
            }
            MotorAction::Brake => {
                self.motor.timeout_reset();
                self.motor
                    .set_brake_current(self.controller.cfg.brake_current);
            }
            MotorAction::None => {}
        }

        if let Some(locked) = outputs.persist_lock {
            self.lock_store.persist_lock(locked);
        }

        if let Some(event) = outputs.event {
            self.handle_event(event);
        }

        // ── Telemetry & debug outputs ──
        let debug = DebugFields {
            motor_position: frame.motor_position,
            setpoint: self.controller.setpoint,
            torquetilt_filtered_current: self.controller.torque.filtered_current,
            derivative: self.controller.pid.derivative,
            pitch_rate: frame.last_pitch - frame.pitch,
            motor_current: frame.motor_current,
            erpm: frame.erpm,
            abs_erpm: frame.abs_erpm,
            loop_time_us: self.controller.d.loop_time_us as f32,
            diff_time_us: self.timing.diff_time_us as f32,
            loop_overshoot_us: self.timing.loop_overshoot_us as f32,
            filtered_overshoot_us: self.timing.filtered_overshoot_us,
            filtered_diff_time_us: self.timing.filtered_diff_time_us,
        };
        self.telemetry.publish(
            self.controller.pid.pid_value,
            frame.pitch,
            frame.roll,
            frame.motor_current,
            frame.adc1,
            frame.adc2,
            self.timing.diff_time_us as u32,
            self.controller.state,
            self.controller.shaper.mode,
            self.controller.turn.cutback,
            self.controller.switch_state,
            self.controller.ride_state,
            self.controller.status_flags(),
            &debug,
        );
        console::drive_debug_outputs(
            &self.telemetry,
            &debug,
            now_us as f32 / 1000.0,
            self.printer.as_mut(),
            self.plot.as_mut(),
        );
    }

    /// Slow-path sequences. These are the only places the task blocks
    /// outside the end-of-tick sleep.
    fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::MotorParamsMissing => {
                self.buzzer.on(true);
                std::thread::sleep(Duration::from_millis(100));
                self.buzzer.off(true);
                std::thread::sleep(Duration::from_millis(100));
            }
            ControllerEvent::StartupComplete { v_in } => {
                let tune = self.controller.cfg.deadzone;
                if tune > 0.0 {
                    self.play_tune(tune == 1.0);
                }
                // Let the rider know the board is ready.
                self.buzzer.on(true);
                std::thread::sleep(Duration::from_millis(100));
                self.buzzer.off(true);
                // One beep per volt within 5 V of the LV threshold.
                let mut threshold = self.controller.cfg.tiltback_lv + 5.0;
                if v_in < threshold {
                    std::thread::sleep(Duration::from_millis(300));
                    while v_in < threshold {
                        std::thread::sleep(Duration::from_millis(200));
                        self.buzzer.on(true);
                        std::thread::sleep(Duration::from_millis(300));
                        self.buzzer.off(true);
                        threshold -= 1.0;
                    }
                }
            }
            ControllerEvent::InactivityNag => {
                for _ in 0..3 {
                    self.buzzer.on(true);
                    std::thread::sleep(Duration::from_millis(200));
                    self.buzzer.off(true);
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }

    /// Wiggle the motor at chime frequencies. Without frequency changes,
    /// limit to a single 1 A back-and-forth wiggle.
    fn play_tune(&mut self, change_freqs: bool) {
        let original_sw = self.motor.switching_frequency();
        let mut current = 1.0;
        for (i, freq) in TUNE_FREQS.iter().enumerate() {
            if change_freqs {
                self.motor.set_switching_frequency(*freq);
            }
            self.motor.set_current(current);
            std::thread::sleep(Duration::from_millis(50));
            self.motor.set_current(0.0);
            std::thread::sleep(Duration::from_millis(10));
            current = -current;
            if !change_freqs && i > 0 {
                break;
            }
        }
        if change_freqs {
            self.motor.set_switching_frequency(original_sw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_first_observation_has_zero_diff() {
        let mut t = LoopTiming::default();
        t.observe(5000, 1000, 0.02);
        assert_eq!(t.diff_time_us, 0);
    }

    #[test]
    fn timing_tracks_period() {
        let mut t = LoopTiming::default();
        t.observe(1000, 1000, 0.0);
        t.observe(2100, 1000, 0.0);
        assert_eq!(t.diff_time_us, 1100);
        // Metric filter moves 3% toward the observation.
        assert!((t.filtered_diff_time_us - 0.03 * 1100.0).abs() < 1e-2);
        // Overshoot tracking disabled: sleep is the nominal period.
        assert_eq!(t.sleep_us(1000), 1000);
    }

    #[test]
    fn overshoot_compensation_holds_cadence() {
        let mut t = LoopTiming::default();
        let alpha = 0.02;
        let mut now = 1000u64;
        t.observe(now, 1000, alpha);
        // Closed loop: each iteration sleeps what the filter says, then
        // wakes 100 µs late.
        for _ in 0..5000 {
            now += t.sleep_us(1000) + 100;
            t.observe(now, 1000, alpha);
        }
        // The filtered overshoot converges to the tardiness, so the sleep
        // shrinks by the same amount and the period returns to nominal.
        assert!(
            (t.filtered_overshoot_us - 100.0).abs() < 5.0,
            "{}",
            t.filtered_overshoot_us
        );
        assert_eq!(t.sleep_us(1000), 900);
        assert!((t.diff_time_us as i64 - 1000).abs() <= 1);
    }

    #[test]
    fn sleep_never_negative() {
        let mut t = LoopTiming::default();
        t.filtered_overshoot_us = 5000.0;
        assert_eq!(t.sleep_us(1000), 0);
    }
}
