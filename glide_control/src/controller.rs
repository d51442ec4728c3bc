//! The balance controller.
//!
//! A single owning value, mutated only by the realtime task. Each tick
//! consumes one sensor frame and fills an [`Outputs`] value; the cycle
//! runner applies the outputs to the hardware. Blocking side effects
//! (startup chime, battery beeps, inactivity nag) are reported as events —
//! the controller itself never sleeps.

use glide_common::config::{AppConfig, BalanceConfig};
use glide_common::state::{BalanceState, RideState, SwitchState};

use crate::config::{configure, Derived};
use crate::control::PidController;
use crate::faults::{FaultMonitor, ReverseContext};
use crate::lock::LockSequence;
use crate::ride;
use crate::sensors::{AccelWindow, SensorFrame};
use crate::setpoint::SetpointShaper;
use crate::switch;
use crate::telemetry::StatusFlags;
use crate::tilt::{NoseAngling, TorqueTilt, TurnTilt, YawTracker};
use crate::util::sign;

// ─── Outputs ────────────────────────────────────────────────────────

/// Motor command for this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MotorAction {
    /// Leave the motor alone (brake released after timeout).
    #[default]
    None,
    /// Drive the given current [A].
    Current(f32),
    /// Apply the configured brake current.
    Brake,
}

/// One buzzer call, in issue order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuzzerCmd {
    /// `on(force)`.
    On(bool),
    /// `off(force)`.
    Off(bool),
    /// `alert(beeps, long)`.
    Alert(u8, bool),
}

/// Slow-path work the cycle runner must do on the controller's behalf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerEvent {
    /// Motor identification never ran; refuse to arm, short beep.
    MotorParamsMissing,
    /// Left `Startup`: play the chime and the battery-level beeps.
    StartupComplete { v_in: f32 },
    /// Inactivity timeout expired: triple-beep nag.
    InactivityNag,
}

/// Everything one tick produced.
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    pub motor: MotorAction,
    /// Buzzer calls in the order the tick issued them.
    pub buzzer: heapless::Vec<BuzzerCmd, 4>,
    pub persist_lock: Option<bool>,
    pub event: Option<ControllerEvent>,
}

impl Outputs {
    fn buzz(&mut self, cmd: BuzzerCmd) {
        // Sized for the worst tick; an overflow would mean a new buzzer
        // call site was added without growing the queue.
        if self.buzzer.push(cmd).is_err() {
            debug_assert!(false, "buzzer command queue overflow");
        }
    }
}

// ─── Controller ─────────────────────────────────────────────────────

pub struct Controller {
    pub cfg: BalanceConfig,
    pub d: Derived,
    motor_params_ok: bool,

    pub state: BalanceState,
    pub switch_state: SwitchState,
    pub ride_state: RideState,

    pub shaper: SetpointShaper,
    pub reverse: ReverseContext,
    pub nose: NoseAngling,
    pub torque: TorqueTilt,
    pub turn: TurnTilt,
    pub yaw: YawTracker,
    pub pid: PidController,
    pub faults: FaultMonitor,
    pub lock: LockSequence,

    /// Final setpoint of the last tick [deg].
    pub setpoint: f32,
    accel_window: AccelWindow,
    last_erpm_smooth: f32,
    /// Windowed acceleration [erpm/tick].
    pub acceleration: f32,

    pub start_click_counter: u32,
    pub current_limiting: bool,
    inactivity_timer_us: Option<u64>,
    /// Runtime copy: re-arms to 10 s after each nag.
    inactivity_timeout_s: f32,
    brake_timeout_us: u64,
}

impl Controller {
    pub fn new(app: &AppConfig) -> Self {
        let d = configure(app);
        Self {
            cfg: app.balance.clone(),
            motor_params_ok: app.motor.params_configured(),
            state: BalanceState::Startup,
            switch_state: SwitchState::Off,
            ride_state: RideState::Off,
            shaper: SetpointShaper::default(),
            reverse: ReverseContext::default(),
            nose: NoseAngling::default(),
            torque: TorqueTilt::new(&d),
            turn: TurnTilt::default(),
            yaw: YawTracker::default(),
            pid: PidController::default(),
            faults: FaultMonitor::new(),
            lock: LockSequence::new(d.initially_locked),
            setpoint: 0.0,
            accel_window: AccelWindow::default(),
            last_erpm_smooth: 0.0,
            acceleration: 0.0,
            start_click_counter: 0,
            current_limiting: false,
            inactivity_timer_us: None,
            inactivity_timeout_s: d.inactivity_timeout_s,
            brake_timeout_us: 0,
            d,
        }
    }

    /// Restore every accumulator for a fresh engage and enter `Running`.
    pub fn reset_vars(&mut self, frame: &SensorFrame) {
        self.pid.reset(&self.d);
        self.setpoint = frame.pitch;
        self.shaper.reset(frame.pitch);
        self.reverse.active = false;
        self.nose.reset();
        self.torque.reset();
        self.turn.reset();
        self.yaw.reset();
        self.accel_window.reset();
        self.start_click_counter = self.d.start_clicks_max;
        self.current_limiting = false;
        self.brake_timeout_us = 0;
        self.state = BalanceState::Running;
    }

    /// Status word for telemetry.
    pub fn status_flags(&self) -> StatusFlags {
        let mut flags = StatusFlags::empty();
        flags.set(StatusFlags::CURRENT_LIMITING, self.current_limiting);
        flags.set(StatusFlags::CUTBACK, self.turn.cutback);
        flags.set(StatusFlags::STATIC_CLIMB, self.torque.static_climb);
        flags.set(
            StatusFlags::BRAKING,
            sign(self.pid.last_proportional) != sign(self.last_erpm_smooth),
        );
        flags.set(StatusFlags::LOCKED, self.lock.is_locked);
        flags
    }

    /// One control tick.
    pub fn tick(&mut self, frame: &SensorFrame) -> Outputs {
        let mut out = Outputs::default();

        // ── Preamble: trackers that run in every state ──
        self.yaw.update(frame.yaw);
        self.turn.track_roll(frame);
        let acceleration_raw = frame.smooth_erpm - self.last_erpm_smooth;
        self.last_erpm_smooth = frame.smooth_erpm;
        self.acceleration = self.accel_window.push(acceleration_raw);

        self.switch_state = switch::classify(
            frame.adc1,
            frame.adc2,
            self.cfg.fault_adc1,
            self.cfg.fault_adc2,
        );
        // Pads released at riding speed can precede a nosedive: alert.
        if switch::alert_at_speed(
            self.switch_state,
            frame.abs_erpm,
            self.cfg.fault_adc_half_erpm,
            self.state,
        ) {
            out.buzz(BuzzerCmd::On(true));
        } else {
            out.buzz(BuzzerCmd::Off(false));
        }

        // ── State dispatch ──
        match self.state {
            BalanceState::Startup => self.tick_startup(frame, &mut out),
            s if s.is_running() => self.tick_running(frame, &mut out),
            BalanceState::FaultDuty => {
                // A duty fault only clears through another fault.
                // Otherwise it would clear as soon as the motor pauses,
                // then the motor would spool up again.
                if let Some(fault) = self.faults.check(
                    frame,
                    self.switch_state,
                    &self.cfg,
                    &self.d,
                    &mut self.reverse,
                    true,
                ) {
                    self.state = fault;
                }
                self.brake(frame, &mut out);
            }
            _ => self.tick_fault(frame, &mut out),
        }

        self.ride_state = ride::classify(
            self.state,
            frame.erpm,
            frame.abs_erpm,
            self.pid.pid_value,
            self.cfg.fault_adc_half_erpm,
        );
        out
    }

    // ── Startup ──

    fn tick_startup(&mut self, frame: &SensorFrame, out: &mut Outputs) {
        self.brake(frame, out);
        if frame.imu_ready {
            if !self.motor_params_ok {
                // Identification values still at their defaults — this
                // can't be good.
                out.event = Some(ControllerEvent::MotorParamsMissing);
            } else {
                self.reset_vars(frame);
                // Trigger a fault so the start conditions must be met
                // before balancing begins.
                self.state = BalanceState::FaultStartup;
                out.event = Some(ControllerEvent::StartupComplete { v_in: frame.v_in });
            }
        }
        self.inactivity_timer_us = None;
    }

    // ── Running ──

    fn tick_running(&mut self, frame: &SensorFrame, out: &mut Outputs) {
        self.inactivity_timer_us = None;
        self.lock.rearm();

        if let Some(fault) = self.faults.check(
            frame,
            self.switch_state,
            &self.cfg,
            &self.d,
            &mut self.reverse,
            false,
        ) {
            // Motor output stops next tick, from the fault state.
            self.state = fault;
            return;
        }

        let effects =
            self.shaper
                .calculate_target(frame, &self.cfg, &self.d, &mut self.reverse);
        if let Some(state) = effects.state {
            self.state = state;
        }
        if effects.clear_integral {
            self.pid.integral = 0.0;
        }
        if let Some((beeps, long)) = effects.beep {
            out.buzz(BuzzerCmd::Alert(beeps, long));
        }
        self.shaper.interpolate(&self.d);
        let mut setpoint = self.shaper.interpolated;

        if self.shaper.mode.is_tiltback() {
            // Nose angling and torque tilt stay in effect even during
            // tiltback situations.
            setpoint += self
                .nose
                .apply(frame, &self.cfg, &self.d, self.torque.interpolated);
            setpoint += self.torque.apply(
                frame,
                self.acceleration,
                setpoint,
                self.pid.last_proportional,
                self.pid.pid_value,
                self.turn.cutback,
                &self.cfg,
                &self.d,
            );
            setpoint += self.turn.apply(
                frame,
                &mut self.yaw,
                self.torque.target,
                self.nose.interpolated,
                self.state,
                &self.cfg,
                &self.d,
            );
        }
        self.setpoint = setpoint;

        let pid_outcome = self.pid.compute(
            frame,
            setpoint,
            self.shaper.mode,
            self.torque.interpolated,
            &self.d,
        );
        if pid_outcome.jerk_beep {
            out.buzz(BuzzerCmd::Alert(1, false));
        }

        // Saturate to the motor limits; the clamped value feeds next
        // tick's smoothing.
        if self.pid.pid_value > self.d.mc_current_max {
            self.pid.pid_value = self.d.mc_current_max - 3.0;
            out.buzz(BuzzerCmd::On(true));
            self.current_limiting = true;
        } else if self.pid.pid_value < self.d.mc_current_min {
            self.pid.pid_value = self.d.mc_current_min + 3.0;
            out.buzz(BuzzerCmd::On(true));
            self.current_limiting = true;
        } else if self.current_limiting {
            self.current_limiting = false;
            out.buzz(BuzzerCmd::Off(false));
        }

        // Audible engage clicks (skipped for stealth start).
        let current = if self.start_click_counter > 0 {
            self.start_click_counter -= 1;
            if self.start_click_counter == 0 || self.start_click_counter == 2 {
                self.pid.pid_value - self.d.click_current
            } else {
                self.pid.pid_value + self.d.click_current
            }
        } else {
            self.pid.pid_value
        };
        out.motor = MotorAction::Current(current);
    }

    // ── Faults ──

    fn tick_fault(&mut self, frame: &SensorFrame, out: &mut Outputs) {
        // A board that was powered on but never ridden is probably just
        // charging: only nag once the voltage gets low.
        if self.state != BalanceState::FaultStartup
            || frame.v_in < self.cfg.tiltback_lv + 2.0
        {
            let timer = *self
                .inactivity_timer_us
                .get_or_insert(frame.time_us);
            if self.inactivity_timeout_s > 0.0
                && frame.time_us.saturating_sub(timer) as f32 / 1_000_000.0
                    > self.inactivity_timeout_s
            {
                out.event = Some(ControllerEvent::InactivityNag);
                // Beep again in 10 seconds.
                self.inactivity_timeout_s = 10.0;
                self.inactivity_timer_us = Some(frame.time_us);
            }
        }

        let lock_outcome = self.lock.check(
            frame.time_us,
            self.switch_state,
            frame.adc1,
            frame.adc2,
            self.cfg.fault_adc1,
            self.cfg.fault_adc2,
            self.d.nrf_channel,
        );
        if let Some(locked) = lock_outcome.persist {
            out.persist_lock = Some(locked);
        }
        if let Some((beeps, long)) = lock_outcome.beep {
            out.buzz(BuzzerCmd::Alert(beeps, long));
        }

        // Valid mounting position clears the fault.
        if !self.lock.is_locked
            && frame.pitch.abs() < self.cfg.startup_pitch_tolerance
            && frame.roll.abs() < self.cfg.startup_roll_tolerance
            && self.switch_state == SwitchState::On
        {
            self.reset_vars(frame);
            return;
        }
        self.brake(frame, out);
    }

    // ── Brake shaping ──

    fn brake(&mut self, frame: &SensorFrame, out: &mut Outputs) {
        // While the board moves (or on the first call) keep re-arming the
        // release timeout; once it expires at standstill, let the motor go.
        if self.d.brake_timeout_s > 0.0 && (frame.abs_erpm > 1.0 || self.brake_timeout_us == 0) {
            self.brake_timeout_us =
                frame.time_us + (self.d.brake_timeout_s * 1_000_000.0) as u64;
        }
        if self.brake_timeout_us != 0 && frame.time_us > self.brake_timeout_us {
            return;
        }
        out.motor = MotorAction::Brake;
    }
}
