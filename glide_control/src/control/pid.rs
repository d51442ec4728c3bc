//! Pitch PID with adaptive gains.
//!
//! The applied gains chase per-tick targets through asymmetric EMAs:
//! stiffening is fast, loosening slow. Torque tilt stiffens kp/ki, large
//! errors relax kd, reverse-stop overrides everything. The assembled
//! output is smoothed by a 0.2/0.8 blend (~5 ms of effective latency)
//! before saturation.

use glide_common::state::SetpointAdjustmentType;

use crate::config::Derived;
use crate::sensors::SensorFrame;
use crate::util::sign;

/// Center-boost ramp length after engage [ticks at 1 kHz].
pub const START_CENTER_DELAY_MS: u32 = 1000;

const MAX_DI_MULTIPLIER: f32 = 1.7;

/// What one PID tick produced beyond the new output value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidOutcome {
    /// Single beep queued at the onset of the center jerk.
    pub jerk_beep: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PidController {
    /// Currently applied gains.
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub integral: f32,
    pub proportional: f32,
    pub last_proportional: f32,
    /// PT1-filtered derivative [deg/tick].
    pub derivative: f32,
    d_pt1_state: f32,
    /// Smoothed output current [A], before saturation.
    pub pid_value: f32,
    /// Remaining center-boost ramp [ticks].
    pub center_stiffness_delay_ms: u32,
    center_jerk_counter: u32,
    center_jerk_adder: f32,
}

impl PidController {
    /// Re-engage. Soft start begins from minimal gains; quick start from
    /// slightly relaxed configured gains.
    pub fn reset(&mut self, d: &Derived) {
        self.integral = 0.0;
        self.proportional = 0.0;
        self.last_proportional = 0.0;
        self.derivative = 0.0;
        self.d_pt1_state = 0.0;
        self.pid_value = 0.0;
        if d.use_soft_start {
            self.kp = 1.0;
            self.ki = 0.0;
            self.kd = 0.0;
        } else {
            self.kp = d.kp_acc * 0.8;
            self.ki = d.ki_acc;
            self.kd = 0.0;
        }
        self.center_stiffness_delay_ms = START_CENTER_DELAY_MS;
        self.center_jerk_counter = 0;
        self.center_jerk_adder = 0.0;
    }

    /// One PID tick. Returns the outcome flags; the new output is left in
    /// `pid_value` (unsaturated).
    pub fn compute(
        &mut self,
        frame: &SensorFrame,
        setpoint: f32,
        mode: SetpointAdjustmentType,
        torquetilt_interpolated: f32,
        d: &Derived,
    ) -> PidOutcome {
        let mut outcome = PidOutcome::default();

        self.proportional = setpoint - frame.pitch;
        let abs_prop = self.proportional.abs();

        // Integral, only partially affected by torque tilt: subtracting a
        // share of the tilt each tick produces a controlled nose/tail lift
        // with increased torque.
        self.integral += self.proportional;
        let tt_impact = if torquetilt_interpolated < 0.0 {
            // Downhill tail lift doesn't need to match uphill nose lift.
            d.integral_tt_impact_downhill
        } else {
            let mut impact = d.integral_tt_impact_uphill;
            const MAX_IMPACT_ERPM: f32 = 2500.0;
            const STARTING_IMPACT: f32 = 0.3;
            if frame.abs_erpm < MAX_IMPACT_ERPM {
                // Reduced nose lift at lower speeds.
                let erpm_scaling = (frame.abs_erpm / MAX_IMPACT_ERPM).max(STARTING_IMPACT);
                impact = 1.0 - (1.0 - impact) * erpm_scaling;
            }
            impact
        };
        self.integral -= torquetilt_interpolated * tt_impact;

        // Derivative: negated pitch rate through the PT1.
        let raw_derivative = frame.last_pitch - frame.pitch;
        self.d_pt1_state += d.d_pt1_k * (raw_derivative - self.d_pt1_state);
        self.derivative = self.d_pt1_state;

        // Braking: board angle opposing the direction of travel.
        let braking = sign(self.proportional) != sign(frame.erpm);

        // ── Gain scheduling ──
        let mut p_multiplier = 1.0;
        let mut di_multiplier = 1.0;
        if torquetilt_interpolated.abs() > 2.0 {
            p_multiplier = torquetilt_interpolated.abs() / 6.0 * d.tt_pid_intensity;
            di_multiplier = (1.0 + p_multiplier / 2.0).min(MAX_DI_MULTIPLIER);
            p_multiplier = (1.0 + p_multiplier).min(2.0);
        }
        let kp_target = d.kp_acc * p_multiplier;
        let ki_target = d.ki_acc * di_multiplier;
        // Base kd is already high for center balancing; never stiffer.
        let mut kd_target = d.kd_acc;
        if abs_prop > d.center_boost_angle + 0.5 {
            // Relax kd away from the stiff center.
            kd_target = kd_target * di_multiplier / MAX_DI_MULTIPLIER;
        }

        match mode {
            SetpointAdjustmentType::TiltbackNone
            | SetpointAdjustmentType::TiltbackDuty
            | SetpointAdjustmentType::TiltbackHv
            | SetpointAdjustmentType::TiltbackLv => {
                if kp_target > self.kp {
                    // Stiffen quickly (~50 ms).
                    self.kp = self.kp * 0.98 + kp_target * 0.02;
                    self.ki = self.ki * 0.98 + ki_target * 0.02;
                } else {
                    // Loosen slowly (~500 ms).
                    self.kp = self.kp * 0.998 + kp_target * 0.002;
                    self.ki = self.ki * 0.998 + ki_target * 0.002;
                }
                self.kd = self.kd * 0.98 + kd_target * 0.02;
            }
            SetpointAdjustmentType::Centering => {
                self.kp = self.kp * 0.995 + kp_target * 0.005;
                self.ki = self.ki * 0.995 + ki_target * 0.005;
                self.kd = self.kd * 0.995 + kd_target * 0.005;
            }
            SetpointAdjustmentType::ReverseStop => {
                self.integral = 0.0;
                self.kp = self.kp * 0.99 + 2.0 * 0.01;
                self.kd = self.kd * 0.99 + 400.0 * 0.01;
                self.ki = 0.0;
            }
        }

        // ── Output assembly ──
        if d.use_soft_start && mode == SetpointAdjustmentType::Centering {
            let pid_prop = self.kp * self.proportional;
            let pid_derivative = self.kd * self.derivative;
            self.pid_value = 0.05 * (pid_prop + pid_derivative) + 0.95 * self.pid_value;
            // Once centering is done the integral starts from zero.
            self.integral = 0.0;
            self.ki = 0.0;
        } else {
            let mut pid_prop = self.kp * self.proportional;
            let center_boost = abs_prop.min(d.center_boost_angle);

            if self.center_stiffness_delay_ms > 0 {
                // Ease into the stiff center over the first second.
                pid_prop += center_boost
                    * d.center_boost_kp_adder
                    * sign(self.proportional)
                    * (START_CENTER_DELAY_MS - self.center_stiffness_delay_ms) as f32
                    / START_CENTER_DELAY_MS as f32;
                self.center_stiffness_delay_ms -= 1;

                if self.center_jerk_counter < d.center_jerk_duration_ms {
                    if self.center_jerk_counter > d.center_jerk_duration_ms / 2 {
                        self.center_jerk_adder =
                            self.center_jerk_adder * 0.95 + d.center_jerk_strength * 0.05;
                    } else {
                        self.center_jerk_adder =
                            self.center_jerk_adder * 0.95 - d.center_jerk_strength * 0.05;
                    }
                    pid_prop += self.center_jerk_adder;
                    if self.center_jerk_counter == 0 {
                        outcome.jerk_beep = true;
                    }
                    self.center_jerk_counter += 1;
                }
            } else {
                pid_prop += center_boost * d.center_boost_kp_adder * sign(self.proportional);

                // Acceleration boost: extra response past the threshold,
                // second slope past the second threshold. Never while
                // braking.
                if abs_prop > d.accel_boost_threshold && !braking {
                    let mut accel_boost =
                        (abs_prop - d.accel_boost_threshold) * self.kp * d.accel_boost_intensity;
                    if abs_prop > d.accel_boost_threshold2 {
                        accel_boost += (abs_prop - d.accel_boost_threshold2)
                            * self.kp
                            * d.accel_boost_intensity;
                    }
                    pid_prop += accel_boost * sign(self.proportional);
                }
            }

            let mut pid_derivative = self.kd * self.derivative;
            if pid_derivative.abs() > d.max_derivative {
                pid_derivative = d.max_derivative * sign(pid_derivative);
            }

            // Treat P+D together: limit braking amps while slow on flat
            // ground, relaxed with torque tilt and speed.
            let mut new_pd_value = pid_prop + pid_derivative;
            if sign(frame.erpm) != sign(new_pd_value) {
                let mut pid_max = d.max_brake_amps.max(pid_prop.abs());
                let tt = torquetilt_interpolated.abs();
                if tt > 2.0 {
                    pid_max *= 0.75 + tt / 8.0;
                }
                if frame.abs_erpm > 2000.0 {
                    pid_max *= 0.8 + frame.abs_erpm / 10_000.0;
                }
                if new_pd_value.abs() > pid_max {
                    new_pd_value = sign(new_pd_value) * pid_max;
                }
            }

            let pid_integral = self.ki * self.integral;

            // Smoothen the requested current (~5 ms effective latency).
            self.pid_value = 0.2 * (new_pd_value + pid_integral) + 0.8 * self.pid_value;
        }

        self.last_proportional = self.proportional;
        outcome
    }
}
