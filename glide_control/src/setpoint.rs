//! Setpoint shaping.
//!
//! Two scalars: a discrete `target` chosen by a priority ladder every tick,
//! and an `interpolated` value that chases it rate-limited by the active
//! mode's step size. The ladder also drives the running-state flavor
//! (duty/HV/LV tiltback) and the reverse-stop sequence.

use glide_common::config::BalanceConfig;
use glide_common::state::{BalanceState, SetpointAdjustmentType};

use crate::config::Derived;
use crate::faults::ReverseContext;
use crate::sensors::SensorFrame;

/// Grace period after centering completes before adjustments engage [ms].
pub const START_GRACE_PERIOD_MS: u64 = 100;

/// What the target calculation decided beyond the new target value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetpointEffects {
    /// Running-state flavor to report, if this tick pinned one.
    pub state: Option<BalanceState>,
    /// Reverse-stop completed: the integral must be dropped.
    pub clear_integral: bool,
    /// Rider warning to queue: (beeps, long).
    pub beep: Option<(u8, bool)>,
}

#[derive(Debug, Clone, Copy)]
pub struct SetpointShaper {
    pub mode: SetpointAdjustmentType,
    pub target: f32,
    pub interpolated: f32,
    softstart_timer_us: u64,
    hv_timer_us: u64,
}

impl Default for SetpointShaper {
    fn default() -> Self {
        Self {
            mode: SetpointAdjustmentType::Centering,
            target: 0.0,
            interpolated: 0.0,
            softstart_timer_us: 0,
            hv_timer_us: 0,
        }
    }
}

impl SetpointShaper {
    /// Re-engage: center from half the current pitch.
    pub fn reset(&mut self, pitch: f32) {
        self.target = 0.0;
        self.interpolated = pitch / 2.0;
        self.mode = SetpointAdjustmentType::Centering;
    }

    /// Per-tick step size of the active mode [deg].
    #[inline]
    pub fn step_size(&self, d: &Derived) -> f32 {
        match self.mode {
            SetpointAdjustmentType::Centering => d.startup_step,
            SetpointAdjustmentType::ReverseStop => d.reverse_stop_step,
            SetpointAdjustmentType::TiltbackNone => d.tiltback_return_step,
            SetpointAdjustmentType::TiltbackDuty => d.tiltback_duty_step,
            SetpointAdjustmentType::TiltbackHv => d.tiltback_hv_step,
            SetpointAdjustmentType::TiltbackLv => d.tiltback_lv_step,
        }
    }

    /// Choose the target and mode for this tick.
    pub fn calculate_target(
        &mut self,
        frame: &SensorFrame,
        cfg: &BalanceConfig,
        d: &Derived,
        reverse: &mut ReverseContext,
    ) -> SetpointEffects {
        let mut fx = SetpointEffects::default();
        let now = frame.time_us;

        // The HV window only counts time continuously spent above the
        // threshold.
        if frame.v_in < cfg.tiltback_hv {
            self.hv_timer_us = now;
        }

        match self.mode {
            SetpointAdjustmentType::Centering => {
                if self.interpolated != self.target {
                    // Ignore tiltback during the centering sequence.
                    fx.state = Some(BalanceState::Running);
                    self.softstart_timer_us = now;
                } else if now.saturating_sub(self.softstart_timer_us)
                    > START_GRACE_PERIOD_MS * 1000
                {
                    // After a short delay transition to normal riding.
                    self.mode = SetpointAdjustmentType::TiltbackNone;
                } else if !d.use_soft_start {
                    self.mode = SetpointAdjustmentType::TiltbackNone;
                }
            }
            SetpointAdjustmentType::ReverseStop => {
                reverse.total_erpm += frame.erpm;
                let abs_total = reverse.total_erpm.abs();
                if abs_total > d.reverse_tolerance {
                    // Tilt down 10 degrees per further 50k aggregate erpm.
                    self.target = 10.0 * (abs_total - d.reverse_tolerance) / 50_000.0;
                } else if abs_total <= d.reverse_tolerance / 2.0 && frame.erpm >= 0.0 {
                    self.mode = SetpointAdjustmentType::TiltbackNone;
                    reverse.total_erpm = 0.0;
                    reverse.active = false;
                    self.target = 0.0;
                    fx.clear_integral = true;
                }
            }
            _ => {
                if frame.abs_duty_cycle > cfg.tiltback_duty {
                    self.target = if frame.erpm > 0.0 {
                        cfg.tiltback_duty_angle
                    } else {
                        -cfg.tiltback_duty_angle
                    };
                    self.mode = SetpointAdjustmentType::TiltbackDuty;
                    fx.state = Some(BalanceState::RunningTiltbackDuty);
                } else if frame.v_in > cfg.tiltback_hv {
                    if now.saturating_sub(self.hv_timer_us) > 500_000
                        || frame.v_in > cfg.tiltback_hv + 1.0
                    {
                        // 500 ms passed or another volt higher.
                        self.target = if frame.erpm > 0.0 {
                            cfg.tiltback_hv_angle
                        } else {
                            -cfg.tiltback_hv_angle
                        };
                        self.mode = SetpointAdjustmentType::TiltbackHv;
                        fx.state = Some(BalanceState::RunningTiltbackHv);
                    } else {
                        // The rider gets 500 ms to react to the beeps,
                        // or maybe it was just a short spike.
                        self.mode = SetpointAdjustmentType::TiltbackNone;
                        fx.state = Some(BalanceState::Running);
                    }
                    fx.beep = Some((3, false));
                } else if frame.v_in < cfg.tiltback_lv {
                    self.target = if frame.erpm > 0.0 {
                        cfg.tiltback_lv_angle
                    } else {
                        -cfg.tiltback_lv_angle
                    };
                    self.mode = SetpointAdjustmentType::TiltbackLv;
                    fx.state = Some(BalanceState::RunningTiltbackLv);
                    fx.beep = Some((3, false));
                } else if frame.fet_temp > d.mc_max_temp_fet {
                    // LV angle with the HV ramp speed.
                    fx.beep = Some((3, true));
                    if frame.fet_temp > d.mc_max_temp_fet + 1.0 {
                        self.target = if frame.erpm > 0.0 {
                            cfg.tiltback_lv_angle
                        } else {
                            -cfg.tiltback_lv_angle
                        };
                        self.mode = SetpointAdjustmentType::TiltbackHv;
                        fx.state = Some(BalanceState::RunningTiltbackLv);
                    } else {
                        // One degree Celsius left before tilting back.
                        self.mode = SetpointAdjustmentType::TiltbackNone;
                        fx.state = Some(BalanceState::Running);
                    }
                } else {
                    // Normal running.
                    if d.use_reverse_stop && frame.erpm < 0.0 {
                        self.mode = SetpointAdjustmentType::ReverseStop;
                        reverse.active = true;
                        reverse.timer_us = now;
                        reverse.total_erpm = 0.0;
                    } else {
                        self.mode = SetpointAdjustmentType::TiltbackNone;
                        reverse.active = false;
                    }
                    self.target = 0.0;
                    fx.state = Some(BalanceState::Running);
                }
            }
        }

        fx
    }

    /// Advance the interpolated value one rate-limited step.
    pub fn interpolate(&mut self, d: &Derived) {
        if self.interpolated == self.target {
            return;
        }
        let step = self.step_size(d);
        // Less than one step away: go all the way.
        if (self.target - self.interpolated).abs() < step {
            self.interpolated = self.target;
        } else if self.target > self.interpolated {
            self.interpolated += step;
        } else {
            self.interpolated -= step;
        }
    }
}
