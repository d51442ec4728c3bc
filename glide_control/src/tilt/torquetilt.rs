//! Adaptive torque response.
//!
//! Compares the acceleration the filtered motor current should produce
//! against the acceleration actually measured. A persistent gap means the
//! board is fighting a slope (or grass, or mud): the setpoint is shifted
//! to offload the rider's ankles. The art is in the step-size selection —
//! react fast to real changes, never oscillate on noisy ones.

use glide_common::config::BalanceConfig;

use crate::config::Derived;
use crate::control::filters::{Biquad, BiquadKind};
use crate::sensors::SensorFrame;
use crate::util::sign;

/// Above this filtered current the torque/acceleration relationship gets a
/// stiffer second slope.
const LINEAR_TORQUE_LIMIT: f32 = 25.0;

#[derive(Debug, Clone, Copy)]
pub struct TorqueTilt {
    current_biquad: Biquad,
    /// Low-passed motor current [A].
    pub filtered_current: f32,
    pub target: f32,
    pub interpolated: f32,
    /// Smoothed expected-vs-measured acceleration gap.
    pub accel_gap: f32,
    accel_gap_aggregate: f32,
    /// Climbing against a static obstacle at walking pace.
    pub static_climb: bool,
}

impl TorqueTilt {
    pub fn new(d: &Derived) -> Self {
        Self {
            current_biquad: Biquad::new(BiquadKind::Lowpass, d.torquetilt_filter_hz / d.hertz),
            filtered_current: 0.0,
            target: 0.0,
            interpolated: 0.0,
            accel_gap: 0.0,
            accel_gap_aggregate: 0.0,
            static_climb: false,
        }
    }

    pub fn reset(&mut self) {
        self.current_biquad.reset();
        self.filtered_current = 0.0;
        self.target = 0.0;
        self.interpolated = 0.0;
        self.accel_gap = 0.0;
        self.accel_gap_aggregate = 0.0;
        self.static_climb = false;
    }

    /// Advance one tick and return the contribution to the setpoint.
    ///
    /// `setpoint_so_far` is the setpoint with nose angling already applied;
    /// `last_proportional` and `last_pid_value` are the previous tick's PID
    /// intermediate values (this stage runs before the PID).
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &mut self,
        frame: &SensorFrame,
        acceleration: f32,
        setpoint_so_far: f32,
        last_proportional: f32,
        last_pid_value: f32,
        cutback: bool,
        cfg: &BalanceConfig,
        d: &Derived,
    ) -> f32 {
        // Feature disabled: leave the setpoint alone.
        if cfg.torquetilt_strength == 0.0 {
            return 0.0;
        }

        self.filtered_current = self.current_biquad.process(frame.motor_current);
        let torque_sign = sign(self.filtered_current);
        let abs_torque = self.filtered_current.abs();
        let torque_offset = cfg.torquetilt_start_current;
        let strength = d.tt_strength_uphill;

        // Negative current at speed: braking or rolling downhill.
        let braking = frame.abs_erpm > 250.0 && torque_sign != sign(frame.erpm);

        let measured_acc = acceleration.min(5.0);

        // Expected acceleration is proportional to current, minus the
        // offset needed just to hold speed.
        let expected_acc = if abs_torque < LINEAR_TORQUE_LIMIT {
            (self.filtered_current - sign(frame.erpm) * torque_offset) / d.accel_factor
        } else {
            // Primitive linear approximation of the non-linear
            // torque/acceleration relationship.
            (torque_sign * LINEAR_TORQUE_LIMIT - sign(frame.erpm) * torque_offset) / d.accel_factor
                + torque_sign * (abs_torque - LINEAR_TORQUE_LIMIT) / d.accel_factor2
        };

        self.static_climb = false;
        let acc_diff = expected_acc - measured_acc;
        if frame.abs_erpm > 2000.0 {
            self.accel_gap = 0.9 * self.accel_gap + 0.1 * acc_diff;
        } else if frame.abs_erpm > 1000.0 {
            self.accel_gap = 0.95 * self.accel_gap + 0.05 * acc_diff;
        } else if frame.abs_erpm > 250.0 {
            self.accel_gap = 0.98 * self.accel_gap + 0.02 * acc_diff;
        } else {
            // Low-speed erpm is very choppy: ignore it unless we're
            // actually trying to accelerate.
            if expected_acc.abs() < 1.0 {
                self.accel_gap = 0.0;
            } else if expected_acc.abs() < 1.5 {
                if self.accel_gap > 1.0 {
                    // Once the gap is above 1 get more aggressive.
                    self.accel_gap = 0.9 * self.accel_gap + 0.1 * acc_diff;
                    self.static_climb = true;
                } else {
                    // Strong filter below that, purely due to noise.
                    self.accel_gap = 0.99 * self.accel_gap + 0.01 * acc_diff;
                }
            } else if self.accel_gap > 1.0 {
                self.accel_gap = 0.9 * self.accel_gap + 0.1 * acc_diff;
                self.static_climb = true;
            } else {
                self.accel_gap = 0.95 * self.accel_gap + 0.05 * acc_diff;
            }
        }

        if sign(self.accel_gap_aggregate) == sign(self.accel_gap) {
            self.accel_gap_aggregate += self.accel_gap;
        } else {
            self.accel_gap_aggregate = 0.0;
        }

        // The target is purely the gap between expected and measured
        // acceleration, scaled by strength.
        let mut new_target = strength * self.accel_gap;
        let mut cutback_response = false;

        if cutback && frame.abs_erpm > d.cutback_minspeed {
            // Cutbacks trump any other adjustment.
            if sign(new_target) == sign(frame.erpm) {
                new_target /= 4.0;
            } else {
                new_target *= 1.5;
            }
            cutback_response = true;
        } else if braking
            && frame.abs_erpm > 1000.0
            && sign(last_proportional) != sign(frame.erpm)
        {
            // Braking lifts the setpoint too, for a lingering nose lift.
            // On a downhill the lift is damped: downhill braking amps are
            // already large.
            let mut downhill_damper = 1.0;
            if (frame.erpm > 1000.0 && self.accel_gap < -1.0)
                || (frame.erpm < -1000.0 && self.accel_gap > 1.0)
            {
                downhill_damper += self.accel_gap.abs() / 2.0;
            }
            new_target += (frame.pitch - setpoint_so_far) / d.ttt_brake_ratio / downhill_damper;
        }

        self.target = (self.target * 0.95 + 0.05 * new_target)
            .clamp(-cfg.torquetilt_angle_limit, cfg.torquetilt_angle_limit);

        let step_size = self.select_step_size(
            frame,
            setpoint_so_far,
            last_pid_value,
            braking,
            cutback_response,
            d,
        );

        if (self.target - self.interpolated).abs() < step_size {
            self.interpolated = self.target;
        } else if self.target > self.interpolated {
            self.interpolated += step_size;
        } else {
            self.interpolated -= step_size;
        }
        self.interpolated
    }

    /// Step-size selection: react quickly to real changes without
    /// overreacting to acceleration glitches or triggering oscillations.
    /// Going "down" (toward level) always uses the slower off-step.
    fn select_step_size(
        &self,
        frame: &SensorFrame,
        setpoint_so_far: f32,
        last_pid_value: f32,
        braking: bool,
        cutback_response: bool,
        d: &Derived,
    ) -> f32 {
        let on = d.torquetilt_on_step;
        let off = d.torquetilt_off_step;
        let gap = self.accel_gap;
        let interp = self.interpolated;
        let target = self.target;

        if frame.abs_erpm < 500.0 && gap.abs() < 2.0 {
            // Can't trust acceleration data at walking pace.
            return off;
        }
        if cutback_response {
            return if !braking { on / 2.0 } else { on };
        }

        let mut step;
        if frame.erpm > 0.0 {
            if interp < 0.0 {
                // Downhill.
                if interp < target {
                    if gap > 1.0 && self.accel_gap_aggregate > 20.0 {
                        // Torque tilt is reversing course.
                        step = on;
                    } else if frame.pitch < setpoint_so_far && last_pid_value > 0.0 && gap > 0.5 {
                        step = on;
                    } else {
                        step = off;
                    }
                } else if gap.abs() < 0.5 {
                    step = off;
                } else if braking {
                    step = on / 2.0;
                } else {
                    step = on;
                }
            } else {
                // Uphill, or heavy resistance (grass, mud).
                if target > -3.0 && interp > target {
                    if frame.abs_erpm < 1000.0 && frame.pitch < 0.5 {
                        // Rider already pushing the other way; obstacle
                        // cleared?
                        step = off;
                    } else if frame.abs_erpm < 2000.0 && interp - target > 2.0 {
                        // Pretty slow after braking, lots of tilt left.
                        step = on / 3.0;
                    } else if frame.abs_erpm > 2000.0 && target < 0.0 {
                        step = on / 2.0;
                    } else {
                        step = off;
                    }
                } else {
                    if gap.abs() < 0.5 {
                        step = off;
                    } else if frame.abs_erpm < 1000.0 {
                        step = on / 2.0;
                    } else {
                        step = on;
                    }
                    if self.static_climb {
                        step *= 1.5;
                    }
                }
            }
        } else if interp > 0.0 {
            // Downhill, rolling backward.
            if interp > target && target > -3.0 {
                if frame.pitch > setpoint_so_far && last_pid_value < 0.0 && gap < 0.0 {
                    step = on;
                } else {
                    step = off;
                }
            } else if braking {
                step = on / 2.0;
            } else {
                step = on;
            }
        } else {
            // Uphill, rolling backward.
            if target < 3.0 && interp < target {
                step = off;
            } else {
                if gap == 0.0 {
                    step = off;
                } else if frame.abs_erpm < 1000.0 {
                    step = on / 2.0;
                } else {
                    step = on;
                }
                if self.static_climb {
                    step *= 1.5;
                }
            }
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::configure;
    use glide_common::config::AppConfig;

    fn setup() -> (BalanceConfig, Derived) {
        let app = AppConfig::default();
        (app.balance.clone(), configure(&app))
    }

    fn frame(erpm: f32, current: f32) -> SensorFrame {
        SensorFrame {
            erpm,
            abs_erpm: erpm.abs(),
            motor_current: current,
            ..Default::default()
        }
    }

    #[test]
    fn disabled_when_strength_zero() {
        let (mut cfg, d) = setup();
        cfg.torquetilt_strength = 0.0;
        let mut tt = TorqueTilt::new(&d);
        let out = tt.apply(&frame(3000.0, 30.0), 0.0, 0.0, 1.0, 10.0, false, &cfg, &d);
        assert_eq!(out, 0.0);
        assert_eq!(tt.filtered_current, 0.0);
    }

    #[test]
    fn sustained_current_without_acceleration_builds_gap() {
        let (cfg, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        // Cruising at 3000 erpm drawing 30 A with zero measured
        // acceleration: a clear climb.
        let f = frame(3000.0, 30.0);
        for _ in 0..3000 {
            tt.apply(&f, 0.0, 0.0, 1.0, 10.0, false, &cfg, &d);
        }
        assert!(tt.accel_gap > 0.3, "gap should build: {}", tt.accel_gap);
        assert!(tt.interpolated > 0.1, "nose lift: {}", tt.interpolated);
        assert!(tt.target > 0.0);
    }

    #[test]
    fn target_clamped_to_angle_limit() {
        let (cfg, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        // Absurd current, no acceleration: target must stay inside the
        // configured limit.
        let f = frame(3000.0, 120.0);
        for _ in 0..20_000 {
            tt.apply(&f, 0.0, 0.0, 1.0, 10.0, false, &cfg, &d);
        }
        assert!(tt.target <= cfg.torquetilt_angle_limit + 1e-4);
        assert!(tt.interpolated <= cfg.torquetilt_angle_limit + 1e-4);
    }

    #[test]
    fn static_climb_detected_at_walking_pace() {
        let (cfg, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        // Below 250 erpm with meaningful expected acceleration: the gap
        // builds slowly through the strong filter, then flips to the
        // aggressive arm once above 1.
        let f = frame(200.0, 40.0);
        let mut saw_static_climb = false;
        for _ in 0..20_000 {
            tt.apply(&f, 0.0, 0.0, 1.0, 10.0, false, &cfg, &d);
            saw_static_climb |= tt.static_climb;
        }
        assert!(saw_static_climb);
        assert!(tt.accel_gap > 1.0);
    }

    #[test]
    fn low_speed_idle_zeroes_gap() {
        let (cfg, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        tt.accel_gap = 0.8;
        // Tiny current at walking pace: expected acceleration under 1,
        // gap forced to zero.
        let f = frame(100.0, 5.0);
        tt.apply(&f, 0.0, 0.0, 1.0, 10.0, false, &cfg, &d);
        assert_eq!(tt.accel_gap, 0.0);
    }

    #[test]
    fn cutback_divides_aligned_response() {
        let (cfg, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        let f = frame(3000.0, 30.0);
        // Build up some tilt first.
        for _ in 0..2000 {
            tt.apply(&f, 0.0, 0.0, 1.0, 10.0, false, &cfg, &d);
        }
        let target_before = tt.target;
        // One cutback tick above the minimum speed: the new target
        // contribution is quartered, so the blended target drops.
        for _ in 0..200 {
            tt.apply(&f, 0.0, 0.0, 1.0, 10.0, true, &cfg, &d);
        }
        assert!(
            tt.target < target_before,
            "cutback should deflate the target: {} -> {}",
            target_before,
            tt.target
        );
    }

    #[test]
    fn braking_adds_lingering_lift() {
        let (cfg, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        // Moving forward fast, braking current, board pitched back
        // relative to the setpoint, proportional opposing travel.
        let f = SensorFrame {
            erpm: 4000.0,
            abs_erpm: 4000.0,
            motor_current: -20.0,
            pitch: -3.0,
            ..Default::default()
        };
        let mut without = TorqueTilt::new(&d);
        for _ in 0..500 {
            // last_proportional aligned with travel: no brake lift.
            without.apply(&f, 0.0, 0.0, 1.0, 10.0, false, &cfg, &d);
            // last_proportional opposing travel: brake lift applies.
            tt.apply(&f, 0.0, 0.0, -1.0, 10.0, false, &cfg, &d);
        }
        assert!(
            tt.target < without.target,
            "brake lift must pull the target down: {} vs {}",
            tt.target,
            without.target
        );
    }

    #[test]
    fn step_slow_at_walking_pace_with_small_gap() {
        let (_, d) = setup();
        let tt = TorqueTilt::new(&d);
        let f = frame(300.0, 10.0);
        let step = tt.select_step_size(&f, 0.0, 0.0, false, false, &d);
        assert_eq!(step, d.torquetilt_off_step);
    }

    #[test]
    fn step_cutback_response_overrides() {
        let (_, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        tt.accel_gap = 3.0;
        let f = frame(3000.0, 30.0);
        assert_eq!(
            tt.select_step_size(&f, 0.0, 0.0, false, true, &d),
            d.torquetilt_on_step / 2.0
        );
        assert_eq!(
            tt.select_step_size(&f, 0.0, 0.0, true, true, &d),
            d.torquetilt_on_step
        );
    }

    #[test]
    fn step_uphill_forward_full_speed() {
        let (_, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        // Forward, positive interpolation rising toward a higher target,
        // decent gap, above 1000 erpm: full on-step.
        tt.interpolated = 1.0;
        tt.target = 3.0;
        tt.accel_gap = 1.0;
        let f = frame(1500.0, 30.0);
        assert_eq!(
            tt.select_step_size(&f, 0.0, 0.0, false, false, &d),
            d.torquetilt_on_step
        );
        // Same but slow: half step.
        let f = frame(800.0, 30.0);
        assert_eq!(
            tt.select_step_size(&f, 0.0, 0.0, false, false, &d),
            d.torquetilt_on_step / 2.0
        );
    }

    #[test]
    fn step_static_climb_multiplier() {
        let (_, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        tt.interpolated = 1.0;
        tt.target = 3.0;
        tt.accel_gap = 2.5;
        tt.static_climb = true;
        let f = frame(600.0, 40.0);
        assert_eq!(
            tt.select_step_size(&f, 0.0, 0.0, false, false, &d),
            d.torquetilt_on_step / 2.0 * 1.5
        );
    }

    #[test]
    fn step_coming_down_uses_off_step() {
        let (_, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        // Forward, uphill tilt unwinding (interp above target), no special
        // conditions: slow off-step to avoid oscillation.
        tt.interpolated = 3.0;
        tt.target = 1.0;
        tt.accel_gap = 0.2;
        let f = frame(3000.0, 10.0);
        assert_eq!(
            tt.select_step_size(&f, 0.0, 0.0, false, false, &d),
            d.torquetilt_off_step
        );
    }

    #[test]
    fn step_slow_unwind_after_braking() {
        let (_, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        // Slow after braking with lots of remaining tilt: on/3.
        tt.interpolated = 4.0;
        tt.target = 1.0;
        tt.accel_gap = 1.0;
        let f = frame(1500.0, 10.0);
        assert_eq!(
            tt.select_step_size(&f, 5.0, 0.0, false, false, &d),
            d.torquetilt_on_step / 3.0
        );
    }

    #[test]
    fn step_downhill_reversal_reacts_fast() {
        let (_, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        // Forward, nose-down tilt still deepening toward the target, but
        // the gap and aggregate say the slope is reversing: full on-step.
        tt.interpolated = -2.0;
        tt.target = -1.0;
        tt.accel_gap = 1.5;
        tt.accel_gap_aggregate = 30.0;
        let f = frame(3000.0, 20.0);
        assert_eq!(
            tt.select_step_size(&f, 0.0, 0.0, false, false, &d),
            d.torquetilt_on_step
        );
    }

    #[test]
    fn reset_restores_initial_state() {
        let (cfg, d) = setup();
        let mut tt = TorqueTilt::new(&d);
        let f = frame(3000.0, 30.0);
        for _ in 0..1000 {
            tt.apply(&f, 0.0, 0.0, 1.0, 10.0, false, &cfg, &d);
        }
        tt.reset();
        assert_eq!(tt.target, 0.0);
        assert_eq!(tt.interpolated, 0.0);
        assert_eq!(tt.accel_gap, 0.0);
        assert_eq!(tt.filtered_current, 0.0);
    }
}
