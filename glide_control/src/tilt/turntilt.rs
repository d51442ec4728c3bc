//! Turn tilt: lean into turns proportional to yaw rate.
//!
//! A smoothed yaw-rate tracker feeds a speed-boosted tilt target, with a
//! cutback detector that catches the board leaning harder than it is
//! turning (rail dug in) and inverts or zeroes the response.

use glide_common::config::BalanceConfig;
use glide_common::state::BalanceState;

use crate::config::Derived;
use crate::sensors::SensorFrame;
use crate::util::sign;

// ─── Yaw Tracker ────────────────────────────────────────────────────

/// Smoothed yaw rate and signed aggregate, maintained every tick.
///
/// Exact-zero deltas only happen when the IMU did not update between
/// loops, and deltas over 100° are the ±180° wrap; both are replaced by
/// the previous delta rather than believed.
#[derive(Debug, Clone, Copy, Default)]
pub struct YawTracker {
    last_yaw_angle: f32,
    last_yaw_change: f32,
    /// Smoothed per-tick yaw change [deg].
    pub yaw_change: f32,
    pub abs_yaw_change: f32,
    /// Signed aggregate of sustained yaw change; cleared on direction flip.
    pub yaw_aggregate: f32,
}

impl YawTracker {
    /// Feed one yaw sample [deg].
    pub fn update(&mut self, yaw_angle: f32) {
        let mut new_change = yaw_angle - self.last_yaw_angle;
        let unchanged = new_change == 0.0 || new_change.abs() > 100.0;
        if unchanged {
            new_change = self.last_yaw_change;
        }
        self.last_yaw_change = new_change;
        self.last_yaw_angle = yaw_angle;

        // Avoid overreacting at low speed.
        new_change = new_change.clamp(-0.10, 0.10);
        self.yaw_change = self.yaw_change * 0.8 + 0.2 * new_change;
        // Clear the aggregate whenever direction changes.
        if sign(self.yaw_change) != sign(self.yaw_aggregate) {
            self.yaw_aggregate = 0.0;
        }
        self.abs_yaw_change = self.yaw_change.abs();
        // Tiny changes don't count towards the aggregate.
        if self.abs_yaw_change > 0.04 && !unchanged {
            self.yaw_aggregate += self.yaw_change;
        }
    }

    /// Re-engage. The smoothed rate itself carries over; only the angle
    /// history and aggregate restart.
    pub fn reset(&mut self) {
        self.last_yaw_angle = 0.0;
        self.last_yaw_change = 0.0;
        self.yaw_aggregate = 0.0;
    }
}

// ─── Turn Tilt ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct TurnTilt {
    pub target: f32,
    pub interpolated: f32,
    /// Board leaning harder than it is turning.
    pub cutback: bool,
    /// Signed roll aggregate while |roll| exceeds 8°.
    pub roll_aggregate: f32,
}

impl TurnTilt {
    pub fn reset(&mut self) {
        self.target = 0.0;
        self.interpolated = 0.0;
        self.cutback = false;
        self.roll_aggregate = 0.0;
    }

    /// Maintain the roll aggregate; runs every tick, any state.
    pub fn track_roll(&mut self, frame: &SensorFrame) {
        if frame.abs_roll > 8.0 {
            self.roll_aggregate += frame.roll;
        } else {
            self.roll_aggregate = 0.0;
        }
    }

    /// Advance one tick and return the contribution to the setpoint.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &mut self,
        frame: &SensorFrame,
        yaw: &mut YawTracker,
        torquetilt_target: f32,
        noseangling_interpolated: f32,
        state: BalanceState,
        cfg: &BalanceConfig,
        d: &Derived,
    ) -> f32 {
        let abs_yaw_scaled = yaw.abs_yaw_change * 100.0;
        if abs_yaw_scaled < cfg.turntilt_start_angle || state != BalanceState::Running {
            self.target = 0.0;
        } else {
            if d.cutback_enable {
                // Leaning the way we're turning (true in most turns), roll
                // well ahead of yaw, and a sustained amount of it.
                let banked_turn = sign(yaw.yaw_change) == sign(frame.roll);
                self.cutback = banked_turn
                    && self.roll_aggregate.abs() > d.roll_aggregate_threshold
                    && abs_yaw_scaled > 5.0
                    && (yaw.yaw_change * 100.0 / frame.roll) < 1.0;
            }

            self.target = yaw.abs_yaw_change * cfg.turntilt_strength;

            // Speed scaling.
            let boost = if frame.abs_erpm < cfg.turntilt_erpm_boost_end {
                1.0 + frame.abs_erpm * d.turntilt_boost_per_erpm
            } else {
                1.0 + cfg.turntilt_erpm_boost as f32 / 100.0
            };
            self.target *= boost;

            // Sustained-turn boost, at most doubling, damped at low speed.
            let aggregate_damper = if frame.abs_erpm < 2000.0 { 0.5 } else { 1.0 };
            let boost =
                (1.0 + aggregate_damper * yaw.yaw_aggregate.abs() / d.yaw_aggregate_target).min(2.0);
            self.target *= boost;

            self.target = self.target.min(cfg.turntilt_angle_limit);

            // Disable below the erpm threshold, otherwise add direction.
            if frame.abs_erpm < cfg.turntilt_start_erpm {
                self.target = 0.0;
            } else {
                self.target *= sign(frame.erpm);
            }

            // Torque-response interference: strong ATR shrinks turn tilt,
            // with a tighter window when the two disagree in direction.
            let (atr_min, atr_max) = if sign(torquetilt_target) != sign(self.target) {
                (1.0, 4.0)
            } else {
                (2.0, 5.0)
            };
            if torquetilt_target.abs() > atr_min {
                if self.cutback {
                    self.target = -self.target;
                } else {
                    let mut atr_scaling =
                        (atr_max - torquetilt_target.abs()) / (atr_max - atr_min);
                    if atr_scaling < 0.0 {
                        atr_scaling = 0.0;
                        // Heavy torque response also clears the aggregate.
                        yaw.yaw_aggregate = 0.0;
                    }
                    self.target *= atr_scaling;
                }
            } else if self.cutback {
                self.target = 0.0;
            }

            // No setpoint changes during heavy acceleration or braking.
            if (frame.pitch - noseangling_interpolated).abs() > 4.0 {
                self.target = 0.0;
                yaw.yaw_aggregate = 0.0;
            }
        }

        if (self.target - self.interpolated).abs() < d.turntilt_step {
            self.interpolated = self.target;
        } else if self.target > self.interpolated {
            self.interpolated += d.turntilt_step;
        } else {
            self.interpolated -= d.turntilt_step;
        }
        self.interpolated
    }
}
