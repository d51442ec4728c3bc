//! Nose angling: a static tilt that grows with speed.
//!
//! The target is a variable term proportional to erpm (saturated at the
//! configured max) plus a constant term above a threshold speed. It is
//! suppressed while the torque tilt is pulling the other way, so the two
//! adjustments never double-dip.

use glide_common::config::BalanceConfig;

use crate::config::Derived;
use crate::sensors::SensorFrame;
use crate::util::sign;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoseAngling {
    pub interpolated: f32,
}

impl NoseAngling {
    pub fn reset(&mut self) {
        self.interpolated = 0.0;
    }

    /// Advance one tick and return the contribution to the setpoint.
    pub fn apply(
        &mut self,
        frame: &SensorFrame,
        cfg: &BalanceConfig,
        d: &Derived,
        torquetilt_interpolated: f32,
    ) -> f32 {
        let mut target = if frame.erpm > 0.0 && torquetilt_interpolated < -1.0 {
            0.0
        } else if frame.erpm < 0.0 && torquetilt_interpolated > 1.0 {
            0.0
        } else if frame.abs_erpm > d.tiltback_variable_max_erpm {
            cfg.tiltback_variable_max.abs() * sign(frame.erpm)
        } else {
            d.tiltback_variable * frame.erpm
        };

        if frame.erpm > cfg.tiltback_constant_erpm {
            target += cfg.tiltback_constant;
        } else if frame.erpm < -cfg.tiltback_constant_erpm {
            target -= cfg.tiltback_constant;
        }

        if (target - self.interpolated).abs() < d.noseangling_step {
            self.interpolated = target;
        } else if target > self.interpolated {
            self.interpolated += d.noseangling_step;
        } else {
            self.interpolated -= d.noseangling_step;
        }
        self.interpolated
    }
}
