//! Duty tiltback: pushing past the duty threshold tilts the rider back at
//! the configured ramp speed.

use glide_common::config::AppConfig;
use glide_common::state::{BalanceState, SetpointAdjustmentType};

use super::harness::Rig;

#[test]
fn duty_tiltback_engages_and_ramps() {
    let app = AppConfig::default();
    let mut rig = Rig::new(&app);
    rig.engage();
    let duty_threshold = rig.ctrl.cfg.tiltback_duty; // 0.8
    let angle = rig.ctrl.cfg.tiltback_duty_angle;
    let step = rig.ctrl.d.tiltback_duty_step;

    let mut engaged_at = None;
    for t in 0..500u64 {
        // Duty ramps 0 → 0.85 while cruising forward.
        let duty = (t as f32 / 400.0 * 0.85).min(0.85);
        rig.tick(|f| {
            f.erpm = 3000.0;
            f.duty_cycle = duty;
        });
        if duty > duty_threshold && engaged_at.is_none() {
            assert_eq!(rig.ctrl.shaper.mode, SetpointAdjustmentType::TiltbackDuty);
            assert_eq!(rig.ctrl.state, BalanceState::RunningTiltbackDuty);
            assert_eq!(rig.ctrl.shaper.target, angle);
            engaged_at = Some(t);
        }
    }
    assert!(engaged_at.is_some(), "duty tiltback never engaged");

    // The interpolated setpoint reaches the tiltback angle within
    // angle / step ticks.
    let budget = (angle / step).ceil() as u64 + 5;
    let mut reached = None;
    for t in 0..budget + 100 {
        rig.tick(|f| {
            f.erpm = 3000.0;
            f.duty_cycle = 0.85;
        });
        if rig.ctrl.shaper.interpolated == angle {
            reached = Some(t);
            break;
        }
    }
    let reached = reached.expect("tiltback angle never reached");
    assert!(reached <= budget, "reached at {reached}, budget {budget}");

    // Backing off the duty returns to normal riding.
    let mut returned = false;
    for _ in 0..5000 {
        rig.tick(|f| {
            f.erpm = 3000.0;
            f.duty_cycle = 0.5;
        });
        if rig.ctrl.shaper.mode == SetpointAdjustmentType::TiltbackNone
            && rig.ctrl.state == BalanceState::Running
        {
            returned = true;
            break;
        }
    }
    assert!(returned, "never returned from duty tiltback");
}

#[test]
fn duty_tiltback_sign_follows_travel() {
    let app = AppConfig::default();
    let mut rig = Rig::new(&app);
    rig.engage();

    for _ in 0..10 {
        rig.tick(|f| {
            f.erpm = -3000.0;
            f.duty_cycle = -0.85;
        });
    }
    assert_eq!(rig.ctrl.shaper.mode, SetpointAdjustmentType::TiltbackDuty);
    assert_eq!(rig.ctrl.shaper.target, -rig.ctrl.cfg.tiltback_duty_angle);
}
