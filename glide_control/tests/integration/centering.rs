//! Engage on a tilted board: the setpoint centers from half the pitch to
//! level at the startup ramp speed, then normal riding begins.

use glide_common::config::AppConfig;
use glide_common::state::{BalanceState, SetpointAdjustmentType};

use super::harness::Rig;

#[test]
fn centering_ramps_to_level_then_rides() {
    let mut app = AppConfig::default();
    app.balance.startup_pitch_tolerance = 5.0; // allow mounting at 2°
    let mut rig = Rig::new(&app);

    rig.tick(|f| f.pitch = 2.0);
    assert_eq!(rig.ctrl.state, BalanceState::FaultStartup);
    rig.tick(|f| f.pitch = 2.0);
    assert_eq!(rig.ctrl.state, BalanceState::Running);
    assert_eq!(rig.ctrl.shaper.mode, SetpointAdjustmentType::Centering);
    // Centering starts from half the mounting pitch.
    assert!((rig.ctrl.shaper.interpolated - 1.0).abs() < 1e-6);

    let step = rig.ctrl.d.startup_step;
    let budget = (1.0 / step).ceil() as u64 + 5;

    let mut centered_at = None;
    let mut prev_interp = rig.ctrl.shaper.interpolated;
    let mut pid_tail = Vec::new();
    for t in 0..2000u64 {
        rig.tick(|f| f.pitch = 2.0);

        // Rate-limit invariant: one step per tick, at most.
        let interp = rig.ctrl.shaper.interpolated;
        assert!(
            (interp - prev_interp).abs() <= step + 1e-6,
            "interpolation jumped at t={t}"
        );
        prev_interp = interp;

        if centered_at.is_none() && interp == 0.0 {
            centered_at = Some(t);
        }
        if t >= 1900 {
            pid_tail.push(rig.ctrl.pid.pid_value);
        }
    }

    // Converged within |initial| / step ticks.
    let centered_at = centered_at.expect("setpoint never centered");
    assert!(centered_at <= budget, "centered at {centered_at}, budget {budget}");

    // Quick start: centering hands over to normal riding once level.
    assert_eq!(rig.ctrl.shaper.mode, SetpointAdjustmentType::TiltbackNone);
    assert_eq!(rig.ctrl.state, BalanceState::Running);

    // Output has settled: the last 100 ticks show only the slow integral
    // drift, no transient.
    let spread = pid_tail
        .iter()
        .fold(f32::MIN, |acc, v| acc.max(*v))
        - pid_tail.iter().fold(f32::MAX, |acc, v| acc.min(*v));
    assert!(spread < 2.0, "pid output still moving: spread {spread}");
}
