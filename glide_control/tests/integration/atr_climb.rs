//! Static climb: heavy current at walking pace with no resulting
//! acceleration means the board is pushing against something — the
//! adaptive torque response lifts the nose to meet it.

use glide_common::config::AppConfig;

use super::harness::Rig;

#[test]
fn static_climb_builds_nose_lift() {
    let mut app = AppConfig::default();
    app.balance.yaw_kd = 10.0; // strong expected-acceleration slope
    let mut rig = Rig::new(&app);
    rig.engage();

    // Let the acceleration window absorb the spin-up before the climb
    // starts, with only the hold current flowing.
    for _ in 0..200 {
        rig.tick(|f| {
            f.erpm = 200.0;
            f.smooth_erpm = 200.0;
            f.motor_current = 0.0;
        });
    }

    let on_step = rig.ctrl.d.torquetilt_on_step;
    let mut saw_static_climb = false;
    let mut prev_interp = rig.ctrl.torque.interpolated;
    let mut max_step_seen = 0.0f32;

    for _ in 0..30_000 {
        rig.tick(|f| {
            f.erpm = 200.0;
            f.smooth_erpm = 200.0;
            f.motor_current = 30.0;
        });
        saw_static_climb |= rig.ctrl.torque.static_climb;
        let interp = rig.ctrl.torque.interpolated;
        max_step_seen = max_step_seen.max((interp - prev_interp).abs());
        prev_interp = interp;
    }

    // The gap between expected ((30-8)/10 = 2.2) and measured (~0)
    // acceleration settles above 2.
    assert!(
        rig.ctrl.torque.accel_gap > 2.0,
        "gap {}",
        rig.ctrl.torque.accel_gap
    );
    assert!(saw_static_climb, "static climb never flagged");

    // Nose lift approaches strength · gap, rate limited by the
    // static-climb step (on/2 · 1.5 at walking pace).
    let expected_target = rig.ctrl.d.tt_strength_uphill * rig.ctrl.torque.accel_gap;
    assert!(
        (rig.ctrl.torque.target - expected_target).abs() < 0.5,
        "target {} vs {expected_target}",
        rig.ctrl.torque.target
    );
    assert!(rig.ctrl.torque.interpolated > 1.0);
    assert!(
        max_step_seen <= on_step * 0.75 + 1e-5,
        "step {max_step_seen} exceeded the static-climb limit"
    );
}

#[test]
fn no_response_when_current_matches_acceleration() {
    let mut app = AppConfig::default();
    app.balance.yaw_kd = 10.0;
    let mut rig = Rig::new(&app);
    rig.engage();

    // Spin up gently on the hold current so the window settles first.
    for _ in 0..200 {
        rig.tick(|f| {
            f.erpm = 500.0;
            f.smooth_erpm = 500.0;
            f.motor_current = 8.0;
        });
    }

    // Accelerating briskly with matching measured acceleration: the gap
    // stays small and so does the tilt.
    let mut erpm = 500.0f32;
    for _ in 0..5000 {
        erpm += 2.0;
        let e = erpm;
        rig.tick(|f| {
            f.erpm = e;
            f.smooth_erpm = e;
            f.motor_current = 28.0; // offset 8 + 10/erpm-per-tick · 2.0
        });
    }
    assert!(
        rig.ctrl.torque.accel_gap.abs() < 0.5,
        "gap {}",
        rig.ctrl.torque.accel_gap
    );
    assert!(
        rig.ctrl.torque.interpolated.abs() < 1.0,
        "tilt {}",
        rig.ctrl.torque.interpolated
    );
}
