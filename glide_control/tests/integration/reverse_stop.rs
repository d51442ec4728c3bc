//! Reverse stop: rolling backward engages the stop sequence, accumulated
//! backward travel tilts the nose down, and overtravel ends in a fault.

use glide_common::config::AppConfig;
use glide_common::state::{BalanceState, SetpointAdjustmentType};

use super::harness::Rig;

#[test]
fn reverse_stop_engages_tilts_then_faults() {
    let mut app = AppConfig::default();
    app.balance.startup_speed = 30.1; // reverse stop armed
    let mut rig = Rig::new(&app);
    rig.engage();

    let tolerance = rig.ctrl.d.reverse_tolerance;
    let mut entered_at = None;
    let mut tilt_seen = false;
    let mut faulted_at = None;

    for t in 0..3000u64 {
        // erpm ramps from -100 toward -2000 over the first second.
        let erpm = -(100.0 + 1.9 * (t.min(1000)) as f32);
        rig.tick(|f| f.erpm = erpm);

        if entered_at.is_none() && rig.ctrl.shaper.mode == SetpointAdjustmentType::ReverseStop {
            entered_at = Some(t);
        }
        let total = rig.ctrl.reverse.total_erpm.abs();
        if total > tolerance && rig.ctrl.state == BalanceState::Running {
            // Nose drops 10° per further 50k of accumulated erpm.
            let expected = 10.0 * (total - tolerance) / 50_000.0;
            assert!(
                (rig.ctrl.shaper.target - expected).abs() < 0.2,
                "target {} vs expected {expected} at t={t}",
                rig.ctrl.shaper.target
            );
            tilt_seen = true;
        }
        if rig.ctrl.state == BalanceState::FaultReverse {
            faulted_at = Some((t, total));
            break;
        }
    }

    let entered_at = entered_at.expect("reverse stop never engaged");
    assert!(entered_at < 500, "engaged at {entered_at}");
    assert!(tilt_seen, "nose-down tilt never observed");

    let (_, total_at_fault) = faulted_at.expect("overtravel fault never hit");
    assert!(
        total_at_fault > 3.0 * tolerance,
        "faulted early: {total_at_fault}"
    );
}

#[test]
fn reverse_stop_releases_when_rolling_forward() {
    let mut app = AppConfig::default();
    app.balance.startup_speed = 30.1;
    let mut rig = Rig::new(&app);
    rig.engage();

    // A short backward roll, well under the tolerance.
    for _ in 0..100 {
        rig.tick(|f| f.erpm = -200.0);
    }
    assert_eq!(rig.ctrl.shaper.mode, SetpointAdjustmentType::ReverseStop);

    // Rolling forward again drains the sequence back to normal riding and
    // drops the accumulated integral.
    let mut released = false;
    for _ in 0..2000 {
        rig.tick(|f| f.erpm = 300.0);
        if rig.ctrl.shaper.mode == SetpointAdjustmentType::TiltbackNone {
            released = true;
            break;
        }
    }
    assert!(released, "reverse stop never released");
    assert_eq!(rig.ctrl.reverse.total_erpm, 0.0);
    assert!(!rig.ctrl.reverse.active);
}
