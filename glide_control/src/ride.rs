//! Ride-state classification for lighting and telemetry.
//!
//! Purely observational: nothing here feeds back into control.

use glide_common::state::{BalanceState, RideState};

/// Drive currents below this while moving count as braking.
const BRAKE_CURRENT_THRESHOLD: f32 = -4.0;

pub fn classify(
    state: BalanceState,
    erpm: f32,
    abs_erpm: f32,
    pid_value: f32,
    half_fault_erpm: f32,
) -> RideState {
    if !state.is_running() {
        return RideState::Off;
    }
    if abs_erpm <= half_fault_erpm {
        return RideState::Idle;
    }
    if pid_value > BRAKE_CURRENT_THRESHOLD {
        if erpm > 0.0 {
            RideState::Forward
        } else {
            RideState::Reverse
        }
    } else if erpm > 0.0 {
        RideState::BrakeForward
    } else {
        RideState::BrakeReverse
    }
}
