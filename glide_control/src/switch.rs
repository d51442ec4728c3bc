//! Foot-pad switch classification.
//!
//! Two analog pads, each with a configured threshold voltage. A zero
//! threshold means the pad is not fitted; with no pads at all the switch
//! reads permanently On.

use glide_common::state::{BalanceState, SwitchState};

/// Classify the pad voltages against their thresholds.
#[inline]
pub fn classify(adc1: f32, adc2: f32, fault_adc1: f32, fault_adc2: f32) -> SwitchState {
    if fault_adc1 == 0.0 && fault_adc2 == 0.0 {
        // No switch fitted.
        SwitchState::On
    } else if fault_adc2 == 0.0 {
        // Single switch on ADC1.
        if adc1 > fault_adc1 {
            SwitchState::On
        } else {
            SwitchState::Off
        }
    } else if fault_adc1 == 0.0 {
        // Single switch on ADC2.
        if adc2 > fault_adc2 {
            SwitchState::On
        } else {
            SwitchState::Off
        }
    } else {
        // Double switch.
        if adc1 > fault_adc1 && adc2 > fault_adc2 {
            SwitchState::On
        } else if adc1 > fault_adc1 || adc2 > fault_adc2 {
            SwitchState::Half
        } else {
            SwitchState::Off
        }
    }
}

/// Whether the buzzer must be forced on: pads released at riding speed
/// while balancing — this can precede a nosedive, so the alert overrides
/// any in-progress beep pattern.
#[inline]
pub fn alert_at_speed(
    switch: SwitchState,
    abs_erpm: f32,
    half_fault_erpm: f32,
    state: BalanceState,
) -> bool {
    switch == SwitchState::Off && abs_erpm > half_fault_erpm && state.is_running()
}
