//! Telemetry publishing.
//!
//! A single struct of word-sized atomics: the controller task stores into
//! it once per tick, any other thread (console, CAN bridge, UI poller)
//! loads individual scalars. There is deliberately no multi-field
//! consistency — every value is independently coherent, which is all the
//! readers need.

use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use bitflags::bitflags;
use static_assertions::const_assert;

use glide_common::state::{BalanceState, RideState, SetpointAdjustmentType, SwitchState};

bitflags! {
    /// Controller status word, published as one atomic.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u32 {
        /// Output current is being clamped at the motor limit.
        const CURRENT_LIMITING = 1 << 0;
        /// Cutback detected: leaning harder than turning.
        const CUTBACK = 1 << 1;
        /// ATR static-climb response active.
        const STATIC_CLIMB = 1 << 2;
        /// Commanded current opposes travel.
        const BRAKING = 1 << 3;
        /// Board is locked.
        const LOCKED = 1 << 4;
    }
}

/// Number of debug plot fields (ids 1..=13; 0 reads as zero).
pub const DEBUG_FIELD_COUNT: usize = 13;

/// Per-tick debug field values, indexable by the console field ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugFields {
    pub motor_position: f32,
    pub setpoint: f32,
    pub torquetilt_filtered_current: f32,
    pub derivative: f32,
    pub pitch_rate: f32,
    pub motor_current: f32,
    pub erpm: f32,
    pub abs_erpm: f32,
    pub loop_time_us: f32,
    pub diff_time_us: f32,
    pub loop_overshoot_us: f32,
    pub filtered_overshoot_us: f32,
    pub filtered_diff_time_us: f32,
}

impl DebugFields {
    /// Field id → value; unknown ids read 0.
    pub fn select(&self, index: u32) -> f32 {
        match index {
            1 => self.motor_position,
            2 => self.setpoint,
            3 => self.torquetilt_filtered_current,
            4 => self.derivative,
            5 => self.pitch_rate,
            6 => self.motor_current,
            7 => self.erpm,
            8 => self.abs_erpm,
            9 => self.loop_time_us,
            10 => self.diff_time_us,
            11 => self.loop_overshoot_us,
            12 => self.filtered_overshoot_us,
            13 => self.filtered_diff_time_us,
            _ => 0.0,
        }
    }
}

/// Shared telemetry cell. Single writer (the controller task).
#[derive(Debug, Default)]
pub struct Telemetry {
    pid_output: AtomicU32,
    pitch: AtomicU32,
    roll: AtomicU32,
    motor_current: AtomicU32,
    adc1: AtomicU32,
    adc2: AtomicU32,
    diff_time_us: AtomicU32,
    state: AtomicU16,
    detailed_state: AtomicU16,
    switch_state: AtomicU8,
    ride_state: AtomicU8,
    status: AtomicU32,
    debug1: AtomicU32,
    debug2: AtomicU32,

    // Console → controller command cells.
    render_field_1: AtomicU32,
    render_field_2: AtomicU32,
    sample_field: AtomicU32,
    sample_remaining: AtomicU32,
    experiment_fields: [AtomicU32; 6],
}

// Keep the whole cell within two cache lines; readers poll it at UI rate.
const_assert!(std::mem::size_of::<Telemetry>() <= 128);

#[inline]
fn store_f32(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

#[inline]
fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Writer side (controller task) ──

    #[allow(clippy::too_many_arguments)]
    pub fn publish(
        &self,
        pid_output: f32,
        pitch: f32,
        roll: f32,
        motor_current: f32,
        adc1: f32,
        adc2: f32,
        diff_time_us: u32,
        state: BalanceState,
        adjustment: SetpointAdjustmentType,
        cutback: bool,
        switch: SwitchState,
        ride: RideState,
        status: StatusFlags,
        debug: &DebugFields,
    ) {
        store_f32(&self.pid_output, pid_output);
        store_f32(&self.pitch, pitch);
        store_f32(&self.roll, roll);
        store_f32(&self.motor_current, motor_current);
        store_f32(&self.adc1, adc1);
        store_f32(&self.adc2, adc2);
        self.diff_time_us.store(diff_time_us, Ordering::Relaxed);
        self.state.store(state as u16, Ordering::Relaxed);
        self.detailed_state
            .store(encode_detailed_state(state, adjustment, cutback), Ordering::Relaxed);
        self.switch_state.store(switch as u8, Ordering::Relaxed);
        self.ride_state.store(ride as u8, Ordering::Relaxed);
        self.status.store(status.bits(), Ordering::Relaxed);
        store_f32(&self.debug1, debug.select(self.render_field_1.load(Ordering::Relaxed)));
        store_f32(&self.debug2, debug.select(self.render_field_2.load(Ordering::Relaxed)));
    }

    // ── Reader side ──

    pub fn pid_output(&self) -> f32 {
        load_f32(&self.pid_output)
    }
    pub fn pitch(&self) -> f32 {
        load_f32(&self.pitch)
    }
    pub fn roll(&self) -> f32 {
        load_f32(&self.roll)
    }
    pub fn motor_current(&self) -> f32 {
        load_f32(&self.motor_current)
    }
    pub fn adc1(&self) -> f32 {
        load_f32(&self.adc1)
    }
    pub fn adc2(&self) -> f32 {
        load_f32(&self.adc2)
    }
    pub fn diff_time_us(&self) -> u32 {
        self.diff_time_us.load(Ordering::Relaxed)
    }
    pub fn state_raw(&self) -> u16 {
        self.state.load(Ordering::Relaxed)
    }
    pub fn detailed_state_raw(&self) -> u16 {
        self.detailed_state.load(Ordering::Relaxed)
    }
    pub fn switch_state_raw(&self) -> u8 {
        self.switch_state.load(Ordering::Relaxed)
    }
    pub fn ride_state_raw(&self) -> u8 {
        self.ride_state.load(Ordering::Relaxed)
    }
    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_bits_truncate(self.status.load(Ordering::Relaxed))
    }
    pub fn debug1(&self) -> f32 {
        load_f32(&self.debug1)
    }
    pub fn debug2(&self) -> f32 {
        load_f32(&self.debug2)
    }

    // ── Console command cells ──

    pub fn set_render_field(&self, plot: u8, field: u32) {
        if plot == 2 {
            self.render_field_2.store(field, Ordering::Relaxed);
        } else {
            self.render_field_1.store(field, Ordering::Relaxed);
        }
    }

    /// Arm the sample dump: `count` values of `field`.
    pub fn arm_sampling(&self, field: u32, count: u32) {
        self.sample_field.store(field, Ordering::Relaxed);
        self.sample_remaining.store(count, Ordering::Relaxed);
    }

    /// Controller side: take one pending sample slot, if any.
    pub fn take_sample_slot(&self) -> Option<u32> {
        let remaining = self.sample_remaining.load(Ordering::Relaxed);
        if remaining == 0 {
            return None;
        }
        self.sample_remaining.store(remaining - 1, Ordering::Relaxed);
        Some(self.sample_field.load(Ordering::Relaxed))
    }

    pub fn set_experiment_field(&self, graph: usize, field: u32) {
        if let Some(cell) = self.experiment_fields.get(graph) {
            cell.store(field, Ordering::Relaxed);
        }
    }

    pub fn experiment_field(&self, graph: usize) -> u32 {
        self.experiment_fields
            .get(graph)
            .map_or(0, |cell| cell.load(Ordering::Relaxed))
    }
}

/// Pack the riding state, adjustment mode and cutback flag into one word
/// for log decoding: `state + (mode << 4) + (cutback ? 128 : 0)`.
#[inline]
pub fn encode_detailed_state(
    state: BalanceState,
    adjustment: SetpointAdjustmentType,
    cutback: bool,
) -> u16 {
    let mut encoded = state as u16 + ((adjustment as u16) << 4);
    if cutback {
        encoded += 128;
    }
    encoded
}
