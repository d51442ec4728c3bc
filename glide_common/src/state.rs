//! State enums for the balance controller.
//!
//! All enums use explicit `#[repr]` discriminants so telemetry readers and
//! UIs can rely on stable numeric values across firmware revisions.

use serde::{Deserialize, Serialize};

// ─── Top-Level Balance State ────────────────────────────────────────

/// Top-level controller state.
///
/// Value 5 was retired in an earlier revision and is kept unassigned so
/// existing UIs keep decoding the remaining values correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum BalanceState {
    /// Waiting for the IMU and a configured motor.
    Startup = 0,
    /// Balancing normally.
    Running = 1,
    /// Balancing with duty-cycle tiltback engaged.
    RunningTiltbackDuty = 2,
    /// Balancing with high-voltage tiltback engaged.
    RunningTiltbackHv = 3,
    /// Balancing with low-voltage tiltback engaged.
    RunningTiltbackLv = 4,
    /// Pitch exceeded the fault threshold.
    FaultAnglePitch = 6,
    /// Roll exceeded the fault threshold.
    FaultAngleRoll = 7,
    /// Foot switch half open at low speed.
    FaultSwitchHalf = 8,
    /// Foot switch fully open.
    FaultSwitchFull = 9,
    /// Duty cycle exceeded the fault threshold.
    FaultDuty = 10,
    /// Initial fault entered after startup; cleared by mounting the board.
    FaultStartup = 11,
    /// Reverse-stop sequence ended in a fault.
    FaultReverse = 12,
}

impl BalanceState {
    /// Convert from raw `u16`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Startup),
            1 => Some(Self::Running),
            2 => Some(Self::RunningTiltbackDuty),
            3 => Some(Self::RunningTiltbackHv),
            4 => Some(Self::RunningTiltbackLv),
            6 => Some(Self::FaultAnglePitch),
            7 => Some(Self::FaultAngleRoll),
            8 => Some(Self::FaultSwitchHalf),
            9 => Some(Self::FaultSwitchFull),
            10 => Some(Self::FaultDuty),
            11 => Some(Self::FaultStartup),
            12 => Some(Self::FaultReverse),
            _ => None,
        }
    }

    /// Returns true while the motor is actively balancing (any running
    /// state, tiltback included).
    #[inline]
    pub const fn is_running(&self) -> bool {
        matches!(
            self,
            Self::Running
                | Self::RunningTiltbackDuty
                | Self::RunningTiltbackHv
                | Self::RunningTiltbackLv
        )
    }

    /// Returns true for any fault state.
    #[inline]
    pub const fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::FaultAnglePitch
                | Self::FaultAngleRoll
                | Self::FaultSwitchHalf
                | Self::FaultSwitchFull
                | Self::FaultDuty
                | Self::FaultStartup
                | Self::FaultReverse
        )
    }
}

impl Default for BalanceState {
    fn default() -> Self {
        Self::Startup
    }
}

// ─── Setpoint Adjustment ────────────────────────────────────────────

/// Which setpoint shaping mode is active.
///
/// Centering and reverse-stop are transient; the tiltback modes are the
/// steady riding modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SetpointAdjustmentType {
    /// Easing the setpoint to level after engage.
    Centering = 0,
    /// Backward travel is being braked to a stop.
    ReverseStop = 1,
    /// Normal riding, no tiltback.
    TiltbackNone = 2,
    /// Duty-cycle limit tiltback.
    TiltbackDuty = 3,
    /// High-voltage tiltback.
    TiltbackHv = 4,
    /// Low-voltage tiltback.
    TiltbackLv = 5,
}

impl SetpointAdjustmentType {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Centering),
            1 => Some(Self::ReverseStop),
            2 => Some(Self::TiltbackNone),
            3 => Some(Self::TiltbackDuty),
            4 => Some(Self::TiltbackHv),
            5 => Some(Self::TiltbackLv),
            _ => None,
        }
    }

    /// Returns true for the steady riding modes, where the nose-angling,
    /// torque-tilt and turn-tilt adjustments apply.
    #[inline]
    pub const fn is_tiltback(&self) -> bool {
        matches!(
            self,
            Self::TiltbackNone | Self::TiltbackDuty | Self::TiltbackHv | Self::TiltbackLv
        )
    }
}

impl Default for SetpointAdjustmentType {
    fn default() -> Self {
        Self::Centering
    }
}

// ─── Foot Switch ────────────────────────────────────────────────────

/// Classified foot-pad switch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SwitchState {
    /// No pad pressed.
    Off = 0,
    /// Exactly one of two pads pressed.
    Half = 1,
    /// All configured pads pressed (or no switch fitted).
    On = 2,
}

impl SwitchState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::Half),
            2 => Some(Self::On),
            _ => None,
        }
    }
}

impl Default for SwitchState {
    fn default() -> Self {
        Self::Off
    }
}

// ─── Ride State (lighting / telemetry only) ─────────────────────────

/// Coarse ride classification used by lighting and telemetry consumers.
/// Never feeds back into control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RideState {
    /// Not balancing.
    Off = 0,
    /// Balancing below riding speed.
    Idle = 1,
    /// Driving forward.
    Forward = 2,
    /// Driving backward.
    Reverse = 3,
    /// Braking while moving forward.
    BrakeForward = 4,
    /// Braking while moving backward.
    BrakeReverse = 5,
}

impl RideState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Off),
            1 => Some(Self::Idle),
            2 => Some(Self::Forward),
            3 => Some(Self::Reverse),
            4 => Some(Self::BrakeForward),
            5 => Some(Self::BrakeReverse),
            _ => None,
        }
    }
}

impl Default for RideState {
    fn default() -> Self {
        Self::Off
    }
}
