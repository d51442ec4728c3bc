//! Common re-exports for downstream crates.

pub use crate::config::{
    AppConfig, BalanceConfig, ConfigError, MotorConfig, NrfConfig, ShutdownMode,
};
pub use crate::hal::{Buzzer, FootPads, Imu, LockStore, MotorLink, PlotSink, Printer};
pub use crate::state::{BalanceState, RideState, SetpointAdjustmentType, SwitchState};
