//! Setpoint adjustments layered on top of the shaped setpoint:
//! speed-dependent nose angling, adaptive torque response, and yaw-driven
//! turn tilt. Applied in that order every running tick.

pub mod noseangling;
pub mod torquetilt;
pub mod turntilt;

pub use noseangling::NoseAngling;
pub use torquetilt::TorqueTilt;
pub use turntilt::{TurnTilt, YawTracker};
