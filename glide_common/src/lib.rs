//! Glide Common Library
//!
//! Shared types for the glide balance controller workspace: ride/fault state
//! enums, raw configuration structures, and the hardware capability traits
//! the controller is built against.
//!
//! # Module Structure
//!
//! - [`state`] - Balance, setpoint-adjustment, switch and ride state enums
//! - [`config`] - Raw configuration types (TOML / serde)
//! - [`hal`] - Capability traits for the IMU, motor link, foot pads, buzzer
//!   and debug sinks
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod hal;
pub mod prelude;
pub mod state;
