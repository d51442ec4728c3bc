//! Control primitives: conditioning filters and the pitch PID.

pub mod filters;
pub mod pid;

pub use filters::{Biquad, BiquadKind, Pt1};
pub use pid::{PidController, PidOutcome, START_CENTER_DELAY_MS};
