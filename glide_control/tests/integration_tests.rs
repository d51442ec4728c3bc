//! Integration tests for the balance controller.
//!
//! These drive a full `Controller` through synthetic sensor-frame streams,
//! exercising the setpoint shaper, tilt adjustments, PID and state machine
//! together the way a ride would.

mod integration;
