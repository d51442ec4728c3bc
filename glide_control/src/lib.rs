//! # Glide Balance Controller
//!
//! Hard-realtime balance controller for a single-wheel electric board. A
//! fixed-cadence loop (nominally 1 kHz) reads an inertial estimate and
//! motor telemetry, classifies the foot pads, evaluates faults, shapes a
//! riding setpoint through nose-angling / adaptive-torque-response /
//! turn-tilt adjustments, and commands motor current through a filtered
//! PID with adaptive gains.
//!
//! ## Layers
//!
//! 1. **Sensors** — one coherent frame per tick, nothing re-read later
//! 2. **Safety** — switch classifier + per-fault timers with hysteresis
//! 3. **Setpoint** — target ladder and rate-limited interpolation, plus
//!    the three tilt adjustments
//! 4. **Control** — biquad/PT1 conditioning and the adaptive PID
//! 5. **Cycle** — RT setup, cadence compensation, telemetry publishing
//!
//! ## Zero-Allocation Tick
//!
//! All controller state is pre-allocated; the tick performs no heap
//! allocation and no I/O. Failures are state transitions, never errors.

#![deny(clippy::disallowed_types)]

pub mod config;
pub mod console;
pub mod control;
pub mod controller;
pub mod cycle;
pub mod faults;
pub mod lock;
pub mod ride;
pub mod sensors;
pub mod setpoint;
pub mod sim;
pub mod switch;
pub mod telemetry;
pub mod tilt;
pub mod util;
