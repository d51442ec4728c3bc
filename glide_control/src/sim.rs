//! Simulated board.
//!
//! A deliberately small physics stand-in behind the hardware traits, good
//! enough to bring the whole loop up on a desk: an inverted-pendulum pitch
//! model driven by the commanded current, a wheel that spins up with
//! drive current, and foot pads that are either occupied or empty.
//!
//! The model advances one step per motor command, i.e. once per tick.

use std::sync::{Arc, Mutex};

use glide_common::hal::{Buzzer, FootPads, Imu, LockStore, MotorLink, PlotSink, Printer};

#[derive(Debug)]
struct SimState {
    dt: f32,
    pitch_deg: f32,
    pitch_rate: f32,
    yaw_deg: f32,
    erpm: f32,
    v_in: f32,
    fet_temp: f32,
    switching_freq: f32,
    rider_present: bool,
    commanded_current: f32,
    brake_current: f32,
    buzzer_on: bool,
    locked: Option<bool>,
}

impl SimState {
    /// One Euler step of the pitch/wheel model.
    fn step(&mut self, drive_current: f32) {
        self.commanded_current = drive_current;
        // Gravity tips the board over; wheel torque reacts against it.
        let pitch_accel = 100.0 * self.pitch_deg - 0.6 * drive_current;
        self.pitch_rate += pitch_accel * self.dt;
        self.pitch_deg += self.pitch_rate * self.dt;
        self.erpm += drive_current * 40.0 * self.dt;
        // Rolling drag.
        self.erpm *= 1.0 - 0.02 * self.dt;
    }
}

/// Shared simulated board; clone handles for each hardware role.
#[derive(Clone)]
pub struct SimBoard {
    state: Arc<Mutex<SimState>>,
}

impl SimBoard {
    pub fn new(rider_present: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                dt: 0.001,
                pitch_deg: 0.1,
                pitch_rate: 0.0,
                yaw_deg: 0.0,
                erpm: 0.0,
                v_in: 72.0,
                fet_temp: 35.0,
                switching_freq: 25_000.0,
                rider_present,
                commanded_current: 0.0,
                brake_current: 0.0,
                buzzer_on: false,
                locked: None,
            })),
        }
    }

    pub fn pitch_deg(&self) -> f32 {
        self.state.lock().unwrap().pitch_deg
    }

    pub fn commanded_current(&self) -> f32 {
        self.state.lock().unwrap().commanded_current
    }

    pub fn persisted_lock(&self) -> Option<bool> {
        self.state.lock().unwrap().locked
    }
}

impl Imu for SimBoard {
    fn ready(&self) -> bool {
        true
    }
    fn pitch(&self) -> f32 {
        self.state.lock().unwrap().pitch_deg.to_radians()
    }
    fn roll(&self) -> f32 {
        0.0
    }
    fn yaw(&self) -> f32 {
        self.state.lock().unwrap().yaw_deg.to_radians()
    }
    fn gyro(&self) -> [f32; 3] {
        let s = self.state.lock().unwrap();
        [0.0, s.pitch_rate.to_radians(), 0.0]
    }
}

impl MotorLink for SimBoard {
    fn current_directional_filtered(&self) -> f32 {
        self.state.lock().unwrap().commanded_current
    }
    fn pid_position(&self) -> f32 {
        0.0
    }
    fn duty_cycle(&self) -> f32 {
        (self.state.lock().unwrap().erpm / 10_000.0).clamp(-0.95, 0.95)
    }
    fn erpm(&self) -> f32 {
        self.state.lock().unwrap().erpm
    }
    fn smooth_erpm(&self) -> f32 {
        self.state.lock().unwrap().erpm
    }
    fn input_voltage(&self) -> f32 {
        self.state.lock().unwrap().v_in
    }
    fn temp_fet_filtered(&self) -> f32 {
        self.state.lock().unwrap().fet_temp
    }
    fn switching_frequency(&self) -> f32 {
        self.state.lock().unwrap().switching_freq
    }
    fn set_current(&mut self, amps: f32) {
        self.state.lock().unwrap().step(amps);
    }
    fn set_brake_current(&mut self, amps: f32) {
        let mut s = self.state.lock().unwrap();
        s.brake_current = amps;
        // Braking holds the wheel.
        s.erpm *= 0.98;
        s.step(0.0);
    }
    fn set_current_off_delay(&mut self, _delay_s: f32) {}
    fn set_switching_frequency(&mut self, hz: f32) {
        self.state.lock().unwrap().switching_freq = hz;
    }
    fn timeout_reset(&mut self) {}
}

impl FootPads for SimBoard {
    fn adc1(&self) -> f32 {
        if self.state.lock().unwrap().rider_present {
            3.3
        } else {
            0.0
        }
    }
    fn adc2(&self) -> f32 {
        self.adc1()
    }
}

impl Buzzer for SimBoard {
    fn on(&mut self, _force: bool) {
        self.state.lock().unwrap().buzzer_on = true;
    }
    fn off(&mut self, _force: bool) {
        self.state.lock().unwrap().buzzer_on = false;
    }
    fn alert(&mut self, beeps: u8, long: bool) {
        tracing::debug!(beeps, long, "buzzer alert");
    }
    fn update(&mut self) {}
}

impl LockStore for SimBoard {
    fn persist_lock(&mut self, locked: bool) {
        self.state.lock().unwrap().locked = Some(locked);
    }
}

/// Console printer for the simulation binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutPrinter;

impl Printer for StdoutPrinter {
    fn print_line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Plot sink that logs points instead of graphing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPlotSink {
    graph: usize,
}

impl PlotSink for LogPlotSink {
    fn init(&mut self, x_label: &str, title: &str) {
        tracing::info!(x_label, title, "plot initialized");
    }
    fn add_graph(&mut self, name: &str) {
        tracing::debug!(name, "plot graph added");
    }
    fn set_graph(&mut self, index: usize) {
        self.graph = index;
    }
    fn send_points(&mut self, x: f32, y: f32) {
        tracing::trace!(graph = self.graph, x, y, "plot point");
    }
}
