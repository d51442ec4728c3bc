//! Hardware capability traits.
//!
//! The balance controller is built against these small interfaces rather
//! than a concrete board. IMU fusion, motor commutation, buzzer driving and
//! persistence all live behind them, enabling pluggable backends
//! (simulation for tests and bench runs, real drivers on hardware).
//!
//! All accessors on the read side are non-blocking: the controller calls
//! them once per tick from the realtime loop.

/// Fused inertial estimate. Angles are radians; the controller converts to
/// degrees at the snapshot boundary.
pub trait Imu {
    /// Whether the fusion filter has converged after power-on.
    fn ready(&self) -> bool;
    /// Pitch angle [rad], positive nose-up.
    fn pitch(&self) -> f32;
    /// Roll angle [rad].
    fn roll(&self) -> f32;
    /// Yaw angle [rad], wrapping at ±π.
    fn yaw(&self) -> f32;
    /// Angular rates [rad/s] about x, y, z.
    fn gyro(&self) -> [f32; 3];
}

/// Motor controller link: telemetry reads plus the current command sink.
///
/// The write side is exclusively owned by the controller task; every
/// command also feeds the external watchdog via [`MotorLink::timeout_reset`].
pub trait MotorLink {
    /// Total directional filtered motor current [A].
    fn current_directional_filtered(&self) -> f32;
    /// Motor position [deg] as the position controller sees it.
    fn pid_position(&self) -> f32;
    /// PWM duty cycle, signed fraction in [-1, 1].
    fn duty_cycle(&self) -> f32;
    /// Electrical RPM, signed.
    fn erpm(&self) -> f32;
    /// Low-pass filtered electrical RPM, signed.
    fn smooth_erpm(&self) -> f32;
    /// DC input voltage [V].
    fn input_voltage(&self) -> f32;
    /// Filtered MOSFET temperature [°C].
    fn temp_fet_filtered(&self) -> f32;
    /// FOC switching frequency [Hz] (read back for the startup chime).
    fn switching_frequency(&self) -> f32;

    /// Command a motor current [A].
    fn set_current(&mut self, amps: f32);
    /// Command a braking current [A].
    fn set_brake_current(&mut self, amps: f32);
    /// How long the commanded current persists without renewal [s].
    fn set_current_off_delay(&mut self, delay_s: f32);
    /// Change the FOC switching frequency [Hz] (startup chime only).
    fn set_switching_frequency(&mut self, hz: f32);
    /// Pet the motor-control watchdog.
    fn timeout_reset(&mut self);
}

/// Foot-pad analog switch inputs, already scaled to volts.
pub trait FootPads {
    fn adc1(&self) -> f32;
    fn adc2(&self) -> f32;
}

/// External buzzer. `force` overrides an in-progress alert pattern.
pub trait Buzzer {
    fn on(&mut self, force: bool);
    fn off(&mut self, force: bool);
    /// Queue `beeps` beeps; `long` selects the long beep duration.
    fn alert(&mut self, beeps: u8, long: bool);
    /// Advance the alert pattern one tick.
    fn update(&mut self);
}

/// Debug console output sink.
pub trait Printer {
    fn print_line(&mut self, line: &str);
}

/// Realtime plot sink for the experiment graphs.
pub trait PlotSink {
    /// (Re)initialize the plot with axis label and title.
    fn init(&mut self, x_label: &str, title: &str);
    /// Append a named graph series.
    fn add_graph(&mut self, name: &str);
    /// Select the series subsequent points are sent to.
    fn set_graph(&mut self, index: usize);
    /// Emit one point to the selected series.
    fn send_points(&mut self, x: f32, y: f32);
}

/// Persistence for the lock flag. Writes through to the configuration
/// store; called at most once per completed lock sequence.
pub trait LockStore {
    fn persist_lock(&mut self, locked: bool);
}
