//! Per-tick sensor snapshot.
//!
//! One coherent frame is read at the top of every tick, in a fixed order,
//! and passed by reference through the rest of the pipeline. Nothing
//! downstream touches the hardware traits again until the next tick.

use glide_common::hal::{FootPads, Imu, MotorLink};

/// Samples in the acceleration moving-average window.
pub const ACCEL_ARRAY_SIZE: usize = 40;

/// One tick's worth of sensor data. Angles in degrees, currents in amps,
/// voltages in volts. Valid for the tick only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorFrame {
    /// Monotonic timestamp [µs].
    pub time_us: u64,
    /// IMU fusion has converged.
    pub imu_ready: bool,
    pub pitch: f32,
    /// Pitch from the previous frame (derivative source).
    pub last_pitch: f32,
    pub roll: f32,
    pub abs_roll: f32,
    pub gyro: [f32; 3],
    pub yaw: f32,
    pub erpm: f32,
    pub abs_erpm: f32,
    /// Low-pass filtered erpm, direction-corrected.
    pub smooth_erpm: f32,
    pub duty_cycle: f32,
    pub abs_duty_cycle: f32,
    pub motor_current: f32,
    pub motor_position: f32,
    pub fet_temp: f32,
    pub v_in: f32,
    pub adc1: f32,
    pub adc2: f32,
}

/// Builds frames and carries the previous pitch across ticks.
#[derive(Debug, Default)]
pub struct FrameBuilder {
    last_pitch: f32,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every input once, in a fixed order.
    pub fn build(
        &mut self,
        imu: &dyn Imu,
        motor: &dyn MotorLink,
        pads: &dyn FootPads,
        erpm_sign: f32,
        time_us: u64,
    ) -> SensorFrame {
        let motor_current = motor.current_directional_filtered();
        let motor_position = motor.pid_position();

        let last_pitch = self.last_pitch;
        let pitch = imu.pitch().to_degrees();
        self.last_pitch = pitch;

        let roll = imu.roll().to_degrees();
        let gyro = imu.gyro();
        let duty_cycle = motor.duty_cycle();
        let erpm = motor.erpm();
        let yaw = imu.yaw().to_degrees();
        let smooth_erpm = erpm_sign * motor.smooth_erpm();

        SensorFrame {
            time_us,
            imu_ready: imu.ready(),
            pitch,
            last_pitch,
            roll,
            abs_roll: roll.abs(),
            gyro,
            yaw,
            erpm,
            abs_erpm: erpm.abs(),
            smooth_erpm,
            duty_cycle,
            abs_duty_cycle: duty_cycle.abs(),
            motor_current,
            motor_position,
            fet_temp: motor.temp_fet_filtered(),
            v_in: motor.input_voltage(),
            adc1: pads.adc1(),
            adc2: pads.adc2(),
        }
    }
}

/// Sliding-window mean of the raw acceleration (first difference of the
/// smooth erpm), maintained incrementally: `avg += (new − old)/N`.
#[derive(Debug, Clone, Copy)]
pub struct AccelWindow {
    hist: [f32; ACCEL_ARRAY_SIZE],
    idx: usize,
    avg: f32,
}

impl Default for AccelWindow {
    fn default() -> Self {
        Self {
            hist: [0.0; ACCEL_ARRAY_SIZE],
            idx: 0,
            avg: 0.0,
        }
    }
}

impl AccelWindow {
    /// Insert one raw sample, returning the updated window mean.
    #[inline]
    pub fn push(&mut self, raw: f32) -> f32 {
        self.avg += (raw - self.hist[self.idx]) / ACCEL_ARRAY_SIZE as f32;
        self.hist[self.idx] = raw;
        self.idx += 1;
        if self.idx == ACCEL_ARRAY_SIZE {
            self.idx = 0;
        }
        self.avg
    }

    /// Current window mean.
    #[inline]
    pub fn average(&self) -> f32 {
        self.avg
    }

    /// Zero the window (re-engage).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
