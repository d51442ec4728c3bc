//! Shared scenario rig: a controller plus a frame generator advancing one
//! millisecond per tick.

use glide_common::config::AppConfig;
use glide_common::state::BalanceState;
use glide_control::controller::{Controller, Outputs};
use glide_control::sensors::SensorFrame;

pub struct Rig {
    pub ctrl: Controller,
    pub t_ms: u64,
    last_pitch: f32,
}

impl Rig {
    pub fn new(app: &AppConfig) -> Self {
        Self {
            ctrl: Controller::new(app),
            t_ms: 0,
            last_pitch: 0.0,
        }
    }

    /// Base frame: rider mounted, healthy battery, level board.
    fn base_frame(&self) -> SensorFrame {
        SensorFrame {
            time_us: self.t_ms * 1000,
            imu_ready: true,
            v_in: 72.0,
            adc1: 3.0,
            adc2: 3.0,
            last_pitch: self.last_pitch,
            ..Default::default()
        }
    }

    /// Run one tick; `shape` adjusts the frame before it is consumed.
    pub fn tick(&mut self, shape: impl FnOnce(&mut SensorFrame)) -> Outputs {
        self.t_ms += 1;
        let mut frame = self.base_frame();
        shape(&mut frame);
        frame.abs_erpm = frame.erpm.abs();
        frame.abs_duty_cycle = frame.duty_cycle.abs();
        frame.abs_roll = frame.roll.abs();
        self.last_pitch = frame.pitch;
        self.ctrl.tick(&frame)
    }

    /// Drive from power-on into `Running` via the startup fault.
    pub fn engage(&mut self) {
        self.tick(|_| {});
        assert_eq!(self.ctrl.state, BalanceState::FaultStartup);
        self.tick(|_| {});
        assert_eq!(self.ctrl.state, BalanceState::Running);
    }
}
