//! Steady-state tick benchmark.
//!
//! The tick must fit comfortably inside the 1 ms loop budget with room
//! for sensor reads and the output writes around it.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use glide_common::config::AppConfig;
use glide_control::controller::Controller;
use glide_control::sensors::SensorFrame;

fn engaged_controller() -> Controller {
    let mut ctrl = Controller::new(&AppConfig::default());
    let frame = SensorFrame {
        time_us: 1000,
        imu_ready: true,
        v_in: 72.0,
        adc1: 3.0,
        adc2: 3.0,
        ..Default::default()
    };
    ctrl.tick(&frame); // Startup → FaultStartup
    let frame = SensorFrame {
        time_us: 2000,
        ..frame
    };
    ctrl.tick(&frame); // mount → Running
    ctrl
}

fn riding_frame(time_us: u64) -> SensorFrame {
    SensorFrame {
        time_us,
        imu_ready: true,
        v_in: 72.0,
        adc1: 3.0,
        adc2: 3.0,
        pitch: 0.4,
        last_pitch: 0.38,
        roll: 2.0,
        abs_roll: 2.0,
        yaw: 15.0,
        erpm: 3500.0,
        abs_erpm: 3500.0,
        smooth_erpm: 3500.0,
        duty_cycle: 0.35,
        abs_duty_cycle: 0.35,
        motor_current: 18.0,
        ..Default::default()
    }
}

fn bench_tick(c: &mut Criterion) {
    c.bench_function("running_tick", |b| {
        let mut ctrl = engaged_controller();
        let mut t = 3000u64;
        b.iter(|| {
            t += 1000;
            let frame = riding_frame(t);
            black_box(ctrl.tick(black_box(&frame)));
        });
    });

    c.bench_function("fault_tick", |b| {
        let mut ctrl = engaged_controller();
        // Step off: let the controller settle into a fault.
        for i in 0..2000u64 {
            let mut frame = riding_frame(3000 + i * 1000);
            frame.adc1 = 0.0;
            frame.adc2 = 0.0;
            frame.erpm = 0.0;
            frame.abs_erpm = 0.0;
            ctrl.tick(&frame);
        }
        let mut t = 3_000_000u64;
        b.iter(|| {
            t += 1000;
            let mut frame = riding_frame(t);
            frame.adc1 = 0.0;
            frame.adc2 = 0.0;
            black_box(ctrl.tick(black_box(&frame)));
        });
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
