//! Fault detection.
//!
//! Every fault kind owns a timer that re-arms whenever its precondition is
//! absent; the fault fires only after the precondition has held for the
//! configured delay (or immediately with `ignore_timers`). Checking order
//! is a UX choice: switch faults before angle faults, first hit wins.

use glide_common::config::BalanceConfig;
use glide_common::state::{BalanceState, SwitchState};

use crate::config::Derived;
use crate::sensors::SensorFrame;

/// Pitch beyond this while slow with pads off stops the motor immediately.
const QUICK_STOP_PITCH: f32 = 15.0;

/// Above this |erpm| full-switch faults are suppressed unless explicitly
/// allowed (roughly 7 mph on an 11-inch tire).
const HIGH_SPEED_ERPM: f32 = 3000.0;

/// Reverse-stop progress shared between the setpoint shaper (which arms
/// and accumulates it) and the fault detector (which ends it).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseContext {
    /// Whether the reverse-stop branch is the active adjustment.
    pub active: bool,
    /// Re-armed while the board is close to level.
    pub timer_us: u64,
    /// Cumulative signed erpm since reverse-stop engaged.
    pub total_erpm: f32,
}

/// Per-fault timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultMonitor {
    switch_timer_us: u64,
    switch_half_timer_us: u64,
    angle_pitch_timer_us: u64,
    angle_roll_timer_us: u64,
    duty_timer_us: u64,
}

#[inline]
fn elapsed_ms(now_us: u64, since_us: u64) -> u64 {
    now_us.saturating_sub(since_us) / 1000
}

impl FaultMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate all fault conditions for this tick.
    ///
    /// Returns the fault state to enter, or `None`. With `ignore_timers`
    /// every timed fault fires on its precondition alone (used to require
    /// a second fault before a duty fault may clear).
    pub fn check(
        &mut self,
        frame: &SensorFrame,
        switch: SwitchState,
        cfg: &BalanceConfig,
        d: &Derived,
        reverse: &mut ReverseContext,
        ignore_timers: bool,
    ) -> Option<BalanceState> {
        let now = frame.time_us;
        let abs_pitch = frame.pitch.abs();

        // Switch fully open.
        if switch == SwitchState::Off {
            if elapsed_ms(now, self.switch_timer_us) > cfg.fault_delay_switch_full as u64
                || ignore_timers
            {
                return Some(BalanceState::FaultSwitchFull);
            } else if frame.abs_erpm < cfg.fault_adc_half_erpm * 4.0
                && elapsed_ms(now, self.switch_timer_us) > cfg.fault_delay_switch_half as u64
            {
                // Low speed: the short half-switch delay applies.
                return Some(BalanceState::FaultSwitchFull);
            } else if frame.abs_erpm < cfg.fault_adc_half_erpm && abs_pitch > QUICK_STOP_PITCH {
                // Quick stop.
                return Some(BalanceState::FaultSwitchFull);
            } else if frame.abs_erpm > HIGH_SPEED_ERPM && !d.allow_high_speed_full_switch_faults {
                // Never produce switch faults at speed: hold the timer.
                self.switch_timer_us = now;
            }
        } else {
            self.switch_timer_us = now;
        }

        // Reverse-stop supervision.
        if reverse.active {
            // Taking your foot off entirely while reversing? No delays.
            if switch == SwitchState::Off {
                return Some(BalanceState::FaultSwitchFull);
            }
            if abs_pitch > 15.0 {
                return Some(BalanceState::FaultReverse);
            }
            if abs_pitch > 10.0 && elapsed_ms(now, reverse.timer_us) > 500 {
                return Some(BalanceState::FaultReverse);
            }
            if abs_pitch > 5.0 && elapsed_ms(now, reverse.timer_us) > 1000 {
                return Some(BalanceState::FaultReverse);
            }
            if reverse.total_erpm.abs() > d.reverse_tolerance * 3.0 {
                return Some(BalanceState::FaultReverse);
            }
            if abs_pitch < 5.0 {
                reverse.timer_us = now;
            }
        }

        // Switch partially open and stopped.
        if (switch == SwitchState::Half || switch == SwitchState::Off)
            && frame.abs_erpm < cfg.fault_adc_half_erpm
        {
            if elapsed_ms(now, self.switch_half_timer_us) > cfg.fault_delay_switch_half as u64
                || ignore_timers
            {
                return Some(BalanceState::FaultSwitchHalf);
            }
        } else {
            self.switch_half_timer_us = now;
        }

        // Pitch angle.
        if abs_pitch > cfg.fault_pitch {
            if elapsed_ms(now, self.angle_pitch_timer_us) > cfg.fault_delay_pitch as u64
                || ignore_timers
            {
                return Some(BalanceState::FaultAnglePitch);
            }
        } else {
            self.angle_pitch_timer_us = now;
        }

        // Roll angle.
        if frame.abs_roll > cfg.fault_roll {
            if elapsed_ms(now, self.angle_roll_timer_us) > cfg.fault_delay_roll as u64
                || ignore_timers
            {
                return Some(BalanceState::FaultAngleRoll);
            }
        } else {
            self.angle_roll_timer_us = now;
        }

        // Duty cycle.
        if frame.abs_duty_cycle > cfg.fault_duty {
            if elapsed_ms(now, self.duty_timer_us) > cfg.fault_delay_duty as u64 || ignore_timers {
                return Some(BalanceState::FaultDuty);
            }
        } else {
            self.duty_timer_us = now;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::configure;
    use glide_common::config::AppConfig;

    fn setup() -> (BalanceConfig, Derived) {
        let app = AppConfig::default();
        (app.balance.clone(), configure(&app))
    }

    fn frame(time_ms: u64) -> SensorFrame {
        SensorFrame {
            time_us: time_ms * 1000,
            ..Default::default()
        }
    }

    #[test]
    fn switch_full_fault_after_delay() {
        let (cfg, d) = setup();
        let mut mon = FaultMonitor::new();
        let mut rev = ReverseContext::default();

        // Pads down at t=0 arms the timer.
        let f = frame(0);
        assert!(mon
            .check(&f, SwitchState::On, &cfg, &d, &mut rev, false)
            .is_none());

        // Off, but within the delay: no fault yet. (Speed keeps the
        // low-speed branches out of the way.)
        let mut f = frame(100);
        f.erpm = 2500.0;
        f.abs_erpm = 2500.0;
        assert!(mon
            .check(&f, SwitchState::Off, &cfg, &d, &mut rev, false)
            .is_none());

        // Past fault_delay_switch_full (250 ms default): fault.
        let mut f = frame(300);
        f.erpm = 2500.0;
        f.abs_erpm = 2500.0;
        assert_eq!(
            mon.check(&f, SwitchState::Off, &cfg, &d, &mut rev, false),
            Some(BalanceState::FaultSwitchFull)
        );
    }

    #[test]
    fn switch_full_timer_rearms_when_pads_return() {
        let (cfg, d) = setup();
        let mut mon = FaultMonitor::new();
        let mut rev = ReverseContext::default();

        let mut f = frame(0);
        f.abs_erpm = 2500.0;
        mon.check(&f, SwitchState::Off, &cfg, &d, &mut rev, false);
        let mut f = frame(200);
        f.abs_erpm = 2500.0;
        // Pads back on re-arms the timer...
        assert!(mon
            .check(&f, SwitchState::On, &cfg, &d, &mut rev, false)
            .is_none());
        // ...so going Off again starts a fresh delay window.
        let mut f = frame(400);
        f.abs_erpm = 2500.0;
        assert!(mon
            .check(&f, SwitchState::Off, &cfg, &d, &mut rev, false)
            .is_none());
    }

    #[test]
    fn quick_stop_is_immediate_when_slow_and_tilted() {
        let (cfg, d) = setup();
        let mut mon = FaultMonitor::new();
        let mut rev = ReverseContext::default();

        let mut f = frame(1);
        f.abs_erpm = 100.0; // below fault_adc_half_erpm
        f.pitch = 16.0;
        assert_eq!(
            mon.check(&f, SwitchState::Off, &cfg, &d, &mut rev, false),
            Some(BalanceState::FaultSwitchFull)
        );
    }

    #[test]
    fn high_speed_switch_faults_suppressed_by_flag() {
        let (mut cfg, _) = setup();
        cfg.fault_delay_switch_full = 251; // ends in 1 → suppressed
        let mut app = AppConfig::default();
        app.balance = cfg.clone();
        let d = configure(&app);
        let mut mon = FaultMonitor::new();
        let mut rev = ReverseContext::default();

        // Pads off at 5000 erpm: the timer is held, so no amount of
        // elapsed time produces a fault.
        for t in (0..5000).step_by(100) {
            let mut f = frame(t);
            f.erpm = 5000.0;
            f.abs_erpm = 5000.0;
            assert!(
                mon.check(&f, SwitchState::Off, &cfg, &d, &mut rev, false)
                    .is_none(),
                "unexpected fault at t={t}"
            );
        }

        // With the flag allowed the same run faults after the delay.
        cfg.fault_delay_switch_full = 250;
        app.balance = cfg.clone();
        let d = configure(&app);
        let mut mon = FaultMonitor::new();
        let mut fault = None;
        for t in (0..5000).step_by(100) {
            let mut f = frame(t);
            f.erpm = 5000.0;
            f.abs_erpm = 5000.0;
            fault = mon.check(&f, SwitchState::Off, &cfg, &d, &mut rev, false);
            if fault.is_some() {
                break;
            }
        }
        assert_eq!(fault, Some(BalanceState::FaultSwitchFull));
    }

    #[test]
    fn half_switch_fault_only_below_half_erpm() {
        let (cfg, d) = setup();
        let mut mon = FaultMonitor::new();
        let mut rev = ReverseContext::default();

        // Half pads at speed: never a half fault.
        let mut f = frame(0);
        f.abs_erpm = 1000.0;
        mon.check(&f, SwitchState::Half, &cfg, &d, &mut rev, false);
        let mut f = frame(500);
        f.abs_erpm = 1000.0;
        assert!(mon
            .check(&f, SwitchState::Half, &cfg, &d, &mut rev, false)
            .is_none());

        // Half pads while stopped: fault after fault_delay_switch_half.
        let f = frame(501);
        mon.check(&f, SwitchState::Half, &cfg, &d, &mut rev, false);
        let f = frame(600);
        assert_eq!(
            mon.check(&f, SwitchState::Half, &cfg, &d, &mut rev, false),
            Some(BalanceState::FaultSwitchHalf)
        );
    }

    #[test]
    fn pitch_fault_after_delay() {
        let (cfg, d) = setup();
        let mut mon = FaultMonitor::new();
        let mut rev = ReverseContext::default();

        let mut f = frame(0);
        f.pitch = cfg.fault_pitch + 1.0;
        f.abs_erpm = 1000.0;
        assert!(mon
            .check(&f, SwitchState::On, &cfg, &d, &mut rev, false)
            .is_none());
        let mut f = frame(cfg.fault_delay_pitch as u64 + 10);
        f.pitch = cfg.fault_pitch + 1.0;
        f.abs_erpm = 1000.0;
        assert_eq!(
            mon.check(&f, SwitchState::On, &cfg, &d, &mut rev, false),
            Some(BalanceState::FaultAnglePitch)
        );
    }

    #[test]
    fn duty_fault_with_ignore_timers_is_immediate() {
        let (cfg, d) = setup();
        let mut mon = FaultMonitor::new();
        let mut rev = ReverseContext::default();

        let mut f = frame(0);
        f.duty_cycle = 0.95;
        f.abs_duty_cycle = 0.95;
        f.abs_erpm = 1000.0;
        assert_eq!(
            mon.check(&f, SwitchState::On, &cfg, &d, &mut rev, true),
            Some(BalanceState::FaultDuty)
        );
    }

    #[test]
    fn reverse_stop_faults() {
        let (cfg, d) = setup();
        let mut mon = FaultMonitor::new();
        let mut rev = ReverseContext {
            active: true,
            timer_us: 0,
            total_erpm: 0.0,
        };

        // Pads off while reversing is an immediate full-switch fault.
        let mut f = frame(1);
        f.abs_erpm = 500.0;
        assert_eq!(
            mon.check(&f, SwitchState::Off, &cfg, &d, &mut rev, false),
            Some(BalanceState::FaultSwitchFull)
        );

        // 15 degrees is immediate.
        let mut f = frame(2);
        f.pitch = 15.5;
        f.abs_erpm = 500.0;
        assert_eq!(
            mon.check(&f, SwitchState::On, &cfg, &d, &mut rev, false),
            Some(BalanceState::FaultReverse)
        );

        // Overtravel fault, regardless of travel direction sign.
        let mut rev = ReverseContext {
            active: true,
            timer_us: 0,
            total_erpm: -(d.reverse_tolerance * 3.0 + 1.0),
        };
        let mut f = frame(3);
        f.abs_erpm = 500.0;
        assert_eq!(
            mon.check(&f, SwitchState::On, &cfg, &d, &mut rev, false),
            Some(BalanceState::FaultReverse)
        );
    }

    #[test]
    fn reverse_timer_rearms_near_level() {
        let (cfg, d) = setup();
        let mut mon = FaultMonitor::new();
        let mut rev = ReverseContext {
            active: true,
            timer_us: 0,
            total_erpm: 0.0,
        };

        // Near level: the shared timer keeps re-arming.
        let mut f = frame(2000);
        f.pitch = 2.0;
        f.abs_erpm = 500.0;
        assert!(mon
            .check(&f, SwitchState::On, &cfg, &d, &mut rev, false)
            .is_none());
        assert_eq!(rev.timer_us, 2_000_000);

        // 10..15 degrees held for over 500 ms since the last re-arm.
        let mut f = frame(2600);
        f.pitch = 11.0;
        f.abs_erpm = 500.0;
        assert_eq!(
            mon.check(&f, SwitchState::On, &cfg, &d, &mut rev, false),
            Some(BalanceState::FaultReverse)
        );
    }
}
