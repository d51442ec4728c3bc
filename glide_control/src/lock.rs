//! Board lock.
//!
//! A nine-step foot-pad sequence toggles the lock: starting from both pads
//! down, the rider alternates releasing everything and pressing single
//! pads (1, 2, 1, 2). Each transition needs 50 ms of separation to filter
//! pad bounce; any wrong press aborts back to the start. While locked the
//! controller refuses the fault-to-running transition.

use glide_common::state::SwitchState;

/// Minimum dwell between sequence transitions [µs].
const STEP_GUARD_US: u64 = 50_000;

/// Result of one lock-sequence evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LockOutcome {
    /// Lock flag to persist (sequence completed and persistence armed).
    pub persist: Option<bool>,
    /// Completion beeps: (count, long).
    pub beep: Option<(u8, bool)>,
}

#[derive(Debug, Clone, Copy)]
pub struct LockSequence {
    /// -1 idle; 0..=8 progress through the sequence.
    state: i8,
    pub is_locked: bool,
    timer_us: u64,
}

impl LockSequence {
    pub fn new(initially_locked: bool) -> Self {
        Self {
            state: -1,
            is_locked: initially_locked,
            timer_us: 0,
        }
    }

    /// Abort any sequence in progress (entered a running state).
    pub fn rearm(&mut self) {
        self.state = -1;
    }

    /// Advance the sequence. Called every tick while in a fault state.
    pub fn check(
        &mut self,
        now_us: u64,
        switch: SwitchState,
        adc1: f32,
        adc2: f32,
        fault_adc1: f32,
        fault_adc2: f32,
        nrf_channel: u8,
    ) -> LockOutcome {
        let mut outcome = LockOutcome::default();
        if now_us.saturating_sub(self.timer_us) < STEP_GUARD_US {
            return outcome;
        }

        let pad1 = adc1 > fault_adc1;
        let pad2 = adc2 > fault_adc2;
        let old_state = self.state;
        match self.state {
            -1 => {
                if switch == SwitchState::On {
                    self.state = 0;
                }
            }
            0 => {
                if switch == SwitchState::Off {
                    self.state = 1;
                }
            }
            1 => {
                if pad2 {
                    self.state = -1;
                } else if pad1 {
                    self.state = 2;
                }
            }
            2 => {
                if pad2 || switch == SwitchState::On {
                    self.state = -1;
                } else if switch == SwitchState::Off {
                    self.state = 3;
                }
            }
            3 => {
                if pad1 {
                    self.state = -1;
                } else if pad2 {
                    self.state = 4;
                }
            }
            4 => {
                if pad1 || switch == SwitchState::On {
                    self.state = -1;
                } else if switch == SwitchState::Off {
                    self.state = 5;
                }
            }
            5 => {
                if pad2 {
                    self.state = -1;
                } else if pad1 {
                    self.state = 6;
                }
            }
            6 => {
                if pad2 || switch == SwitchState::On {
                    self.state = -1;
                } else if switch == SwitchState::Off {
                    self.state = 7;
                }
            }
            7 => {
                if pad1 {
                    self.state = -1;
                } else if pad2 {
                    self.state = 8;
                }
            }
            8 => {
                self.state = -1;
                self.is_locked = !self.is_locked;
                // Unlocking always persists; locking only with the
                // persistence channel armed.
                if !self.is_locked || nrf_channel == 99 {
                    outcome.persist = Some(self.is_locked);
                    outcome.beep = Some(if self.is_locked { (2, true) } else { (3, false) });
                }
            }
            _ => {}
        }

        if old_state != self.state {
            self.timer_us = now_us;
        }
        outcome
    }
}
