//! Signal conditioning filters.
//!
//! Second-order biquad (transposed direct form II, fixed Q = 0.5 so the
//! step response never rings) and a one-pole PT1 low-pass for the D term.

use std::f32::consts::PI;

// ─── Biquad (2nd-order, Q = 0.5) ────────────────────────────────────

/// Biquad filter kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    Lowpass,
    Highpass,
}

/// Biquad filter with baked-in coefficients and state.
///
/// `fc` is the cutoff as a fraction of the sample rate. Q is fixed at 0.5
/// (maximum smoothness); the controller never wants an underdamped filter
/// between the rider and the motor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Biquad {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    /// Configure for the given kind and normalized cutoff `fc = f / f_sample`.
    pub fn new(kind: BiquadKind, fc: f32) -> Self {
        let k = (PI * fc).tan();
        let q = 0.5;
        let norm = 1.0 / (1.0 + k / q + k * k);
        let (a0, a1) = match kind {
            BiquadKind::Lowpass => {
                let a0 = k * k * norm;
                (a0, 2.0 * a0)
            }
            BiquadKind::Highpass => {
                let a0 = norm;
                (a0, -2.0 * a0)
            }
        };
        Self {
            a0,
            a1,
            a2: a0,
            b1: 2.0 * (k * k - 1.0) * norm,
            b2: (1.0 - k / q + k * k) * norm,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Run one sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = input * self.a0 + self.z1;
        self.z1 = input * self.a1 + self.z2 - self.b1 * out;
        self.z2 = input * self.a2 - self.b2 * out;
        out
    }

    /// Clear the delay line (coefficients are kept).
    #[inline]
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

// ─── PT1 (1st-order low-pass) ───────────────────────────────────────

/// One-pole IIR low-pass: `y += k·(x − y)` with `k = dT/(RC + dT)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pt1 {
    k: f32,
    state: f32,
}

impl Pt1 {
    /// Build from cutoff frequency [Hz] and sample period [s].
    pub fn new(cutoff_hz: f32, dt: f32) -> Self {
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        Self {
            k: dt / (rc + dt),
            state: 0.0,
        }
    }

    /// Smoothing coefficient.
    #[inline]
    pub fn k(&self) -> f32 {
        self.k
    }

    /// Run one sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state += self.k * (input - self.state);
        self.state
    }

    #[inline]
    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}
