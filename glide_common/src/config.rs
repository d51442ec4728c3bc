//! Raw configuration types.
//!
//! These structs mirror the persisted configuration as the rider's tuning
//! app writes it. Several scalars carry encoded sub-flags in their
//! fractional part or are borrowed legacy slots; decoding them into typed
//! values is the controller's job (`glide_control::config`) — this module
//! only parses and carries the raw numbers.
//!
//! Every field has a conservative default so a partial TOML file loads.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading error. Out-of-range *values* are never an error
/// (they are clamped downstream); only unreadable or unparseable input is.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

// ─── Balance App Config ─────────────────────────────────────────────

/// Balance application tuning, as persisted.
///
/// Angle fields are degrees, speeds are degrees/second, delays are
/// milliseconds, currents are amps, voltages are volts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Control loop rate [Hz].
    pub hertz: f32,
    /// Loop-overshoot filter cutoff [Hz]; 0 disables cadence compensation.
    pub loop_time_filter: f32,

    // ── Startup ──
    /// Max |pitch| to allow engage from a fault state [deg].
    pub startup_pitch_tolerance: f32,
    /// Max |roll| to allow engage from a fault state [deg].
    pub startup_roll_tolerance: f32,
    /// Centering ramp speed [deg/s]. The fractional part encodes the
    /// start-click / reverse-stop selection.
    pub startup_speed: f32,
    /// Startup chime selector (legacy slot): 0 = silent, 1 = full tune,
    /// anything else = single wiggle.
    pub deadzone: f32,
    /// Persisted lock flag (legacy slot).
    pub multi_esc: bool,

    // ── Faults ──
    /// Pitch fault threshold [deg].
    pub fault_pitch: f32,
    /// Roll fault threshold [deg].
    pub fault_roll: f32,
    /// Duty fault threshold [fraction].
    pub fault_duty: f32,
    /// ADC 1 switch threshold [V]; 0 = pad not fitted.
    pub fault_adc1: f32,
    /// ADC 2 switch threshold [V]; 0 = pad not fitted.
    pub fault_adc2: f32,
    /// Half-switch fault applies below this |erpm|.
    pub fault_adc_half_erpm: f32,
    pub fault_delay_pitch: u16,
    pub fault_delay_roll: u16,
    pub fault_delay_duty: u16,
    pub fault_delay_switch_half: u16,
    /// Full-switch fault delay [ms]. A value ending in 1 disables
    /// high-speed full-switch faults.
    pub fault_delay_switch_full: u16,

    // ── Tiltback ──
    pub tiltback_duty_angle: f32,
    pub tiltback_duty_speed: f32,
    /// Duty fraction at which duty tiltback engages.
    pub tiltback_duty: f32,
    pub tiltback_hv_angle: f32,
    pub tiltback_hv_speed: f32,
    /// Input voltage above which high-voltage tiltback engages [V].
    pub tiltback_hv: f32,
    pub tiltback_lv_angle: f32,
    pub tiltback_lv_speed: f32,
    /// Input voltage below which low-voltage tiltback engages [V].
    pub tiltback_lv: f32,
    /// Return-to-level ramp speed [deg/s].
    pub tiltback_return_speed: f32,
    /// Constant nose angle [deg] applied above `tiltback_constant_erpm`.
    pub tiltback_constant: f32,
    pub tiltback_constant_erpm: f32,
    /// Variable nose angle [deg per 1000 erpm].
    pub tiltback_variable: f32,
    /// Cap for the variable nose angle [deg].
    pub tiltback_variable_max: f32,
    /// Nose-angling ramp speed [deg/s].
    pub noseangling_speed: f32,

    // ── PID ──
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// D-term PT1 cutoff [Hz]; honored in [1, 30], otherwise 10.
    pub kd_pt1_lowpass_frequency: f32,
    /// Brake-tilt lingering divisor, 1..20 (legacy slot).
    pub kd_pt1_highpass_frequency: f32,
    /// Integral torque-tilt impact, downhill, percent (legacy slot).
    pub kd_biquad_lowpass: f32,
    /// Integral torque-tilt impact, uphill, percent (legacy slot).
    pub kd_biquad_highpass: f32,
    /// Center-boost angle window [deg] (legacy slot).
    pub booster_angle: f32,
    /// Center-boost kp scaling (legacy slot).
    pub booster_ramp: f32,
    /// Torque-tilt PID stiffening intensity (legacy slot).
    pub booster_current: f32,

    // ── Torque-tilt / ATR ──
    /// Current needed to hold speed on the flat [A].
    pub torquetilt_start_current: f32,
    pub torquetilt_angle_limit: f32,
    pub torquetilt_on_speed: f32,
    pub torquetilt_off_speed: f32,
    /// Response strength; stored ×0.1 (0.15 → gain 1.5).
    pub torquetilt_strength: f32,
    /// Current low-pass cutoff [Hz]; 0 selects the 5 Hz default.
    pub torquetilt_filter: f32,

    // ── Turn-tilt ──
    pub turntilt_strength: f32,
    pub turntilt_angle_limit: f32,
    /// Minimum |yaw change|·100 to engage [deg].
    pub turntilt_start_angle: f32,
    pub turntilt_start_erpm: f32,
    pub turntilt_speed: f32,
    /// Speed boost at/after `turntilt_erpm_boost_end` [percent].
    pub turntilt_erpm_boost: u16,
    pub turntilt_erpm_boost_end: f32,

    // ── Borrowed legacy slots ──
    /// Yaw aggregate boost target.
    pub yaw_ki: f32,
    /// Expected-acceleration factor: erpm gained per tick per amp.
    pub yaw_kd: f32,
    /// Max brake amps (integer part) + max derivative (fraction ×100).
    pub roll_steer_kp: f32,
    /// Center-jerk duration [ms]; values above 100 disable the jerk.
    pub roll_steer_erpm_kp: f32,
    /// Center-jerk strength [A], usable range ±50.
    pub yaw_current_clamp: f32,

    // ── Brake ──
    /// Brake current [A]; the fractional part ×100 is the start-click
    /// current (capped at 30 A).
    pub brake_current: f32,
    /// Brake release timeout at standstill [s]; 0 keeps the brake forever.
    pub brake_timeout: f32,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            hertz: 1000.0,
            loop_time_filter: 3.0,
            startup_pitch_tolerance: 0.2,
            startup_roll_tolerance: 8.0,
            startup_speed: 30.0,
            deadzone: 0.0,
            multi_esc: false,
            fault_pitch: 20.0,
            fault_roll: 45.0,
            fault_duty: 0.9,
            fault_adc1: 2.0,
            fault_adc2: 2.0,
            fault_adc_half_erpm: 300.0,
            fault_delay_pitch: 250,
            fault_delay_roll: 500,
            fault_delay_duty: 500,
            fault_delay_switch_half: 50,
            fault_delay_switch_full: 250,
            tiltback_duty_angle: 3.0,
            tiltback_duty_speed: 3.0,
            tiltback_duty: 0.8,
            tiltback_hv_angle: 3.0,
            tiltback_hv_speed: 3.0,
            tiltback_hv: 85.0,
            tiltback_lv_angle: 3.0,
            tiltback_lv_speed: 3.0,
            tiltback_lv: 60.0,
            tiltback_return_speed: 5.0,
            tiltback_constant: 0.0,
            tiltback_constant_erpm: 500.0,
            tiltback_variable: 0.0,
            tiltback_variable_max: 2.0,
            noseangling_speed: 5.0,
            kp: 6.0,
            ki: 0.005,
            kd: 800.0,
            kd_pt1_lowpass_frequency: 10.0,
            kd_pt1_highpass_frequency: 10.0,
            kd_biquad_lowpass: 20.0,
            kd_biquad_highpass: 20.0,
            booster_angle: 1.0,
            booster_ramp: 4.0,
            booster_current: 0.5,
            torquetilt_start_current: 8.0,
            torquetilt_angle_limit: 8.0,
            torquetilt_on_speed: 5.0,
            torquetilt_off_speed: 3.0,
            torquetilt_strength: 0.15,
            torquetilt_filter: 5.0,
            turntilt_strength: 10.0,
            turntilt_angle_limit: 3.0,
            turntilt_start_angle: 1.0,
            turntilt_start_erpm: 100.0,
            turntilt_speed: 5.0,
            turntilt_erpm_boost: 20,
            turntilt_erpm_boost_end: 5000.0,
            yaw_ki: 15.0,
            yaw_kd: 50.0,
            roll_steer_kp: 0.0,
            roll_steer_erpm_kp: 0.0,
            yaw_current_clamp: 0.0,
            brake_current: 6.0,
            brake_timeout: 0.0,
        }
    }
}

// ─── Motor Config ───────────────────────────────────────────────────

/// Motor-controller limits and identification results the balance app
/// consumes. Owned and persisted by the motor-control layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// Maximum motor current [A].
    pub l_current_max: f32,
    /// Minimum (most negative) motor current [A].
    pub l_current_min: f32,
    /// FET temperature at which the motor controller starts derating [°C].
    pub l_temp_fet_start: f32,
    /// Motor direction is inverted.
    pub invert_direction: bool,
    /// Measured motor resistance [ohm]; 0 = never identified.
    pub foc_motor_r: f32,
    /// Measured flux linkage [Wb]; 0 = never identified.
    pub foc_motor_flux_linkage: f32,
}

impl MotorConfig {
    /// Whether motor identification has run. Balancing on an unidentified
    /// motor is refused at startup.
    #[inline]
    pub fn params_configured(&self) -> bool {
        self.foc_motor_r != 0.0 && self.foc_motor_flux_linkage != 0.0
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            l_current_max: 60.0,
            l_current_min: -60.0,
            l_temp_fet_start: 80.0,
            invert_direction: false,
            foc_motor_r: 0.0135,
            foc_motor_flux_linkage: 0.0049,
        }
    }
}

// ─── NRF Config ─────────────────────────────────────────────────────

/// Radio pairing slots. With `retry_delay_us == 3750` and `retries == 13`
/// the address bytes are reinterpreted as acceleration-boost tuning; the
/// channel value 99 arms lock persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NrfConfig {
    pub retry_delay_us: u32,
    pub retries: u8,
    pub address: [u8; 3],
    pub channel: u8,
}

impl Default for NrfConfig {
    fn default() -> Self {
        Self {
            retry_delay_us: 250,
            retries: 3,
            address: [0, 0, 0],
            channel: 0,
        }
    }
}

// ─── Shutdown Mode ──────────────────────────────────────────────────

/// Inactivity shutdown selection (shared with the power button logic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownMode {
    #[serde(rename = "always_on")]
    AlwaysOn,
    #[serde(rename = "off_after_10s")]
    OffAfter10s,
    #[serde(rename = "off_after_1m")]
    OffAfter1m,
    #[serde(rename = "off_after_5m")]
    OffAfter5m,
    #[serde(rename = "off_after_10m")]
    OffAfter10m,
    #[serde(rename = "off_after_30m")]
    OffAfter30m,
    #[serde(rename = "off_after_1h")]
    OffAfter1h,
    #[serde(rename = "off_after_5h")]
    OffAfter5h,
}

impl ShutdownMode {
    /// Inactivity timeout in seconds; 0 = never.
    #[inline]
    pub const fn timeout_secs(&self) -> f32 {
        match self {
            Self::AlwaysOn => 0.0,
            Self::OffAfter10s => 10.0,
            Self::OffAfter1m => 60.0,
            Self::OffAfter5m => 60.0 * 5.0,
            Self::OffAfter10m => 60.0 * 10.0,
            Self::OffAfter30m => 60.0 * 30.0,
            Self::OffAfter1h => 60.0 * 60.0,
            Self::OffAfter5h => 60.0 * 60.0 * 5.0,
        }
    }
}

impl Default for ShutdownMode {
    fn default() -> Self {
        Self::AlwaysOn
    }
}

// ─── Top-Level App Config ───────────────────────────────────────────

/// Everything the balance controller is configured from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub shutdown_mode: ShutdownMode,
    pub balance: BalanceConfig,
    pub motor: MotorConfig,
    pub nrf: NrfConfig,
}

impl AppConfig {
    /// Parse from a TOML string.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }
}
