//! Derived configuration.
//!
//! `configure()` turns the raw persisted numbers into the values the tick
//! actually consumes: per-tick step sizes, decoded sub-flags, clamped
//! gains. All legacy slot borrowing and fractional-part flag decoding is
//! centralized here; nothing downstream ever re-derives a config scalar.
//!
//! Out-of-range values are silently clamped to safe defaults — a bad
//! tuning file must never keep the board from riding.

use glide_common::config::AppConfig;

/// Default acceleration-boost shape; overridable through the radio-slot
/// side channel (see [`configure`]).
const BOOST_THRESHOLD: f32 = 8.0;
const BOOST_THRESHOLD2: f32 = 14.0;
const BOOST_INTENSITY: f32 = 0.5;

/// Cumulative erpm of backward travel tolerated before reverse-stop tilts.
const REVERSE_TOLERANCE: f32 = 50_000.0;

/// Everything `configure()` computes. Immutable per run; rebuilt whenever
/// the rider writes a new configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    // ── Timing ──
    pub hertz: f32,
    /// Nominal loop period [µs].
    pub loop_time_us: u64,
    /// Off-delay handed to the motor with every driven current [s].
    pub motor_timeout_s: f32,
    /// EMA coefficient for the loop-overshoot filter; 0 disables pacing
    /// compensation.
    pub loop_overshoot_alpha: f32,

    // ── Setpoint step sizes [deg/tick] ──
    pub startup_step: f32,
    pub tiltback_duty_step: f32,
    pub tiltback_hv_step: f32,
    pub tiltback_lv_step: f32,
    pub tiltback_return_step: f32,
    pub torquetilt_on_step: f32,
    pub torquetilt_off_step: f32,
    pub turntilt_step: f32,
    pub noseangling_step: f32,
    pub reverse_stop_step: f32,

    // ── Start behavior ──
    /// Engage clicks remaining at reset; 0 = stealth start.
    pub start_clicks_max: u32,
    /// Click amplitude [A].
    pub click_current: f32,
    pub use_reverse_stop: bool,
    pub use_soft_start: bool,
    pub reverse_tolerance: f32,
    pub center_jerk_duration_ms: u32,
    pub center_jerk_strength: f32,

    // ── Faults ──
    pub allow_high_speed_full_switch_faults: bool,

    // ── Torque-tilt / ATR ──
    pub tt_strength_uphill: f32,
    pub tt_pid_intensity: f32,
    pub integral_tt_impact_uphill: f32,
    pub integral_tt_impact_downhill: f32,
    /// erpm gained per tick per amp — expected acceleration slope.
    pub accel_factor: f32,
    /// Stiffer second slope above 25 A.
    pub accel_factor2: f32,
    /// Current low-pass cutoff [Hz], clamped.
    pub torquetilt_filter_hz: f32,
    /// Brake-lift divisor derived from the lingering setting.
    pub ttt_brake_ratio: f32,

    // ── Turn-tilt ──
    pub yaw_aggregate_target: f32,
    pub turntilt_boost_per_erpm: f32,
    pub cutback_enable: bool,
    pub cutback_minspeed: f32,
    pub roll_aggregate_threshold: f32,

    // ── PID ──
    pub kp_acc: f32,
    pub ki_acc: f32,
    pub kd_acc: f32,
    /// PT1 coefficient for the D term.
    pub d_pt1_k: f32,
    pub center_boost_angle: f32,
    pub center_boost_kp_adder: f32,
    pub accel_boost_threshold: f32,
    pub accel_boost_threshold2: f32,
    pub accel_boost_intensity: f32,
    pub max_brake_amps: f32,
    pub max_derivative: f32,

    // ── Nose angling ──
    /// Variable tilt slope [deg/erpm].
    pub tiltback_variable: f32,
    /// erpm at which the variable tilt saturates.
    pub tiltback_variable_max_erpm: f32,

    // ── Motor ──
    /// -1 when the motor direction is inverted, else 1.
    pub erpm_sign: f32,
    pub mc_current_max: f32,
    pub mc_current_min: f32,
    /// FET temperature at which thermal tiltback arms [°C].
    pub mc_max_temp_fet: f32,

    // ── Misc ──
    pub inactivity_timeout_s: f32,
    /// Lock flag restored from persistence.
    pub initially_locked: bool,
    /// Channel 99 arms lock persistence.
    pub nrf_channel: u8,
    pub brake_timeout_s: f32,
}

/// Decode and clamp the raw configuration.
///
/// Pure: calling it twice on the same input yields identical results.
pub fn configure(app: &AppConfig) -> Derived {
    let bal = &app.balance;
    let motor = &app.motor;
    let hz = bal.hertz;

    // Times 20 for a nice long grace period.
    let motor_timeout_s = (1000.0 / hz) / 1000.0 * 20.0;

    // Start clicks: amplitude rides in the fractional amps of the brake
    // current setting.
    let mut start_clicks_max = 2u32;
    let click_current = ((bal.brake_current - bal.brake_current.trunc()) * 100.0).min(30.0);

    // startup_speed fractional part:
    //   x.0  click start, no reverse stop
    //   x.1  click start + reverse stop
    //   x.2  stealth start
    //   x.3  stealth start + reverse stop
    let mut use_reverse_stop = false;
    let ss_rest = bal.startup_speed - bal.startup_speed.trunc();
    if ss_rest > 0.09 && ss_rest < 0.11 {
        use_reverse_stop = true;
    } else if ss_rest > 0.19 && ss_rest < 0.21 {
        start_clicks_max = 0;
    } else if ss_rest > 0.29 && ss_rest < 0.31 {
        start_clicks_max = 0;
        use_reverse_stop = true;
    }

    let use_soft_start = bal.startup_speed < 10.0;

    let mut center_jerk_duration_ms = bal.roll_steer_erpm_kp as u32;
    let mut center_jerk_strength = bal.yaw_current_clamp;
    if !(-50.0..=50.0).contains(&center_jerk_strength) {
        center_jerk_strength = 0.0;
    }
    if center_jerk_duration_ms > 100 {
        center_jerk_duration_ms = 0;
    }

    // Full-switch delay ending in 1 disables high-speed switch faults.
    let allow_high_speed_full_switch_faults = bal.fault_delay_switch_full % 10 != 1;

    // Outlandish PIDs can break the motor; hard caps.
    let kp_acc = bal.kp.min(10.0);
    let ki_acc = bal.ki.min(0.01);
    let kd_acc = bal.kd.min(1500.0);

    // Intensity 1 doubles the PIDs at 6 degrees of torque tilt.
    let tt_pid_intensity = bal.booster_current.clamp(0.0, 1.5);

    let mut tt_strength_uphill = bal.torquetilt_strength * 10.0;
    if tt_strength_uphill > 2.5 {
        tt_strength_uphill = 1.5;
    }
    if tt_strength_uphill < 0.0 {
        tt_strength_uphill = 0.0;
    }

    let integral_tt_impact_downhill = (1.0 - bal.kd_biquad_lowpass / 100.0).clamp(0.0, 1.0);
    let integral_tt_impact_uphill = (1.0 - bal.kd_biquad_highpass / 100.0).clamp(0.0, 1.0);

    let loop_overshoot_alpha = if bal.loop_time_filter > 0.0 {
        let w = 2.0 * std::f32::consts::PI * (1.0 / hz) * bal.loop_time_filter;
        w / (w + 1.0)
    } else {
        0.0
    };

    // D-term PT1 cutoff: honored in [1, 30] Hz, fallback 10 Hz.
    let mut dt_filter_freq = 10.0;
    if bal.kd_pt1_lowpass_frequency >= 1.0 {
        dt_filter_freq = bal.kd_pt1_lowpass_frequency;
    }
    if dt_filter_freq > 30.0 {
        dt_filter_freq = 10.0;
    }
    let dt = 1.0 / hz;
    let rc = 1.0 / (2.0 * std::f32::consts::PI * dt_filter_freq);
    let d_pt1_k = dt / (rc + dt);

    let mut torquetilt_filter_hz = bal.torquetilt_filter;
    if torquetilt_filter_hz == 0.0 {
        torquetilt_filter_hz = 5.0;
    }
    torquetilt_filter_hz = torquetilt_filter_hz.clamp(0.01, 30.0);

    let mut center_boost_angle = bal.booster_angle;
    let mut center_boost_kp_adder = (bal.booster_ramp / 3.5 * kp_acc) - kp_acc;
    if center_boost_kp_adder < 0.0 {
        center_boost_kp_adder = 1.0;
    }
    if center_boost_angle > 3.0 {
        center_boost_angle = 1.0;
    }
    center_boost_kp_adder = center_boost_kp_adder.min(7.0);

    // Acceleration boost, customizable through the radio pairing slots.
    let mut accel_boost_threshold = BOOST_THRESHOLD;
    let mut accel_boost_threshold2 = BOOST_THRESHOLD2;
    let mut accel_boost_intensity = BOOST_INTENSITY;
    if app.nrf.retry_delay_us == 3750 && app.nrf.retries == 13 {
        accel_boost_threshold = app.nrf.address[0] as f32;
        accel_boost_threshold2 = app.nrf.address[1] as f32;
        accel_boost_intensity = app.nrf.address[2] as f32 / 10.0;
        // Turn the booster off if bogus values are attempted.
        if !(4.0..=20.0).contains(&accel_boost_threshold) {
            accel_boost_intensity = 0.0;
        } else if accel_boost_threshold2 < accel_boost_threshold || accel_boost_threshold2 > 20.0 {
            accel_boost_intensity = 0.0;
        } else if !(0.0..=1.0).contains(&accel_boost_intensity) {
            accel_boost_intensity = 0.0;
        }
    }

    // Integer part: max brake amps for P+D; fraction ×100: max derivative.
    let mut max_brake_amps = bal.roll_steer_kp;
    if max_brake_amps < 10.0 {
        max_brake_amps = motor.l_current_max / 2.0;
    }
    let mut max_derivative = 100.0 * (max_brake_amps - max_brake_amps.trunc());
    if max_derivative < 10.0 {
        max_derivative = motor.l_current_max / 2.0;
    }

    let ttt_brake_ratio = (21.0 - bal.kd_pt1_highpass_frequency.clamp(1.0, 20.0)) / 4.0;

    // Variable nose angle: setting is per 1000 erpm.
    let tiltback_variable = bal.tiltback_variable / 1000.0;
    let tiltback_variable_max_erpm = if tiltback_variable > 0.0 {
        (bal.tiltback_variable_max / tiltback_variable).abs()
    } else {
        100_000.0
    };

    Derived {
        hertz: hz,
        loop_time_us: ((1000.0 / hz) * 1000.0) as u64,
        motor_timeout_s,
        loop_overshoot_alpha,
        startup_step: bal.startup_speed / hz,
        tiltback_duty_step: bal.tiltback_duty_speed / hz,
        tiltback_hv_step: bal.tiltback_hv_speed / hz,
        tiltback_lv_step: bal.tiltback_lv_speed / hz,
        tiltback_return_step: bal.tiltback_return_speed / hz,
        torquetilt_on_step: bal.torquetilt_on_speed / hz,
        torquetilt_off_step: bal.torquetilt_off_speed / hz,
        turntilt_step: bal.turntilt_speed / hz,
        noseangling_step: bal.noseangling_speed / hz,
        reverse_stop_step: 100.0 / hz,
        start_clicks_max,
        click_current,
        use_reverse_stop,
        use_soft_start,
        reverse_tolerance: REVERSE_TOLERANCE,
        center_jerk_duration_ms,
        center_jerk_strength,
        allow_high_speed_full_switch_faults,
        tt_strength_uphill,
        tt_pid_intensity,
        integral_tt_impact_uphill,
        integral_tt_impact_downhill,
        accel_factor: bal.yaw_kd,
        accel_factor2: bal.yaw_kd * 1.3,
        torquetilt_filter_hz,
        ttt_brake_ratio,
        yaw_aggregate_target: bal.yaw_ki,
        turntilt_boost_per_erpm: bal.turntilt_erpm_boost as f32
            / 100.0
            / bal.turntilt_erpm_boost_end,
        cutback_enable: true,
        cutback_minspeed: 2000.0,
        roll_aggregate_threshold: 5000.0,
        kp_acc,
        ki_acc,
        kd_acc,
        d_pt1_k,
        center_boost_angle,
        center_boost_kp_adder,
        accel_boost_threshold,
        accel_boost_threshold2,
        accel_boost_intensity,
        max_brake_amps,
        max_derivative,
        tiltback_variable,
        tiltback_variable_max_erpm,
        erpm_sign: if motor.invert_direction { -1.0 } else { 1.0 },
        mc_current_max: motor.l_current_max,
        mc_current_min: motor.l_current_min,
        mc_max_temp_fet: motor.l_temp_fet_start - 2.0,
        inactivity_timeout_s: app.shutdown_mode.timeout_secs(),
        initially_locked: bal.multi_esc,
        nrf_channel: app.nrf.channel,
        brake_timeout_s: bal.brake_timeout,
    }
}
