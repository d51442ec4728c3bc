pub mod harness;

mod atr_climb;
mod centering;
mod duty_tiltback;
mod reverse_stop;
mod saturation;
mod switch_faults;
