//! Named tuning parameters for the supervisor.

use micromath::F32Ext;

use crate::drivers::filter::{effective_filter_rates, FilterOrder};

/// Vane sample rate limits (Hz).
pub const MIN_VANE_RATE_HZ: f32 = 1.0;
pub const MAX_VANE_RATE_HZ: f32 = 10.0;

/// Where vehicle state comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SourceKind {
    /// CRSF telemetry streamed by the flight controller.
    Link,
    /// Scripted vertical profile flown by [`crate::sim::SimulatedVehicle`].
    Simulated,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SupervisorConfig {
    pub source: SourceKind,

    /// Wind vane sampling frequency (Hz), 1 to 10.
    pub vane_sample_rate_hz: f32,
    /// Thrust-vector low-pass cutoff (Hz). Floored at 0.05 Hz.
    pub vane_cutoff_hz: f32,
    pub filter_order: FilterOrder,
    /// Commanded roll (deg) below which the fine yaw-rate tracker is used.
    /// Zero disables fine tracking.
    pub vane_min_roll_deg: f32,
    pub vane_fine_gain: f32,
    /// Maximum fine-tracking yaw rate (deg per vane tick).
    pub vane_fine_rate: f32,

    /// Wind speed calibration: `speed = a * |tilt| + b * sqrt(|tilt|)`.
    pub wind_speed_a: f32,
    pub wind_speed_b: f32,
    /// Wind speed (m/s) above which a return is requested. Zero disables the alert.
    pub wind_speed_tolerance: f32,
    pub act_on_high_wind: bool,

    /// Usable battery energy (Wh). Zero disables the range prediction alerts.
    pub battery_capacity_wh: f32,
    /// Energy left in the pack after landing (% of capacity).
    pub battery_reserve_percent: f32,
    pub act_on_battery_range: bool,

    pub fan_on_output: u16,
    pub fan_off_output: u16,
}

impl SupervisorConfig {
    pub const DEFAULT: Self = Self {
        source: SourceKind::Link,
        vane_sample_rate_hz: 2.0,
        vane_cutoff_hz: 0.1,
        filter_order: FilterOrder::Second,
        vane_min_roll_deg: 1.5,
        vane_fine_gain: 1.0,
        vane_fine_rate: 1.0,
        wind_speed_a: 18.0,
        wind_speed_b: 2.0,
        wind_speed_tolerance: 12.0,
        act_on_high_wind: true,
        battery_capacity_wh: 0.0,
        battery_reserve_percent: 20.0,
        act_on_battery_range: true,
        fan_on_output: 100,
        fan_off_output: 0,
    };

    /// Replaces non-finite values with defaults, folds signed limits to
    /// magnitudes and clamps the vane rate into its supported range.
    pub fn sanitized(self) -> Self {
        let d = Self::DEFAULT;
        let finite_or = |v: f32, fallback: f32| if v.is_finite() { v } else { fallback };
        let vane_rate = finite_or(self.vane_sample_rate_hz, d.vane_sample_rate_hz)
            .clamp(MIN_VANE_RATE_HZ, MAX_VANE_RATE_HZ);
        if vane_rate != self.vane_sample_rate_hz {
            warn!("config: vane rate {} Hz clamped to {} Hz", self.vane_sample_rate_hz, vane_rate);
        }
        Self {
            vane_sample_rate_hz: vane_rate,
            vane_cutoff_hz: finite_or(self.vane_cutoff_hz, d.vane_cutoff_hz),
            vane_min_roll_deg: finite_or(self.vane_min_roll_deg, d.vane_min_roll_deg).abs(),
            vane_fine_gain: finite_or(self.vane_fine_gain, d.vane_fine_gain),
            vane_fine_rate: finite_or(self.vane_fine_rate, d.vane_fine_rate).abs(),
            wind_speed_a: finite_or(self.wind_speed_a, d.wind_speed_a),
            wind_speed_b: finite_or(self.wind_speed_b, d.wind_speed_b),
            wind_speed_tolerance: finite_or(self.wind_speed_tolerance, 0.0).max(0.0),
            battery_capacity_wh: finite_or(self.battery_capacity_wh, 0.0).max(0.0),
            battery_reserve_percent: finite_or(self.battery_reserve_percent, d.battery_reserve_percent),
            ..self
        }
    }

    /// Effective `(sample_rate_hz, cutoff_hz)` of the thrust-vector filters.
    pub fn filter_setup(&self) -> (f32, f32) {
        // NaN passes through the clamp and falls back to the base rate.
        let fs = self.vane_sample_rate_hz.clamp(MIN_VANE_RATE_HZ, MAX_VANE_RATE_HZ);
        effective_filter_rates(fs, self.vane_cutoff_hz)
    }

    /// Minimum spacing between wind vane updates, at the rate the filters run at.
    pub fn vane_period_ms(&self) -> u32 {
        (1000.0 / self.filter_setup().0) as u32
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
