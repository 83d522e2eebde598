//! Scripted vertical profile for bench runs and scenario tests.
//!
//! The vehicle waits on the ground, climbs to a ceiling, descends and lands,
//! all in a steady wind. While airborne it leans into the wind by the tilt
//! that the vane calibration maps back to the configured wind speed.

use micromath::F32Ext;

use crate::host::VehicleSource;
use crate::state::{FlightMode, VehicleSnapshot};

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Profile {
    pub takeoff_at_s: f32,
    pub climb_rate: f32,
    pub ceiling_m: f32,
    /// Descent rate (positive, m/s).
    pub descent_rate: f32,
    pub heading_deg: f32,
    pub wind_from_deg: f32,
    pub wind_speed: f32,
    /// Vane calibration used to derive the tilt.
    pub speed_a: f32,
    pub speed_b: f32,
    pub battery_voltage: f32,
    pub battery_current: f32,
}

impl Profile {
    pub const DEFAULT: Self = Self {
        takeoff_at_s: 5.0,
        climb_rate: 3.0,
        ceiling_m: 120.0,
        descent_rate: 3.0,
        heading_deg: 0.0,
        wind_from_deg: 225.0,
        wind_speed: 6.0,
        speed_a: 18.0,
        speed_b: 2.0,
        battery_voltage: 15.8,
        battery_current: 14.0,
    };

    fn climb_s(&self) -> f32 {
        self.ceiling_m / self.climb_rate.max(0.1)
    }

    fn descent_s(&self) -> f32 {
        self.ceiling_m / self.descent_rate.max(0.1)
    }

    /// Seconds from boot until touchdown.
    pub fn landing_at_s(&self) -> f32 {
        self.takeoff_at_s + self.climb_s() + self.descent_s()
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Waiting,
    Climb,
    Descent,
    Landed,
}

/// Tilt angle (rad) whose `tan` the calibration `a·t + b·sqrt(t)` maps to `speed`.
pub fn tilt_for_wind(speed: f32, a: f32, b: f32) -> f32 {
    if speed <= 0.0 {
        return 0.0;
    }
    // Solve a·s² + b·s = speed for s = sqrt(tan θ).
    let s = if a.abs() > f32::EPSILON {
        (-b + (b * b + 4.0 * a * speed).sqrt()) / (2.0 * a)
    } else if b > 0.0 {
        speed / b
    } else {
        0.0
    };
    (s * s).atan()
}

pub struct SimulatedVehicle {
    profile: Profile,
    tilt_rad: f32,
}

impl SimulatedVehicle {
    pub fn new(profile: Profile) -> Self {
        let tilt_rad = tilt_for_wind(profile.wind_speed, profile.speed_a, profile.speed_b);
        Self { profile, tilt_rad }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn phase(&self, now_us: u64) -> Phase {
        let t = now_us as f32 / 1e6;
        let p = &self.profile;
        if t < p.takeoff_at_s {
            Phase::Waiting
        } else if t < p.takeoff_at_s + p.climb_s() {
            Phase::Climb
        } else if t < p.landing_at_s() {
            Phase::Descent
        } else {
            Phase::Landed
        }
    }

    fn altitude_m(&self, t: f32, phase: Phase) -> f32 {
        let p = &self.profile;
        match phase {
            Phase::Waiting | Phase::Landed => 0.0,
            Phase::Climb => (t - p.takeoff_at_s) * p.climb_rate,
            Phase::Descent => {
                let since_top = t - p.takeoff_at_s - p.climb_s();
                (p.ceiling_m - since_top * p.descent_rate).max(0.0)
            }
        }
    }
}

impl VehicleSource for SimulatedVehicle {
    fn snapshot(&mut self, now_us: u64) -> VehicleSnapshot {
        let p = self.profile;
        let phase = self.phase(now_us);
        let airborne = matches!(phase, Phase::Climb | Phase::Descent);
        let t = now_us as f32 / 1e6;

        let mut snap = VehicleSnapshot::GROUNDED;
        snap.battery_voltage = p.battery_voltage;
        snap.battery_current = Some(0.0);
        snap.target_yaw_deg = p.heading_deg;
        snap.initial_armed_bearing_deg = p.heading_deg;
        snap.flight_mode = FlightMode::Stabilize;
        if !airborne {
            return snap;
        }

        let (st, ct) = (self.tilt_rad.sin(), self.tilt_rad.cos());
        let wind_from = p.wind_from_deg.to_radians();
        // Leaning into the wind: thrust points toward where the wind comes from.
        snap.body_z_ned = [-st * wind_from.cos(), -st * wind_from.sin(), ct];
        // Roll is the part of the lean across the heading.
        let across = (p.wind_from_deg - p.heading_deg).to_radians().sin();
        snap.target_roll_deg = self.tilt_rad.to_degrees() * across;

        snap.velocity_neu = match phase {
            Phase::Climb => [0.0, 0.0, p.climb_rate],
            _ => [0.0, 0.0, -p.descent_rate],
        };
        snap.altitude_m = self.altitude_m(t, phase);
        snap.position_ok = true;
        snap.landed = false;
        snap.battery_current = Some(p.battery_current);
        snap.flight_mode = if phase == Phase::Climb {
            FlightMode::Auto
        } else {
            FlightMode::Land
        };
        snap
    }
}
