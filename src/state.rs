//! Shared state types.
//!
//! All types are `Copy`: the supervisor is the only writer and readers (the
//! report task, wind-compensation consumers) copy the last published value
//! out of [`SharedEstimates`] without holding anything across a tick.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::drivers::wind::wrap_360;

// ── Vehicle ───────────────────────────────────────────────────────────────────

/// Flight modes the supervisor can observe or request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlightMode {
    Stabilize,
    AltHold,
    Loiter,
    PosHold,
    Auto,
    Guided,
    Rtl,
    Land,
    Unknown,
}

impl FlightMode {
    /// Modes in which the autopilot, not the pilot, is flying the vehicle.
    pub fn is_autopilot(self) -> bool {
        matches!(self, Self::Auto | Self::Guided | Self::Rtl | Self::Land)
    }

    /// Short mode name used in CRSF flight-mode telemetry.
    pub fn crsf_name(self) -> Option<&'static str> {
        match self {
            Self::Stabilize => Some("STAB"),
            Self::AltHold => Some("ALTH"),
            Self::Loiter => Some("LOIT"),
            Self::PosHold => Some("POSH"),
            Self::Auto => Some("AUTO"),
            Self::Guided => Some("GUID"),
            Self::Rtl => Some("RTL"),
            Self::Land => Some("LAND"),
            Self::Unknown => None,
        }
    }

    pub fn from_crsf_name(name: &str) -> Self {
        match name {
            "STAB" => Self::Stabilize,
            "ALTH" => Self::AltHold,
            "LOIT" => Self::Loiter,
            "POSH" => Self::PosHold,
            "AUTO" => Self::Auto,
            "GUID" => Self::Guided,
            "RTL" => Self::Rtl,
            "LAND" => Self::Land,
            _ => Self::Unknown,
        }
    }
}

/// One tick's worth of vehicle state supplied by the host flight stack.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VehicleSnapshot {
    /// Third column of the body→NED rotation (body down axis in world frame).
    pub body_z_ned: [f32; 3],
    /// North, east, up (m/s).
    pub velocity_neu: [f32; 3],
    /// Altitude above home (m).
    pub altitude_m: f32,
    pub position_ok: bool,
    pub landed: bool,
    pub battery_voltage: f32,
    /// `None` when the battery monitor has no current sensor reading.
    pub battery_current: Option<f32>,
    pub target_roll_deg: f32,
    pub target_yaw_deg: f32,
    pub initial_armed_bearing_deg: f32,
    pub flight_mode: FlightMode,
}

impl VehicleSnapshot {
    pub const GROUNDED: Self = Self {
        body_z_ned: [0.0, 0.0, 1.0],
        velocity_neu: [0.0; 3],
        altitude_m: 0.0,
        position_ok: false,
        landed: true,
        battery_voltage: 0.0,
        battery_current: None,
        target_roll_deg: 0.0,
        target_yaw_deg: 0.0,
        initial_armed_bearing_deg: 0.0,
        flight_mode: FlightMode::Unknown,
    };

    /// The estimators only run while flying with a trusted position.
    pub fn is_grounded(&self) -> bool {
        self.landed || !self.position_ok
    }

    /// Thrust vector (negated body down axis) in NED.
    pub fn thrust_vector(&self) -> [f32; 3] {
        [-self.body_z_ned[0], -self.body_z_ned[1], -self.body_z_ned[2]]
    }
}

impl Default for VehicleSnapshot {
    fn default() -> Self {
        Self::GROUNDED
    }
}

// ── Published estimates ───────────────────────────────────────────────────────

/// Published wind estimate. Direction is where the wind blows from, wrapped
/// into [0, 360) degrees; speed is never negative.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WindEstimate {
    direction_deg: f32,
    speed: f32,
}

impl WindEstimate {
    pub const CALM: Self = Self {
        direction_deg: 0.0,
        speed: 0.0,
    };

    pub fn new(direction_deg: f32, speed: f32) -> Self {
        Self {
            direction_deg: wrap_360(direction_deg),
            // Also maps NaN to zero.
            speed: if speed > 0.0 { speed } else { 0.0 },
        }
    }

    pub fn direction_deg(&self) -> f32 {
        self.direction_deg
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }
}

impl Default for WindEstimate {
    fn default() -> Self {
        Self::CALM
    }
}

/// Last energy-to-home prediction.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnergySnapshot {
    /// Energy drawn since boot (Wh).
    pub consumed_wh: f32,
    /// Wind speed integrated over ascent time (m).
    pub wind_memory: f32,
    /// Predicted descent cost (Wh per metre of altitude).
    pub cost_per_m: f32,
    /// Predicted energy needed to descend home (Wh).
    pub to_home_wh: f32,
    /// Fraction of the battery budget used, `None` when no capacity is configured.
    pub range_used: Option<f32>,
}

impl EnergySnapshot {
    pub const ZERO: Self = Self {
        consumed_wh: 0.0,
        wind_memory: 0.0,
        cost_per_m: 0.0,
        to_home_wh: 0.0,
        range_used: None,
    };
}

/// Single-writer, multi-reader store for the published estimates.
pub struct SharedEstimates {
    wind: Mutex<CriticalSectionRawMutex, Cell<WindEstimate>>,
    energy: Mutex<CriticalSectionRawMutex, Cell<EnergySnapshot>>,
}

impl SharedEstimates {
    pub const fn new() -> Self {
        Self {
            wind: Mutex::new(Cell::new(WindEstimate::CALM)),
            energy: Mutex::new(Cell::new(EnergySnapshot::ZERO)),
        }
    }

    pub fn wind(&self) -> WindEstimate {
        self.wind.lock(|c| c.get())
    }

    pub fn energy(&self) -> EnergySnapshot {
        self.energy.lock(|c| c.get())
    }

    pub(crate) fn publish_wind(&self, estimate: WindEstimate) {
        self.wind.lock(|c| c.set(estimate));
    }

    pub(crate) fn publish_energy(&self, snapshot: EnergySnapshot) {
        self.energy.lock(|c| c.set(snapshot));
    }
}

impl Default for SharedEstimates {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wind_estimate_enforces_invariants() {
        let w = WindEstimate::new(-90.0, -3.0);
        assert_eq!(w.direction_deg(), 270.0);
        assert_eq!(w.speed(), 0.0);

        let w = WindEstimate::new(720.5, f32::NAN);
        assert!((w.direction_deg() - 0.5).abs() < 1e-4);
        assert_eq!(w.speed(), 0.0);
    }

    #[test]
    fn store_returns_last_published() {
        let store = SharedEstimates::new();
        assert_eq!(store.wind(), WindEstimate::CALM);
        store.publish_wind(WindEstimate::new(45.0, 6.0));
        store.publish_wind(WindEstimate::new(50.0, 7.0));
        assert_eq!(store.wind(), WindEstimate::new(50.0, 7.0));
    }

    #[test]
    fn grounded_snapshot_thrust_points_up() {
        let snap = VehicleSnapshot::GROUNDED;
        assert!(snap.is_grounded());
        assert_eq!(snap.thrust_vector(), [0.0, 0.0, -1.0]);
    }
}
