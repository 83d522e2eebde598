//! Flight-regime classification gating wind publication.

use micromath::F32Ext;

use crate::state::VehicleSnapshot;

/// Cross-track speed (m/s) below which the vehicle counts as holding its track.
pub const MAX_CROSS_TRACK_SPEED: f32 = 1.0;
/// Minimum perceivable wind (m/s) while climbing.
pub const ASCENT_MIN_WIND: f32 = 1.0;
/// Minimum perceivable wind (m/s) while descending.
pub const DESCENT_MIN_WIND: f32 = 3.0;
pub const ASCENT_MIN_ALTITUDE_M: f32 = 5.0;
pub const DESCENT_MIN_ALTITUDE_M: f32 = 10.0;
/// Allowed excess of total over cross-track ground speed (m/s).
const GROUND_SPEED_MARGIN: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Regime {
    SteadyAscent,
    SteadyDescent,
    Unsteady,
    Grounded,
}

/// What the wind vane writes to the shared store this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Publication {
    /// The fresh `(direction, speed)` estimate.
    Estimate,
    /// Commanded heading with zero speed.
    Neutral,
    /// Previously published direction with zero speed.
    HoldDirection,
    /// Leave the store untouched.
    Skip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Decision {
    pub regime: Regime,
    pub publication: Publication,
}

/// Ground-speed component perpendicular to the commanded heading, and total
/// horizontal ground speed.
pub fn track_speeds(velocity_neu: [f32; 3], target_yaw_deg: f32) -> (f32, f32) {
    let yaw = target_yaw_deg.to_radians();
    let [vx, vy, _] = velocity_neu;
    let cross = vy * yaw.cos() - vx * yaw.sin();
    let total = (vx * vx + vy * vy).sqrt();
    (cross, total)
}

/// Pure airborne classification. `wind_speed` is the vane's fresh estimate.
pub fn classify(snap: &VehicleSnapshot, wind_speed: f32) -> Decision {
    if snap.is_grounded() {
        return Decision {
            regime: Regime::Grounded,
            publication: Publication::Neutral,
        };
    }

    let (cross, total) = track_speeds(snap.velocity_neu, snap.target_yaw_deg);
    let climb = snap.velocity_neu[2];
    let holding_track = cross.abs() < MAX_CROSS_TRACK_SPEED;
    let drift_ok = total < cross.abs() + GROUND_SPEED_MARGIN;

    if holding_track && wind_speed > ASCENT_MIN_WIND && climb >= 0.0 {
        let publication = if snap.altitude_m > ASCENT_MIN_ALTITUDE_M && drift_ok {
            Publication::Estimate
        } else {
            Publication::Neutral
        };
        Decision {
            regime: Regime::SteadyAscent,
            publication,
        }
    } else if holding_track && wind_speed > DESCENT_MIN_WIND && climb < 0.0 {
        let publication = if snap.altitude_m > DESCENT_MIN_ALTITUDE_M && drift_ok {
            Publication::Estimate
        } else {
            Publication::HoldDirection
        };
        Decision {
            regime: Regime::SteadyDescent,
            publication,
        }
    } else {
        Decision {
            regime: Regime::Unsteady,
            publication: Publication::Skip,
        }
    }
}

/// Wraps [`classify`] and remembers the last regime so changes get logged once.
pub struct RegimeClassifier {
    last: Regime,
}

impl RegimeClassifier {
    pub const fn new() -> Self {
        Self {
            last: Regime::Grounded,
        }
    }

    pub fn update(&mut self, snap: &VehicleSnapshot, wind_speed: f32) -> Decision {
        let decision = classify(snap, wind_speed);
        self.enter(decision.regime);
        decision
    }

    /// Forces the grounded regime without looking at a snapshot.
    pub fn ground(&mut self) {
        self.enter(Regime::Grounded);
    }

    pub fn regime(&self) -> Regime {
        self.last
    }

    fn enter(&mut self, regime: Regime) {
        if regime != self.last {
            info!("regime: {} -> {}", self.last, regime);
            self.last = regime;
        }
    }
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new()
    }
}
