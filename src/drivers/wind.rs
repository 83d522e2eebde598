//! Wind vane: infers wind direction and speed from how far, and which way,
//! the vehicle leans to hold position.
//!
//! Two direction strategies alternate on commanded roll. With roll outside the
//! dead-zone the vehicle is side-slipping, so the direction is re-acquired from
//! the thrust-vector tilt. Inside the dead-zone the nose is already roughly into
//! the wind and the last published direction is nudged by a smoothed yaw-rate
//! correction instead. The switch has no dwell time.

use core::f32::consts::TAU;

use micromath::F32Ext;

use crate::config::SupervisorConfig;
use crate::drivers::filter::ThrustVectorFilter;

/// Thrust-vector vertical components below this are treated as degenerate.
pub const MIN_VERTICAL_THRUST: f32 = 1e-3;

const YAW_RATE_SMOOTHING: f32 = 0.98;
/// Degrees of commanded roll per unit of fine yaw-rate demand.
const ROLL_PER_YAW_RATE_DEG: f32 = 5.0;

/// Wraps centidegrees into [0, 36000).
pub fn wrap_360_cd(angle_cd: f32) -> f32 {
    if !angle_cd.is_finite() {
        return 0.0;
    }
    let mut res = angle_cd % 36000.0;
    if res < 0.0 {
        res += 36000.0;
    }
    if res >= 36000.0 {
        res -= 36000.0;
    }
    res
}

/// Wraps degrees into [0, 360).
pub fn wrap_360(angle_deg: f32) -> f32 {
    if !angle_deg.is_finite() {
        return 0.0;
    }
    let mut res = angle_deg % 360.0;
    if res < 0.0 {
        res += 360.0;
    }
    if res >= 360.0 {
        res -= 360.0;
    }
    res
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Strategy {
    /// Last published direction plus the smoothed yaw-rate correction.
    FineTracking,
    /// Direction taken straight from the thrust-vector tilt.
    Reacquisition,
}

/// Raw (unpublished) output of one vane update.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VaneSample {
    pub direction_deg: f32,
    pub speed: f32,
    pub strategy: Strategy,
}

pub struct WindVane {
    filter: ThrustVectorFilter,
    yaw_rate_memory: f32,
    min_roll_deg: f32,
    fine_gain: f32,
    fine_rate: f32,
    speed_a: f32,
    speed_b: f32,
}

impl WindVane {
    pub fn new(config: &SupervisorConfig) -> Self {
        let filter = ThrustVectorFilter::configure(
            config.filter_order,
            config.vane_sample_rate_hz,
            config.vane_cutoff_hz,
        );
        Self {
            filter,
            yaw_rate_memory: 0.0,
            min_roll_deg: config.vane_min_roll_deg.abs(),
            fine_gain: config.vane_fine_gain,
            fine_rate: config.vane_fine_rate.abs(),
            speed_a: config.wind_speed_a,
            speed_b: config.wind_speed_b,
        }
    }

    /// Runs one vane update.
    ///
    /// `thrust` is the unfiltered thrust vector (NED), `published_direction_deg`
    /// the direction currently held in the shared store. Returns `None` when the
    /// filtered vertical thrust is degenerate or an input is not finite; the
    /// yaw-rate memory is left untouched in that case.
    pub fn update(
        &mut self,
        thrust: [f32; 3],
        target_roll_deg: f32,
        published_direction_deg: f32,
    ) -> Option<VaneSample> {
        let [x, y, z] = self.filter.apply(thrust);

        if !(x.is_finite() && y.is_finite() && z.is_finite() && target_roll_deg.is_finite()) {
            debug!("vane: non-finite input, skipping");
            return None;
        }
        if z.abs() < MIN_VERTICAL_THRUST {
            debug!("vane: vertical thrust {} too small, skipping", z);
            return None;
        }

        let tilt_direction_deg = (y.atan2(x) % TAU).to_degrees();
        let geometric_cd = wrap_360_cd(tilt_direction_deg * 100.0);

        let in_dead_zone = target_roll_deg.abs() < self.min_roll_deg;
        if in_dead_zone {
            self.yaw_rate_memory = 0.0;
        }
        let yaw_rate = (target_roll_deg / ROLL_PER_YAW_RATE_DEG * self.fine_gain)
            .clamp(-self.fine_rate, self.fine_rate);
        self.yaw_rate_memory =
            YAW_RATE_SMOOTHING * self.yaw_rate_memory + (1.0 - YAW_RATE_SMOOTHING) * yaw_rate;

        let (direction_cd, strategy) = if in_dead_zone {
            let tracked = (published_direction_deg + self.yaw_rate_memory) * 100.0;
            (wrap_360_cd(tracked), Strategy::FineTracking)
        } else {
            self.yaw_rate_memory = 0.0;
            (geometric_cd, Strategy::Reacquisition)
        };

        let horizontal = (x * x + y * y).sqrt();
        let tilt = (horizontal / z).abs();
        let speed = (self.speed_a * tilt + self.speed_b * tilt.sqrt()).max(0.0);

        Some(VaneSample {
            direction_deg: wrap_360(direction_cd / 100.0),
            speed,
            strategy,
        })
    }

    /// Drops the fine-tracking correction (flight is not steady).
    pub fn clear_yaw_rate_memory(&mut self) {
        self.yaw_rate_memory = 0.0;
    }

    /// Grounded reset: filter state and yaw-rate memory.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.yaw_rate_memory = 0.0;
    }

    pub fn yaw_rate_memory(&self) -> f32 {
        self.yaw_rate_memory
    }
}
