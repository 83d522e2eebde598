//! Energy-to-home prediction.
//!
//! Integrates the energy drawn from the pack and predicts what the descent
//! home will cost. Descent cost per metre grows with the wind the vehicle
//! fought on the way up (the integral of wind speed over ascent time).

use crate::config::SupervisorConfig;
use crate::state::{EnergySnapshot, VehicleSnapshot};

pub const ENERGY_UPDATE_INTERVAL_MS: u32 = 100;

/// Descent cost model: `max(COST_FLOOR, COST_PER_WIND_METRE * memory + COST_BASE)` Wh/m.
const COST_PER_WIND_METRE: f32 = 1.5e-6;
const COST_BASE: f32 = 0.007;
const COST_FLOOR: f32 = 0.01;
/// Fixed margin added to the range-used fraction.
const SAFETY_MARGIN: f32 = 0.05;
const MS_PER_HOUR: f32 = 3_600_000.0;

pub struct EnergyPredictor {
    consumed_wh: f32,
    wind_memory: f32,
    last_update_ms: u32,
    capacity_wh: f32,
    reserve_percent: f32,
}

impl EnergyPredictor {
    pub fn new(config: &SupervisorConfig, now_ms: u32) -> Self {
        Self {
            consumed_wh: 0.0,
            wind_memory: 0.0,
            last_update_ms: now_ms,
            capacity_wh: config.battery_capacity_wh,
            reserve_percent: config.battery_reserve_percent,
        }
    }

    /// Airborne update. Returns a fresh snapshot at most every
    /// [`ENERGY_UPDATE_INTERVAL_MS`].
    pub fn update(
        &mut self,
        now_ms: u32,
        snap: &VehicleSnapshot,
        wind_speed: f32,
    ) -> Option<EnergySnapshot> {
        let dt_ms = now_ms.wrapping_sub(self.last_update_ms);
        if dt_ms < ENERGY_UPDATE_INTERVAL_MS {
            return None;
        }
        self.last_update_ms = now_ms;
        let dt_ms = dt_ms as f32;

        if let Some(current) = snap.battery_current {
            let power_w = snap.battery_voltage * current;
            if power_w.is_finite() {
                self.consumed_wh += power_w * dt_ms / MS_PER_HOUR;
            }
        }

        if snap.velocity_neu[2] > 0.0 && wind_speed.is_finite() {
            self.wind_memory += wind_speed * dt_ms / 1000.0;
        }

        let snapshot = self.snapshot(snap.altitude_m);
        debug!(
            "energy: used {} Wh, wind memory {}, home {} Wh",
            snapshot.consumed_wh, snapshot.wind_memory, snapshot.to_home_wh
        );
        Some(snapshot)
    }

    /// Grounded path: drops the wind memory only. Consumed energy is kept.
    pub fn on_ground(&mut self, now_ms: u32) {
        self.wind_memory = 0.0;
        self.last_update_ms = now_ms;
    }

    /// Prediction for the current state at `altitude_m` above home.
    pub fn snapshot(&self, altitude_m: f32) -> EnergySnapshot {
        let cost_per_m = (COST_PER_WIND_METRE * self.wind_memory + COST_BASE).max(COST_FLOOR);
        let to_home_wh = cost_per_m * altitude_m.max(0.0);
        let range_used = if self.capacity_wh > 0.0 {
            Some(
                (self.consumed_wh + to_home_wh) / self.capacity_wh
                    + self.reserve_percent / 100.0
                    + SAFETY_MARGIN,
            )
        } else {
            None
        };

        EnergySnapshot {
            consumed_wh: self.consumed_wh,
            wind_memory: self.wind_memory,
            cost_per_m,
            to_home_wh,
            range_used,
        }
    }

    pub fn consumed_wh(&self) -> f32 {
        self.consumed_wh
    }

    pub fn wind_memory(&self) -> f32 {
        self.wind_memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FlightMode;

    fn config(capacity_wh: f32, reserve_percent: f32) -> SupervisorConfig {
        let mut config = SupervisorConfig::DEFAULT;
        config.battery_capacity_wh = capacity_wh;
        config.battery_reserve_percent = reserve_percent;
        config
    }

    fn climbing(altitude_m: f32, current: Option<f32>) -> VehicleSnapshot {
        VehicleSnapshot {
            body_z_ned: [0.0, 0.0, 1.0],
            velocity_neu: [0.0, 0.0, 2.0],
            altitude_m,
            position_ok: true,
            landed: false,
            battery_voltage: 15.0,
            battery_current: current,
            target_roll_deg: 0.0,
            target_yaw_deg: 0.0,
            initial_armed_bearing_deg: 0.0,
            flight_mode: FlightMode::Auto,
        }
    }

    #[test]
    fn fresh_pack_at_fifty_metres() {
        let p = EnergyPredictor::new(&config(10.0, 10.0), 0);
        let s = p.snapshot(50.0);
        assert_eq!(s.cost_per_m, 0.01);
        assert!((s.to_home_wh - 0.5).abs() < 1e-6);
        assert!((s.range_used.unwrap() - 0.20).abs() < 1e-6);
    }

    #[test]
    fn drained_pack_reaches_full_range() {
        let mut p = EnergyPredictor::new(&config(10.0, 10.0), 0);
        p.consumed_wh = 8.0;
        assert!(p.snapshot(50.0).range_used.unwrap() >= 1.0);
    }

    #[test]
    fn zero_capacity_disables_range() {
        let p = EnergyPredictor::new(&config(0.0, 10.0), 0);
        assert_eq!(p.snapshot(50.0).range_used, None);
    }

    #[test]
    fn rate_limited_to_interval() {
        let mut p = EnergyPredictor::new(&config(10.0, 10.0), 1_000);
        let snap = climbing(20.0, Some(10.0));
        assert!(p.update(1_050, &snap, 5.0).is_none());
        assert!(p.update(1_100, &snap, 5.0).is_some());
        assert!(p.update(1_199, &snap, 5.0).is_none());
    }

    #[test]
    fn integrates_power_and_wind() {
        let mut p = EnergyPredictor::new(&config(10.0, 10.0), 0);
        let snap = climbing(20.0, Some(12.0));
        // 15 V * 12 A for one hour = 180 Wh, taken in 1 s steps.
        let mut now = 0u32;
        for _ in 0..3600 {
            now += 1_000;
            p.update(now, &snap, 4.0);
        }
        assert!((p.consumed_wh() - 180.0).abs() < 0.1, "got {}", p.consumed_wh());
        assert!((p.wind_memory() - 14_400.0).abs() < 1.0);
        // 1.5e-6 * 14400 + 0.007 = 0.0286 Wh/m
        assert!((p.snapshot(20.0).cost_per_m - 0.0286).abs() < 1e-4);
    }

    #[test]
    fn wind_memory_only_grows_while_climbing() {
        let mut p = EnergyPredictor::new(&config(10.0, 10.0), 0);
        let mut snap = climbing(20.0, Some(1.0));
        snap.velocity_neu[2] = -1.0;
        p.update(100, &snap, 8.0);
        snap.velocity_neu[2] = 0.0;
        p.update(200, &snap, 8.0);
        assert_eq!(p.wind_memory(), 0.0);
    }

    #[test]
    fn missing_current_skips_consumption() {
        let mut p = EnergyPredictor::new(&config(10.0, 10.0), 0);
        let s = p.update(500, &climbing(20.0, None), 3.0).unwrap();
        assert_eq!(s.consumed_wh, 0.0);
        assert!((s.wind_memory - 1.5).abs() < 1e-6);
    }

    #[test]
    fn ground_keeps_consumed_energy() {
        let mut p = EnergyPredictor::new(&config(10.0, 10.0), 0);
        p.update(1_000, &climbing(20.0, Some(20.0)), 6.0);
        let consumed = p.consumed_wh();
        assert!(consumed > 0.0);
        p.on_ground(2_000);
        assert_eq!(p.consumed_wh(), consumed);
        assert_eq!(p.wind_memory(), 0.0);
    }

    #[test]
    fn timer_wraparound() {
        let mut p = EnergyPredictor::new(&config(10.0, 10.0), u32::MAX - 50);
        assert!(p.update(49, &climbing(20.0, Some(1.0)), 1.0).is_some());
    }
}
