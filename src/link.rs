//! Vehicle state from the flight-controller telemetry link.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use micromath::F32Ext;

use crate::drivers::crsf::{LinkState, Telemetry};
use crate::drivers::wind::wrap_360;
use crate::host::VehicleSource;
use crate::state::{FlightMode, VehicleSnapshot};

/// Satellites needed before the position is trusted.
pub const MIN_SATELLITES: u8 = 6;
/// Telemetry older than this is treated as lost.
pub const LINK_TIMEOUT_US: u64 = 1_000_000;

/// Latest decoded telemetry, written by the link task.
pub struct SharedLink {
    state: Mutex<CriticalSectionRawMutex, Cell<LinkState>>,
}

impl SharedLink {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(LinkState::EMPTY)),
        }
    }

    pub fn apply(&self, telemetry: Telemetry, now_us: u64) {
        self.state.lock(|c| {
            let mut state = c.get();
            state.apply(telemetry, now_us);
            c.set(state);
        });
    }

    pub fn get(&self) -> LinkState {
        self.state.lock(|c| c.get())
    }
}

impl Default for SharedLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Third column of the ZYX body→NED rotation.
pub fn body_z_from_euler(roll: f32, pitch: f32, yaw: f32) -> [f32; 3] {
    let (sr, cr) = (roll.sin(), roll.cos());
    let (sp, cp) = (pitch.sin(), pitch.cos());
    let (sy, cy) = (yaw.sin(), yaw.cos());
    [cy * sp * cr + sy * sr, sy * sp * cr - cy * sr, cp * cr]
}

/// North/east/up velocity from ground speed, course and climb rate.
pub fn velocity_neu(ground_speed: f32, course_deg: f32, climb: f32) -> [f32; 3] {
    let course = course_deg.to_radians();
    [ground_speed * course.cos(), ground_speed * course.sin(), climb]
}

/// Turns link telemetry into snapshots. Home altitude and the armed bearing
/// are captured on each disarmed→armed edge.
pub struct LinkSource<'a> {
    link: &'a SharedLink,
    was_armed: bool,
    home_altitude_m: f32,
    armed_bearing_deg: f32,
}

impl<'a> LinkSource<'a> {
    pub fn new(link: &'a SharedLink) -> Self {
        Self {
            link,
            was_armed: false,
            home_altitude_m: 0.0,
            armed_bearing_deg: 0.0,
        }
    }
}

fn absolute_altitude(state: &LinkState) -> Option<f32> {
    state
        .vario
        .map(|v| v.altitude_m)
        .or_else(|| state.gps.map(|g| g.altitude_m))
}

impl VehicleSource for LinkSource<'_> {
    fn snapshot(&mut self, now_us: u64) -> VehicleSnapshot {
        let state = self.link.get();
        let Some(attitude) = state.attitude else {
            return VehicleSnapshot::GROUNDED;
        };

        let yaw_deg = wrap_360(attitude.yaw.to_degrees());
        let altitude = absolute_altitude(&state).unwrap_or(0.0);

        if state.armed && !self.was_armed {
            self.home_altitude_m = altitude;
            self.armed_bearing_deg = yaw_deg;
            info!("link: armed, home {} m, bearing {}", altitude, yaw_deg);
        }
        self.was_armed = state.armed;

        let stale = now_us.saturating_sub(state.last_frame_us) > LINK_TIMEOUT_US;
        let gps_ok = state.gps.is_some_and(|g| g.satellites >= MIN_SATELLITES);
        let velocity = match state.gps {
            Some(g) => velocity_neu(
                g.ground_speed_mps,
                g.course_deg,
                state.vario.map_or(0.0, |v| v.vertical_speed_mps),
            ),
            None => [0.0; 3],
        };

        VehicleSnapshot {
            body_z_ned: body_z_from_euler(attitude.roll, attitude.pitch, attitude.yaw),
            velocity_neu: velocity,
            altitude_m: altitude - self.home_altitude_m,
            position_ok: gps_ok && !stale,
            landed: !state.armed,
            battery_voltage: state.battery.map_or(0.0, |b| b.voltage),
            battery_current: state.battery.map(|b| b.current),
            target_roll_deg: attitude.roll.to_degrees(),
            target_yaw_deg: yaw_deg,
            initial_armed_bearing_deg: self.armed_bearing_deg,
            flight_mode: state.mode.unwrap_or(FlightMode::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::crsf::{Attitude, BatteryReading, GpsFix, Vario};

    fn close(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn level_body_axis_points_down() {
        assert!(close(body_z_from_euler(0.0, 0.0, 1.3), [0.0, 0.0, 1.0]));
    }

    #[test]
    fn right_roll_tilts_thrust_east_when_facing_north() {
        let z = body_z_from_euler(0.2_f32, 0.0, 0.0);
        assert!(close(z, [0.0, -0.2_f32.sin(), 0.2_f32.cos()]));
    }

    #[test]
    fn nose_down_tilts_thrust_along_heading() {
        // Facing east, pitched nose down: body down axis swings west, thrust leans east.
        let z = body_z_from_euler(0.0, -0.1, core::f32::consts::FRAC_PI_2);
        assert!(z[1] < -0.09 && z[0].abs() < 1e-5);
    }

    #[test]
    fn velocity_from_course() {
        assert!(close(velocity_neu(2.0, 90.0, 0.5), [0.0, 2.0, 0.5]));
    }

    fn link_with_flight(armed: bool, altitude_m: f32) -> SharedLink {
        let link = SharedLink::new();
        link.apply(
            Telemetry::Attitude(Attitude {
                roll: 0.05,
                pitch: 0.0,
                yaw: -0.5,
            }),
            0,
        );
        link.apply(
            Telemetry::Gps(GpsFix {
                latitude_deg: 0.0,
                longitude_deg: 0.0,
                ground_speed_mps: 0.0,
                course_deg: 0.0,
                altitude_m: 0.0,
                satellites: 10,
            }),
            0,
        );
        link.apply(
            Telemetry::Vario(Vario {
                altitude_m,
                vertical_speed_mps: 1.0,
            }),
            0,
        );
        link.apply(
            Telemetry::Battery(BatteryReading {
                voltage: 16.0,
                current: 8.0,
                consumed_mah: 0,
                remaining_percent: 100,
            }),
            0,
        );
        link.apply(
            Telemetry::FlightMode {
                mode: FlightMode::Auto,
                armed,
            },
            0,
        );
        link
    }

    #[test]
    fn altitude_relative_to_armed_home() {
        let link = link_with_flight(false, 120.0);
        let mut source = LinkSource::new(&link);
        assert!(source.snapshot(0).landed);

        link.apply(
            Telemetry::FlightMode {
                mode: FlightMode::Auto,
                armed: true,
            },
            10,
        );
        let snap = source.snapshot(20);
        assert!(!snap.landed);
        assert_eq!(snap.altitude_m, 0.0);
        assert!((snap.initial_armed_bearing_deg - wrap_360((-0.5_f32).to_degrees())).abs() < 1e-4);

        link.apply(
            Telemetry::Vario(Vario {
                altitude_m: 150.0,
                vertical_speed_mps: 1.0,
            }),
            30,
        );
        let snap = source.snapshot(40);
        assert_eq!(snap.altitude_m, 30.0);
        assert_eq!(snap.velocity_neu[2], 1.0);
        assert_eq!(snap.battery_current, Some(8.0));
        assert!(!snap.is_grounded());
    }

    #[test]
    fn stale_link_drops_position() {
        let link = link_with_flight(true, 100.0);
        let mut source = LinkSource::new(&link);
        assert!(source.snapshot(500_000).position_ok);
        assert!(!source.snapshot(LINK_TIMEOUT_US + 1).position_ok);
    }

    #[test]
    fn no_attitude_means_grounded() {
        let link = SharedLink::new();
        let mut source = LinkSource::new(&link);
        assert!(source.snapshot(0).is_grounded());
    }
}
