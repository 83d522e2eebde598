//! Atmospheric probe sources for the iMet temperature and humidity records.
//!
//! Real probe drivers live outside this crate. [`SimulatedAtmosphere`]
//! produces a standard-day profile for bench and simulated flights;
//! [`Unattached`] reports every probe unhealthy.

use micromath::F32Ext;

pub const PROBE_COUNT: usize = 4;

/// Above this altitude the simulated profile is held constant.
const PROFILE_CEILING_M: f32 = 900.0;

/// Temperature profile (K) as polynomial coefficients, highest order first.
const TEMPERATURE_POLY: [f32; 5] = [2.99e-11, -3.70454e-8, -3.86806e-6, 1.388511e-2, 287.66];
const TEMPERATURE_ABOVE_CEILING_K: f32 = 289.64;
/// Relative humidity profile (%), highest order first.
const HUMIDITY_POLY: [f32; 5] = [-2.44407e-10, 3.88881064e-7, -1.41943e-4, -2.81895e-2, 51.63];
const HUMIDITY_ABOVE_CEILING: f32 = 34.44;

/// iMet bead resistance from temperature: `R = slope * T + offset`.
const BEAD_SLOPE: f32 = -356.9892;
const BEAD_OFFSET: f32 = 110_935.38;

const HUMIDITY_SENSOR_TEMP_K: f32 = 298.15;
const HUMIDITY_SENSOR_TEMP_SWING_K: f32 = 2.0;

/// Per-probe `(rate per ms, amplitude)` of the sinusoidal jitter.
const IMET_JITTER: [(f32, f32); PROBE_COUNT] =
    [(0.001, 0.002), (0.0007, 0.003), (0.0003, 0.0025), (0.0005, 0.0028)];
const HUMIDITY_JITTER: [(f32, f32); PROBE_COUNT] =
    [(0.1, 0.02), (0.3, 0.03), (0.5, 0.025), (0.7, 0.035)];
const HUMIDITY_TEMP_RATE: [f32; PROBE_COUNT] = [0.0003, 0.0004, 0.0005, 0.0006];

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImetProbe {
    pub temperature_k: f32,
    pub resistance_ohm: f32,
    pub healthy: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HumidityProbe {
    pub relative_humidity: f32,
    pub temperature_k: f32,
    pub healthy: bool,
}

pub trait AtmosphereSource {
    fn imet(&mut self, now_ms: u32, altitude_m: f32) -> [ImetProbe; PROBE_COUNT];
    fn humidity(&mut self, now_ms: u32, altitude_m: f32) -> [HumidityProbe; PROBE_COUNT];
}

fn horner(coeffs: &[f32], x: f32) -> f32 {
    coeffs.iter().fold(0.0, |acc, &c| acc * x + c)
}

fn jitter(now_ms: u32, rate: f32, amplitude: f32) -> f32 {
    (rate * now_ms as f32).sin() * amplitude
}

pub fn standard_temperature_k(altitude_m: f32) -> f32 {
    if altitude_m < PROFILE_CEILING_M {
        horner(&TEMPERATURE_POLY, altitude_m)
    } else {
        TEMPERATURE_ABOVE_CEILING_K
    }
}

pub fn standard_humidity(altitude_m: f32) -> f32 {
    if altitude_m < PROFILE_CEILING_M {
        horner(&HUMIDITY_POLY, altitude_m)
    } else {
        HUMIDITY_ABOVE_CEILING
    }
}

pub fn bead_resistance_ohm(temperature_k: f32) -> f32 {
    BEAD_SLOPE * temperature_k + BEAD_OFFSET
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SimulatedAtmosphere;

impl AtmosphereSource for SimulatedAtmosphere {
    fn imet(&mut self, now_ms: u32, altitude_m: f32) -> [ImetProbe; PROBE_COUNT] {
        let temperature = standard_temperature_k(altitude_m);
        let resistance = bead_resistance_ohm(temperature);
        IMET_JITTER.map(|(rate, amplitude)| {
            let j = jitter(now_ms, rate, amplitude);
            ImetProbe {
                temperature_k: temperature + j,
                resistance_ohm: resistance + j,
                healthy: true,
            }
        })
    }

    fn humidity(&mut self, now_ms: u32, altitude_m: f32) -> [HumidityProbe; PROBE_COUNT] {
        let humidity = standard_humidity(altitude_m);
        let mut probes = [HumidityProbe::default(); PROBE_COUNT];
        for (i, probe) in probes.iter_mut().enumerate() {
            let (rate, amplitude) = HUMIDITY_JITTER[i];
            *probe = HumidityProbe {
                relative_humidity: humidity + jitter(now_ms, rate, amplitude),
                temperature_k: HUMIDITY_SENSOR_TEMP_K
                    + jitter(now_ms, HUMIDITY_TEMP_RATE[i], HUMIDITY_SENSOR_TEMP_SWING_K),
                healthy: true,
            };
        }
        probes
    }
}

/// No probes fitted.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unattached;

impl AtmosphereSource for Unattached {
    fn imet(&mut self, _now_ms: u32, _altitude_m: f32) -> [ImetProbe; PROBE_COUNT] {
        [ImetProbe::default(); PROBE_COUNT]
    }

    fn humidity(&mut self, _now_ms: u32, _altitude_m: f32) -> [HumidityProbe; PROBE_COUNT] {
        [HumidityProbe::default(); PROBE_COUNT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_at_ground_level() {
        assert!((standard_temperature_k(0.0) - 287.66).abs() < 1e-4);
        assert!((standard_humidity(0.0) - 51.63).abs() < 1e-4);
    }

    #[test]
    fn profile_is_flat_above_ceiling() {
        assert_eq!(standard_temperature_k(900.0), TEMPERATURE_ABOVE_CEILING_K);
        assert_eq!(standard_humidity(1500.0), HUMIDITY_ABOVE_CEILING);
    }

    #[test]
    fn warms_with_altitude_near_ground() {
        // Linear term dominates low down: ~+1.4 K per 100 m.
        let t = standard_temperature_k(100.0);
        assert!(t > 288.9 && t < 289.1, "got {}", t);
    }

    #[test]
    fn simulated_probes_track_profile() {
        let mut atmosphere = SimulatedAtmosphere;
        let imet = atmosphere.imet(12_345, 50.0);
        let expected = standard_temperature_k(50.0);
        for probe in imet {
            assert!(probe.healthy);
            assert!((probe.temperature_k - expected).abs() <= 0.003 + 1e-4);
            let r = bead_resistance_ohm(expected);
            assert!((probe.resistance_ohm - r).abs() < 0.05);
        }

        let rh = atmosphere.humidity(12_345, 50.0);
        for probe in rh {
            assert!((probe.relative_humidity - standard_humidity(50.0)).abs() <= 0.04);
            assert!((probe.temperature_k - 298.15).abs() <= 2.0 + 1e-3);
        }
    }

    #[test]
    fn unattached_probes_are_unhealthy() {
        let mut none = Unattached;
        assert!(none.imet(0, 10.0).iter().all(|p| !p.healthy));
        assert!(none.humidity(0, 10.0).iter().all(|p| !p.healthy));
    }
}
