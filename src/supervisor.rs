//! The supervisor context: every estimator, latch and rate limiter lives here
//! and is advanced by the control-loop dispatcher through the `*_tick`
//! methods. Nothing blocks; each tick runs to completion.
//!
//! Tiers on a 50 Hz base tick ([`tiers`]):
//!
//! | tier   | every | work                                   |
//! |--------|-------|----------------------------------------|
//! | 50 Hz  | 1     | energy prediction and battery alerts   |
//! | 10 Hz  | 5     | wind vane, wind alert, iMet record     |
//! | 3.3 Hz | 15    | humidity record                        |
//! | 1 Hz   | 50    | scoop fan                              |

use crate::config::SupervisorConfig;
use crate::drivers::atmosphere::AtmosphereSource;
use crate::drivers::energy::EnergyPredictor;
use crate::drivers::fan::FanControl;
use crate::drivers::regime::{Publication, Regime, RegimeClassifier};
use crate::drivers::safety::{AlertState, SafetySupervisor};
use crate::drivers::wind::WindVane;
use crate::host::{FanActuator, Host, LogSink, VehicleSource};
use crate::record::{HumidityRecord, ImetRecord, LogRecord, WindRecord};
use crate::state::{SharedEstimates, VehicleSnapshot, WindEstimate};

pub const BASE_TICK_HZ: u32 = 50;
const VANE_DIVIDER: u32 = 5;
const HUMIDITY_DIVIDER: u32 = 15;
const FAN_DIVIDER: u32 = 50;

/// Which tiers run on a given base tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tiers {
    pub energy: bool,
    pub vane: bool,
    pub humidity: bool,
    pub fan: bool,
}

pub fn tiers(tick: u32) -> Tiers {
    Tiers {
        energy: true,
        vane: tick % VANE_DIVIDER == 0,
        humidity: tick % HUMIDITY_DIVIDER == 0,
        fan: tick % FAN_DIVIDER == 0,
    }
}

fn millis(now_us: u64) -> u32 {
    (now_us / 1000) as u32
}

pub struct Supervisor<'a> {
    estimates: &'a SharedEstimates,
    vane: WindVane,
    regime: RegimeClassifier,
    energy: EnergyPredictor,
    safety: SafetySupervisor,
    fan: FanControl,
    vane_period_ms: u32,
    last_vane_ms: Option<u32>,
    /// Latest raw vane speed, fed to the energy model.
    wind_speed: f32,
}

impl<'a> Supervisor<'a> {
    pub fn new(config: SupervisorConfig, estimates: &'a SharedEstimates, now_us: u64) -> Self {
        let config = config.sanitized();
        let (fs, fc) = config.filter_setup();
        info!("supervisor: vane {} Hz, cutoff {} Hz", fs, fc);

        Self {
            vane: WindVane::new(&config),
            regime: RegimeClassifier::new(),
            energy: EnergyPredictor::new(&config, millis(now_us)),
            safety: SafetySupervisor::new(&config),
            fan: FanControl::new(config.fan_on_output, config.fan_off_output),
            vane_period_ms: config.vane_period_ms(),
            last_vane_ms: None,
            wind_speed: 0.0,
            estimates,
        }
    }

    /// Runs every tier due on base tick `tick` against a fresh snapshot.
    pub fn run_tick<S, H, A, L>(
        &mut self,
        tick: u32,
        now_us: u64,
        source: &mut S,
        host: &mut H,
        atmosphere: &mut A,
        log: &mut L,
    ) -> VehicleSnapshot
    where
        S: VehicleSource,
        H: Host,
        A: AtmosphereSource,
        L: LogSink,
    {
        let snap = source.snapshot(now_us);
        let due = tiers(tick);

        if due.energy {
            self.energy_tick(now_us, &snap, host);
        }
        if due.vane {
            self.vane_tick(now_us, &snap, host, log);
            self.imet_tick(now_us, &snap, atmosphere, log);
        }
        if due.humidity {
            self.humidity_tick(now_us, &snap, atmosphere, log);
        }
        if due.fan {
            self.fan_tick(&snap, host);
        }
        snap
    }

    pub fn energy_tick<H: Host>(&mut self, now_us: u64, snap: &VehicleSnapshot, host: &mut H) {
        let now_ms = millis(now_us);
        if snap.landed {
            self.energy.on_ground(now_ms);
            return;
        }
        if let Some(snapshot) = self.energy.update(now_ms, snap, self.wind_speed) {
            self.estimates.publish_energy(snapshot);
            self.safety.check_energy(host, snapshot.range_used);
        }
    }

    pub fn vane_tick<H: Host, L: LogSink>(
        &mut self,
        now_us: u64,
        snap: &VehicleSnapshot,
        host: &mut H,
        log: &mut L,
    ) {
        let thrust = snap.thrust_vector();

        if snap.is_grounded() {
            self.ground(snap, host);
            let published = self.estimates.wind();
            log.write(&LogRecord::Wind(WindRecord {
                time_us: now_us,
                direction_deg: published.direction_deg(),
                speed: published.speed(),
                thrust,
            }));
            return;
        }

        let now_ms = millis(now_us);
        if let Some(last) = self.last_vane_ms {
            if now_ms.wrapping_sub(last) < self.vane_period_ms {
                return;
            }
        }
        self.last_vane_ms = Some(now_ms);

        let published = self.estimates.wind();
        let Some(sample) = self.vane.update(thrust, snap.target_roll_deg, published.direction_deg())
        else {
            log.write(&LogRecord::Wind(WindRecord {
                time_us: now_us,
                direction_deg: published.direction_deg(),
                speed: 0.0,
                thrust,
            }));
            return;
        };

        self.wind_speed = sample.speed;
        log.write(&LogRecord::Wind(WindRecord {
            time_us: now_us,
            direction_deg: sample.direction_deg,
            speed: sample.speed,
            thrust,
        }));

        let decision = self.regime.update(snap, sample.speed);
        match decision.publication {
            Publication::Estimate => {
                self.estimates
                    .publish_wind(WindEstimate::new(sample.direction_deg, sample.speed));
            }
            Publication::Neutral => {
                self.estimates
                    .publish_wind(WindEstimate::new(snap.target_yaw_deg, 0.0));
            }
            Publication::HoldDirection => {
                self.estimates
                    .publish_wind(WindEstimate::new(published.direction_deg(), 0.0));
            }
            Publication::Skip => self.vane.clear_yaw_rate_memory(),
        }
        trace!(
            "vane: {} via {} -> {}",
            decision.regime,
            sample.strategy,
            decision.publication
        );

        self.safety.check_wind(host, sample.speed);
    }

    pub fn fan_tick<H: Host>(&mut self, snap: &VehicleSnapshot, host: &mut H) {
        if snap.is_grounded() {
            self.fan.ground(host);
        } else {
            self.fan.update(host, snap.altitude_m);
        }
    }

    pub fn imet_tick<A: AtmosphereSource, L: LogSink>(
        &mut self,
        now_us: u64,
        snap: &VehicleSnapshot,
        atmosphere: &mut A,
        log: &mut L,
    ) {
        let probes = atmosphere.imet(millis(now_us), snap.altitude_m);
        log.write(&LogRecord::Imet(ImetRecord {
            time_us: now_us,
            fan_on: self.fan.is_on(),
            probes,
        }));
    }

    pub fn humidity_tick<A: AtmosphereSource, L: LogSink>(
        &mut self,
        now_us: u64,
        snap: &VehicleSnapshot,
        atmosphere: &mut A,
        log: &mut L,
    ) {
        let probes = atmosphere.humidity(millis(now_us), snap.altitude_m);
        log.write(&LogRecord::Humidity(HumidityRecord {
            time_us: now_us,
            probes,
        }));
    }

    /// Grounded reset. Safe to repeat every tick.
    fn ground<H: FanActuator>(&mut self, snap: &VehicleSnapshot, host: &mut H) {
        self.estimates
            .publish_wind(WindEstimate::new(snap.initial_armed_bearing_deg, 0.0));
        self.fan.ground(host);
        self.vane.reset();
        self.regime.ground();
        self.wind_speed = 0.0;
    }

    pub fn regime(&self) -> Regime {
        self.regime.regime()
    }

    pub fn yaw_rate_memory(&self) -> f32 {
        self.vane.yaw_rate_memory()
    }

    pub fn consumed_wh(&self) -> f32 {
        self.energy.consumed_wh()
    }

    pub fn wind_memory(&self) -> f32 {
        self.energy.wind_memory()
    }

    pub fn energy_alert(&self) -> AlertState {
        self.safety.energy_state()
    }

    pub fn wind_alert(&self) -> AlertState {
        self.safety.wind_state()
    }
}
