//! Wind vane and return-to-launch supervisor for vertical-profiling multirotors.
//!
//! The library is `no_std` and platform-agnostic: the flight stack it runs
//! alongside is reached only through the capability traits in [`host`], so
//! every estimator can be driven on the host with synthetic providers.
//!
//! - [`drivers::filter`]: thrust-vector low-pass filter bank
//! - [`drivers::wind`]: wind direction/speed estimator (wind vane)
//! - [`drivers::regime`]: flight-regime classifier gating publication
//! - [`drivers::energy`]: energy-to-home predictor
//! - [`drivers::safety`]: battery-range and high-wind alerts
//! - [`drivers::fan`]: scoop fan altitude hysteresis
//! - [`drivers::atmosphere`]: iMet and humidity probe sources
//! - [`drivers::crsf`]: CRSF telemetry codec for the flight-controller link
//! - [`drivers::dshot`]: scoop fan ESC throttle mapping
//! - [`link`]: vehicle snapshots built from link telemetry
//! - [`sim`]: scripted vertical profile for bench runs
//! - [`record`]: wind and atmosphere log records
//! - [`supervisor`]: the owned context ticked by the control-loop dispatcher

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod drivers;
pub mod host;
pub mod link;
pub mod record;
pub mod sim;
pub mod state;
pub mod supervisor;

pub use config::SupervisorConfig;
pub use supervisor::Supervisor;
