//! Capability interfaces to the host flight stack.
//!
//! The supervisor never talks to hardware or the autopilot directly. It reads
//! a [`VehicleSnapshot`] from a [`VehicleSource`] and acts through the narrow
//! sinks below, which firmware implements over the flight-controller link and
//! tests implement with plain structs.

use crate::record::LogRecord;
use crate::state::{FlightMode, VehicleSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
    Info,
    Warning,
}

/// Why a mode change was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeReason {
    BatteryRange,
    HighWind,
}

/// The host refused or could not deliver a mode change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeRejected;

pub trait VehicleSource {
    fn snapshot(&mut self, now_us: u64) -> VehicleSnapshot;
}

pub trait Notifier {
    fn send_text(&mut self, severity: Severity, text: &str);
}

pub trait ModeControl {
    fn is_autopilot(&self) -> bool;
    fn request_mode(&mut self, mode: FlightMode, reason: ModeReason) -> Result<(), ModeRejected>;
}

/// Scaled fan output channel (0 = off, 100 = full).
pub trait FanActuator {
    fn output(&self) -> u16;
    fn set_output(&mut self, scaled: u16);
}

pub trait LogSink {
    fn write(&mut self, record: &LogRecord);
}

/// Everything the supervisor drives on a tick.
pub trait Host: Notifier + ModeControl + FanActuator {}

impl<T: Notifier + ModeControl + FanActuator> Host for T {}
