//! Telemetry log records.
//!
//! Records are plain `Copy` data handed to a [`LogSink`](crate::host::LogSink).
//! `write_csv` renders one line without allocating so firmware can stream
//! records over the debug port.

use core::fmt::{self, Write};

use crate::drivers::atmosphere::{HumidityProbe, ImetProbe, PROBE_COUNT};

/// Raw vane output for one tick, published or not.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WindRecord {
    pub time_us: u64,
    pub direction_deg: f32,
    pub speed: f32,
    /// Unfiltered thrust vector (R13, R23, R33).
    pub thrust: [f32; 3],
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImetRecord {
    pub time_us: u64,
    pub fan_on: bool,
    pub probes: [ImetProbe; PROBE_COUNT],
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HumidityRecord {
    pub time_us: u64,
    pub probes: [HumidityProbe; PROBE_COUNT],
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogRecord {
    Wind(WindRecord),
    Imet(ImetRecord),
    Humidity(HumidityRecord),
}

impl LogRecord {
    pub fn time_us(&self) -> u64 {
        match self {
            Self::Wind(r) => r.time_us,
            Self::Imet(r) => r.time_us,
            Self::Humidity(r) => r.time_us,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Wind(_) => "WIND",
            Self::Imet(_) => "IMET",
            Self::Humidity(_) => "RH",
        }
    }

    /// One comma-separated line, terminated with `\r\n`.
    pub fn write_csv<W: Write>(&self, w: &mut W) -> fmt::Result {
        write!(w, "{},{}", self.tag(), self.time_us())?;
        match self {
            Self::Wind(r) => {
                write!(
                    w,
                    ",{:.2},{:.2},{:.4},{:.4},{:.4}",
                    r.direction_deg, r.speed, r.thrust[0], r.thrust[1], r.thrust[2]
                )?;
            }
            Self::Imet(r) => {
                write!(w, ",{}", r.fan_on as u8)?;
                for p in &r.probes {
                    write!(w, ",{}", p.healthy as u8)?;
                }
                for p in &r.probes {
                    write!(w, ",{:.3}", p.temperature_k)?;
                }
                for p in &r.probes {
                    write!(w, ",{:.1}", p.resistance_ohm)?;
                }
            }
            Self::Humidity(r) => {
                for p in &r.probes {
                    write!(w, ",{}", p.healthy as u8)?;
                }
                for p in &r.probes {
                    write!(w, ",{:.2}", p.relative_humidity)?;
                }
                for p in &r.probes {
                    write!(w, ",{:.2}", p.temperature_k)?;
                }
            }
        }
        w.write_str("\r\n")
    }
}
