//! Scoop fan altitude hysteresis.

use crate::host::{FanActuator, Notifier, Severity};

/// Switch-on altitude (cm above home).
pub const FAN_ON_ALTITUDE_CM: f32 = 185.0;
/// Switch-off altitude (cm above home).
pub const FAN_OFF_ALTITUDE_CM: f32 = 140.0;
/// Scaled output separating "running" from "stopped".
pub const FAN_HALF_SCALE: u16 = 50;

pub const MSG_FAN_ON: &str = "Scoop Fan activated";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FanTransition {
    On,
    Off,
}

/// Fan on/off state. The commanded output levels are free configuration,
/// so the state is kept here rather than read back from the actuator.
pub struct FanControl {
    on: bool,
    on_output: u16,
    off_output: u16,
}

impl FanControl {
    pub const fn new(on_output: u16, off_output: u16) -> Self {
        Self {
            on: false,
            on_output,
            off_output,
        }
    }

    pub fn update<H: FanActuator + Notifier>(
        &mut self,
        host: &mut H,
        altitude_m: f32,
    ) -> Option<FanTransition> {
        let altitude_cm = altitude_m * 100.0;

        if altitude_cm > FAN_ON_ALTITUDE_CM && !self.on {
            self.on = true;
            host.set_output(self.on_output);
            host.send_text(Severity::Info, MSG_FAN_ON);
            info!("fan: on at {} m", altitude_m);
            Some(FanTransition::On)
        } else if altitude_cm < FAN_OFF_ALTITUDE_CM && self.on {
            self.on = false;
            host.set_output(self.off_output);
            info!("fan: off at {} m", altitude_m);
            Some(FanTransition::Off)
        } else {
            None
        }
    }

    /// Grounded path: unconditionally commands the off level.
    pub fn ground<H: FanActuator>(&mut self, host: &mut H) {
        self.on = false;
        host.set_output(self.off_output);
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
