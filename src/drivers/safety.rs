//! Safety alerts: battery range and high wind.
//!
//! Energy latches never clear within a session. The wind latch re-arms once
//! the wind has dropped clearly below tolerance. Warnings are always sent;
//! the `act_on_*` flags only decide whether a return is requested too.

use crate::config::SupervisorConfig;
use crate::host::{ModeControl, ModeReason, Notifier, Severity};
use crate::state::FlightMode;

pub const RANGE_WARNING_FRACTION: f32 = 0.85;
pub const RANGE_RETURN_FRACTION: f32 = 1.0;
/// Wind must drop this far (m/s) below tolerance before the alert re-arms.
pub const WIND_REARM_MARGIN: f32 = 3.0;

pub const MSG_RANGE_WARNING: &str = "Battery range over 85%";
pub const MSG_RANGE_RETURN: &str = "Battery range exhausted: returning to launch";
pub const MSG_WIND_RETURN: &str = "High wind: returning to launch";
pub const MSG_WIND_CLEARED: &str = "High wind warning cleared";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlertState {
    Armed,
    Warned,
    Triggered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlertEvent {
    Warn,
    Return,
    Cleared,
}

/// Two one-shot latches on the range-used fraction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnergyAlert {
    warned: bool,
    triggered: bool,
}

impl EnergyAlert {
    pub const fn new() -> Self {
        Self {
            warned: false,
            triggered: false,
        }
    }

    /// Events raised by this sample, warning first.
    pub fn evaluate(&mut self, range_used: f32) -> (Option<AlertEvent>, Option<AlertEvent>) {
        let mut warn = None;
        let mut ret = None;
        if range_used >= RANGE_WARNING_FRACTION && !self.warned {
            self.warned = true;
            warn = Some(AlertEvent::Warn);
        }
        if range_used >= RANGE_RETURN_FRACTION && !self.triggered {
            self.triggered = true;
            ret = Some(AlertEvent::Return);
        }
        (warn, ret)
    }

    pub fn state(&self) -> AlertState {
        if self.triggered {
            AlertState::Triggered
        } else if self.warned {
            AlertState::Warned
        } else {
            AlertState::Armed
        }
    }
}

/// High-wind latch with a re-arm margin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindAlert {
    tolerance: f32,
    triggered: bool,
}

impl WindAlert {
    pub const fn new(tolerance: f32) -> Self {
        Self {
            tolerance,
            triggered: false,
        }
    }

    /// `autopilot` gates triggering only; clearing works in any mode.
    pub fn evaluate(&mut self, wind_speed: f32, autopilot: bool) -> Option<AlertEvent> {
        if self.tolerance == 0.0 || !wind_speed.is_finite() {
            return None;
        }
        if wind_speed > self.tolerance && !self.triggered && autopilot {
            self.triggered = true;
            Some(AlertEvent::Return)
        } else if wind_speed < self.tolerance - WIND_REARM_MARGIN && self.triggered {
            self.triggered = false;
            Some(AlertEvent::Cleared)
        } else {
            None
        }
    }

    pub fn state(&self) -> AlertState {
        if self.triggered {
            AlertState::Triggered
        } else {
            AlertState::Armed
        }
    }
}

pub struct SafetySupervisor {
    energy: EnergyAlert,
    wind: WindAlert,
    act_on_range: bool,
    act_on_wind: bool,
}

impl SafetySupervisor {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            energy: EnergyAlert::new(),
            wind: WindAlert::new(config.wind_speed_tolerance),
            act_on_range: config.act_on_battery_range,
            act_on_wind: config.act_on_high_wind,
        }
    }

    /// `range_used` is `None` when no battery capacity is configured.
    pub fn check_energy<H: Notifier + ModeControl>(&mut self, host: &mut H, range_used: Option<f32>) {
        let Some(range_used) = range_used else {
            return;
        };
        let (warn, ret) = self.energy.evaluate(range_used);
        if warn.is_some() {
            warn!("safety: range used {}", range_used);
            host.send_text(Severity::Warning, MSG_RANGE_WARNING);
        }
        if ret.is_some() {
            warn!("safety: battery range exhausted ({})", range_used);
            host.send_text(Severity::Warning, MSG_RANGE_RETURN);
            if self.act_on_range {
                request_return(host, ModeReason::BatteryRange);
            }
        }
    }

    pub fn check_wind<H: Notifier + ModeControl>(&mut self, host: &mut H, wind_speed: f32) {
        let autopilot = host.is_autopilot();
        match self.wind.evaluate(wind_speed, autopilot) {
            Some(AlertEvent::Return) => {
                warn!("safety: wind {} m/s over tolerance", wind_speed);
                host.send_text(Severity::Warning, MSG_WIND_RETURN);
                if self.act_on_wind {
                    request_return(host, ModeReason::HighWind);
                }
            }
            Some(AlertEvent::Cleared) => {
                info!("safety: high wind cleared at {} m/s", wind_speed);
                host.send_text(Severity::Info, MSG_WIND_CLEARED);
            }
            _ => {}
        }
    }

    pub fn energy_state(&self) -> AlertState {
        self.energy.state()
    }

    pub fn wind_state(&self) -> AlertState {
        self.wind.state()
    }
}

fn request_return<H: ModeControl>(host: &mut H, reason: ModeReason) {
    if let Err(e) = host.request_mode(FlightMode::Rtl, reason) {
        error!("safety: return request for {} rejected: {}", reason, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ModeRejected;

    #[derive(Default)]
    struct MockHost {
        autopilot: bool,
        reject: bool,
        texts: Vec<(Severity, String)>,
        requests: Vec<(FlightMode, ModeReason)>,
    }

    impl Notifier for MockHost {
        fn send_text(&mut self, severity: Severity, text: &str) {
            self.texts.push((severity, text.to_string()));
        }
    }

    impl ModeControl for MockHost {
        fn is_autopilot(&self) -> bool {
            self.autopilot
        }

        fn request_mode(&mut self, mode: FlightMode, reason: ModeReason) -> Result<(), ModeRejected> {
            self.requests.push((mode, reason));
            if self.reject {
                Err(ModeRejected)
            } else {
                Ok(())
            }
        }
    }

    fn supervisor(tolerance: f32, act: bool) -> SafetySupervisor {
        let mut config = SupervisorConfig::DEFAULT;
        config.wind_speed_tolerance = tolerance;
        config.act_on_high_wind = act;
        config.act_on_battery_range = act;
        SafetySupervisor::new(&config)
    }

    #[test]
    fn range_below_warning_is_silent() {
        let mut host = MockHost::default();
        let mut s = supervisor(12.0, true);
        s.check_energy(&mut host, Some(0.20));
        assert!(host.texts.is_empty());
        assert_eq!(s.energy_state(), AlertState::Armed);
    }

    #[test]
    fn full_range_requests_return_once() {
        let mut host = MockHost::default();
        let mut s = supervisor(12.0, true);
        for _ in 0..5 {
            s.check_energy(&mut host, Some(1.0));
        }
        assert_eq!(host.requests, vec![(FlightMode::Rtl, ModeReason::BatteryRange)]);
        assert_eq!(host.texts.len(), 2);
        assert_eq!(host.texts[0].1, MSG_RANGE_WARNING);
        assert_eq!(host.texts[1].1, MSG_RANGE_RETURN);
        assert_eq!(s.energy_state(), AlertState::Triggered);
    }

    #[test]
    fn energy_latches_never_rearm() {
        let mut host = MockHost::default();
        let mut s = supervisor(12.0, true);
        s.check_energy(&mut host, Some(0.9));
        assert_eq!(s.energy_state(), AlertState::Warned);
        s.check_energy(&mut host, Some(0.1));
        s.check_energy(&mut host, Some(0.9));
        assert_eq!(s.energy_state(), AlertState::Warned);
        assert_eq!(host.texts.len(), 1);

        s.check_energy(&mut host, Some(1.2));
        s.check_energy(&mut host, Some(0.1));
        assert_eq!(s.energy_state(), AlertState::Triggered);
    }

    #[test]
    fn disabled_action_still_warns() {
        let mut host = MockHost::default();
        let mut s = supervisor(12.0, false);
        s.check_energy(&mut host, Some(1.5));
        assert_eq!(host.texts.len(), 2);
        assert!(host.requests.is_empty());
    }

    #[test]
    fn no_capacity_never_alerts() {
        let mut host = MockHost::default();
        let mut s = supervisor(12.0, true);
        s.check_energy(&mut host, None);
        assert!(host.texts.is_empty());
    }

    #[test]
    fn wind_alert_rearms_below_margin() {
        let mut host = MockHost {
            autopilot: true,
            ..Default::default()
        };
        let mut s = supervisor(10.0, true);

        s.check_wind(&mut host, 11.0);
        s.check_wind(&mut host, 12.0);
        assert_eq!(host.requests.len(), 1);
        assert_eq!(s.wind_state(), AlertState::Triggered);

        // Exactly tolerance - 3 is not enough.
        s.check_wind(&mut host, 7.0);
        assert_eq!(s.wind_state(), AlertState::Triggered);
        s.check_wind(&mut host, 6.9);
        assert_eq!(s.wind_state(), AlertState::Armed);
        assert_eq!(host.texts.last().unwrap(), &(Severity::Info, MSG_WIND_CLEARED.to_string()));

        s.check_wind(&mut host, 10.5);
        assert_eq!(host.requests.len(), 2);
    }

    #[test]
    fn wind_alert_needs_autopilot() {
        let mut host = MockHost::default();
        let mut s = supervisor(10.0, true);
        s.check_wind(&mut host, 20.0);
        assert!(host.texts.is_empty());
        assert_eq!(s.wind_state(), AlertState::Armed);
    }

    #[test]
    fn zero_tolerance_disables_wind_alert() {
        let mut host = MockHost {
            autopilot: true,
            ..Default::default()
        };
        let mut s = supervisor(0.0, true);
        s.check_wind(&mut host, 50.0);
        assert!(host.texts.is_empty());
    }

    #[test]
    fn rejected_request_is_not_retried() {
        let mut host = MockHost {
            autopilot: true,
            reject: true,
            ..Default::default()
        };
        let mut s = supervisor(10.0, true);
        s.check_wind(&mut host, 15.0);
        s.check_wind(&mut host, 15.0);
        assert_eq!(host.requests.len(), 1);
        assert_eq!(s.wind_state(), AlertState::Triggered);
    }
}
