use core::sync::atomic::{AtomicU16, Ordering};

use embassy_executor::task;
use embassy_time::{Duration, Instant, Ticker};
use windvane::drivers::atmosphere::{AtmosphereSource, SimulatedAtmosphere, Unattached};
use windvane::host::{FanActuator, LogSink, ModeControl, ModeReason, ModeRejected, Notifier, Severity, VehicleSource};
use windvane::link::{LinkSource, SharedLink};
use windvane::record::LogRecord;
use windvane::sim::{Profile, SimulatedVehicle};
use windvane::state::{FlightMode, SharedEstimates};
use windvane::supervisor::BASE_TICK_HZ;
use windvane::{config::SourceKind, Supervisor, SupervisorConfig};

use super::{LogSender, ModeSender, Notice, NoticeSender};

/// Host capabilities on the firmware side. Mode comes from the latest snapshot.
struct FirmwareHost {
    mode: FlightMode,
    fan: &'static AtomicU16,
    notices: NoticeSender,
    modes: ModeSender,
}

impl Notifier for FirmwareHost {
    fn send_text(&mut self, severity: Severity, text: &str) {
        let mut notice = Notice {
            severity,
            text: heapless::String::new(),
        };
        for c in text.chars() {
            if notice.text.push(c).is_err() {
                break;
            }
        }
        match severity {
            Severity::Info => defmt::info!("notice: {}", text),
            Severity::Warning => defmt::warn!("notice: {}", text),
        }
        // Debug port may be gone; never stall the loop on it.
        let _ = self.notices.try_send(notice);
    }
}

impl ModeControl for FirmwareHost {
    fn is_autopilot(&self) -> bool {
        self.mode.is_autopilot()
    }

    fn request_mode(&mut self, mode: FlightMode, reason: ModeReason) -> Result<(), ModeRejected> {
        defmt::info!("requesting {} ({})", mode, reason);
        self.modes.try_send(mode).map_err(|_| ModeRejected)
    }
}

impl FanActuator for FirmwareHost {
    fn output(&self) -> u16 {
        self.fan.load(Ordering::Relaxed)
    }

    fn set_output(&mut self, scaled: u16) {
        self.fan.store(scaled, Ordering::Relaxed);
    }
}

struct ChannelLog {
    logs: LogSender,
}

impl LogSink for ChannelLog {
    fn write(&mut self, record: &LogRecord) {
        let _ = self.logs.try_send(*record);
    }
}

/// Control-loop dispatcher: 50 Hz base tick driving the supervisor tiers.
#[task]
pub async fn supervisor_task(
    config: SupervisorConfig,
    link: &'static SharedLink,
    estimates: &'static SharedEstimates,
    fan: &'static AtomicU16,
    notices: NoticeSender,
    modes: ModeSender,
    logs: LogSender,
) {
    let host = FirmwareHost {
        mode: FlightMode::Unknown,
        fan,
        notices,
        modes,
    };
    let log = ChannelLog { logs };

    defmt::info!("supervisor: source {}", config.source);
    match config.source {
        SourceKind::Link => run(config, estimates, LinkSource::new(link), Unattached, host, log).await,
        SourceKind::Simulated => {
            run(
                config,
                estimates,
                SimulatedVehicle::new(Profile::DEFAULT),
                SimulatedAtmosphere,
                host,
                log,
            )
            .await
        }
    }
}

async fn run<S: VehicleSource, A: AtmosphereSource>(
    config: SupervisorConfig,
    estimates: &'static SharedEstimates,
    mut source: S,
    mut atmosphere: A,
    mut host: FirmwareHost,
    mut log: ChannelLog,
) -> ! {
    let mut supervisor = Supervisor::new(config, estimates, Instant::now().as_micros());
    let mut ticker = Ticker::every(Duration::from_hz(BASE_TICK_HZ as u64));
    let mut tick: u32 = 0;

    loop {
        ticker.next().await;
        let now_us = Instant::now().as_micros();
        let snap = supervisor.run_tick(tick, now_us, &mut source, &mut host, &mut atmosphere, &mut log);
        host.mode = snap.flight_mode;
        tick = tick.wrapping_add(1);
    }
}
