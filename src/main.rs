#![no_std]
#![no_main]

mod board;
mod tasks;
mod usb;

use core::sync::atomic::AtomicU16;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::usart::{Config as UsartConfig, Uart};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_time::{Duration, Timer};
use windvane::config::SourceKind;
use windvane::drivers::dshot::Dshot300;
use windvane::link::SharedLink;
use windvane::state::SharedEstimates;
use windvane::SupervisorConfig;
use {defmt_rtt as _, panic_probe as _};

use crate::board::Board;
use crate::tasks::fan_task::fan_task;
use crate::tasks::link_task::{link_rx_task, mode_request_task, LINK_BAUD};
use crate::tasks::report_task::report_task;
use crate::tasks::supervisor_task::supervisor_task;
use crate::tasks::{LogChannel, ModeChannel, NoticeChannel};

// ── Supervisor tuning ─────────────────────────────────────────────────────────
const CONFIG: SupervisorConfig = SupervisorConfig {
    source: SourceKind::Link,
    battery_capacity_wh: 88.8, // 6S 4000 mAh
    ..SupervisorConfig::DEFAULT
};

// ── Shared state ──────────────────────────────────────────────────────────────
static ESTIMATES: SharedEstimates = SharedEstimates::new();
static LINK: SharedLink = SharedLink::new();
/// Scaled scoop fan output (0 = off, 100 = full).
static FAN_OUTPUT: AtomicU16 = AtomicU16::new(0);

// ── Inter-task channels ───────────────────────────────────────────────────────
static NOTICE_CHAN: NoticeChannel = NoticeChannel::new();
static LOG_CHAN: LogChannel = LogChannel::new();
static MODE_CHAN: ModeChannel = ModeChannel::new();

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    UART4 => embassy_stm32::usart::InterruptHandler<peripherals::UART4>;
});

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();

    // 2. USB (CDC-ACM debug port for notices and records)
    let (usb_dev, usb_serial) = usb::init(board.usb);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();
    spawner
        .spawn(report_task(usb_serial, NOTICE_CHAN.receiver(), LOG_CHAN.receiver()))
        .unwrap();

    // 3. Scoop fan ESC on PB0 (MOTOR1 resource)
    let esc = Dshot300::new(board.fan_esc);
    spawner.spawn(fan_task(esc, &FAN_OUTPUT)).unwrap();

    // 4. Flight-controller CRSF link, UART4 @ 420000 (TX=PA0, RX=PA1)
    let mut link_config = UsartConfig::default();
    link_config.baudrate = LINK_BAUD;
    let res = board.link;
    match Uart::new(res.uart, res.rx, res.tx, Irqs, res.tx_dma, res.rx_dma, link_config) {
        Ok(uart) => {
            let (tx, rx) = uart.split();
            spawner.spawn(link_rx_task(rx, &LINK)).unwrap();
            spawner.spawn(mode_request_task(tx, MODE_CHAN.receiver())).unwrap();
        }
        Err(_) => defmt::error!("link: uart config rejected, running without telemetry"),
    }

    // 5. Supervisor
    spawner
        .spawn(supervisor_task(
            CONFIG,
            &LINK,
            &ESTIMATES,
            &FAN_OUTPUT,
            NOTICE_CHAN.sender(),
            MODE_CHAN.sender(),
            LOG_CHAN.sender(),
        ))
        .unwrap();

    // 6. Heartbeat LED (PC13) with a periodic estimate dump
    let mut led = Output::new(board.led, Level::High, Speed::Low);
    loop {
        led.toggle();
        let wind = ESTIMATES.wind();
        let energy = ESTIMATES.energy();
        defmt::debug!(
            "wind {} deg {} m/s, consumed {} Wh, to home {} Wh",
            wind.direction_deg(),
            wind.speed(),
            energy.consumed_wh,
            energy.to_home_wh
        );
        Timer::after(Duration::from_millis(500)).await;
    }
}
