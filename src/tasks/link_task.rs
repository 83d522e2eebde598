use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_stm32::peripherals::{DMA1_CH2, DMA1_CH4, UART4};
use embassy_stm32::usart::{UartRx, UartTx};
use embassy_time::{Duration, Instant, Timer};
use windvane::drivers::crsf::{build_mode_request, decode, CrsfParser, FrameError, MAX_FRAME_SIZE};
use windvane::link::SharedLink;

use super::ModeReceiver;

pub const LINK_BAUD: u32 = 420_000;

/// FC link receiver: parses CRSF telemetry from UART4 into the shared link state.
#[task]
pub async fn link_rx_task(mut rx: UartRx<'static, UART4, DMA1_CH2>, link: &'static SharedLink) {
    let mut parser = CrsfParser::new();
    let mut buf = [0u8; 128];
    let mut bad_frames: u32 = 0;

    loop {
        // Telemetry frames come in bursts; the timeout keeps a dead link from parking us.
        match select(rx.read_until_idle(&mut buf), Timer::after(Duration::from_millis(250))).await {
            Either::First(Ok(n)) => {
                let now_us = Instant::now().as_micros();
                for &b in &buf[..n] {
                    match parser.push_byte(b) {
                        Some(Ok(frame)) => match decode(&frame) {
                            Ok(telemetry) => link.apply(telemetry, now_us),
                            Err(FrameError::Unsupported(_)) => {}
                            Err(e) => defmt::debug!("link: undecodable frame {}", e),
                        },
                        Some(Err(e)) => {
                            bad_frames = bad_frames.wrapping_add(1);
                            defmt::debug!("link: {} ({} bad frames)", e, bad_frames);
                        }
                        None => {}
                    }
                }
            }
            Either::First(Err(_)) => defmt::warn!("link: uart error"),
            Either::Second(_) => {}
        }
    }
}

/// FC link transmitter: sends mode requests as CRSF command frames.
#[task]
pub async fn mode_request_task(mut tx: UartTx<'static, UART4, DMA1_CH4>, modes: ModeReceiver) {
    let mut buf = [0u8; MAX_FRAME_SIZE];
    loop {
        let mode = modes.receive().await;
        match build_mode_request(&mut buf, mode) {
            Ok(n) => {
                if tx.write(&buf[..n]).await.is_err() {
                    defmt::warn!("link: mode request for {} not sent", mode);
                }
            }
            Err(e) => defmt::warn!("link: cannot encode mode {}: {}", mode, e),
        }
    }
}
