use core::sync::atomic::{AtomicU16, Ordering};

use embassy_executor::task;
use embassy_time::{Duration, Timer};
use windvane::drivers::dshot::{fan_throttle, Dshot300};

/// Scoop fan ESC: refreshes the DShot300 throttle at 1 kHz from the scaled
/// fan output the supervisor writes.
#[task]
pub async fn fan_task(mut esc: Dshot300, output: &'static AtomicU16) {
    loop {
        let scaled = output.load(Ordering::Relaxed);
        esc.send_throttle(fan_throttle(scaled));
        Timer::after(Duration::from_micros(1000)).await;
    }
}
