/// Lowest DShot throttle value; 1..=47 are reserved commands.
pub const DSHOT_THROTTLE_MIN: u16 = 48;
pub const DSHOT_THROTTLE_MAX: u16 = 2047;
/// Full-scale fan output.
pub const FAN_SCALE_MAX: u16 = 100;

/// Maps a scaled fan output (0..=100) to a DShot throttle. Zero stops the motor.
pub fn fan_throttle(scaled: u16) -> u16 {
    if scaled == 0 {
        return 0;
    }
    let scaled = scaled.min(FAN_SCALE_MAX) as u32;
    let span = (DSHOT_THROTTLE_MAX - DSHOT_THROTTLE_MIN) as u32;
    DSHOT_THROTTLE_MIN + (scaled * span / FAN_SCALE_MAX as u32) as u16
}

pub fn dshot_frame(command: u16, telemetry: bool) -> u16 {
    let mut packet = (command & 0x07ff) << 1;
    if telemetry {
        packet |= 1;
    }

    let mut csum = 0u16;
    let mut csum_data = packet;
    for _ in 0..3 {
        csum ^= csum_data;
        csum_data >>= 4;
    }
    csum &= 0x000f;

    (packet << 4) | csum
}

#[cfg(feature = "firmware")]
pub use self::esc::Dshot300;

#[cfg(feature = "firmware")]
mod esc {
    use cortex_m::asm;
    use embassy_stm32::gpio::{AnyPin, Level, Output, Speed};

    use super::dshot_frame;

    /// Bit-banged DShot300 on a single GPIO at 168 MHz.
    pub struct Dshot300 {
        pin: Output<'static, AnyPin>,
    }

    impl Dshot300 {
        const BIT_TOTAL_CYCLES: u32 = 560;
        const BIT1_HIGH_CYCLES: u32 = 420;
        const BIT1_LOW_CYCLES: u32 = Self::BIT_TOTAL_CYCLES - Self::BIT1_HIGH_CYCLES;
        const BIT0_HIGH_CYCLES: u32 = 210;
        const BIT0_LOW_CYCLES: u32 = Self::BIT_TOTAL_CYCLES - Self::BIT0_HIGH_CYCLES;
        const FRAME_GAP_CYCLES: u32 = 5200;

        pub fn new(pin: AnyPin) -> Self {
            Self {
                pin: Output::new(pin, Level::Low, Speed::VeryHigh),
            }
        }

        pub fn send_throttle(&mut self, throttle: u16) {
            self.send_frame(dshot_frame(throttle, false));
        }

        fn send_frame(&mut self, frame: u16) {
            // Interrupts off for the ~60 µs frame so ISRs cannot stretch a bit.
            critical_section::with(|_cs| {
                for bit in (0..16).rev() {
                    let one = ((frame >> bit) & 0x1) != 0;

                    self.pin.set_high();
                    if one {
                        asm::delay(Self::BIT1_HIGH_CYCLES);
                        self.pin.set_low();
                        asm::delay(Self::BIT1_LOW_CYCLES);
                    } else {
                        asm::delay(Self::BIT0_HIGH_CYCLES);
                        self.pin.set_low();
                        asm::delay(Self::BIT0_LOW_CYCLES);
                    }
                }

                self.pin.set_low();
                asm::delay(Self::FRAME_GAP_CYCLES);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_checksum() {
        // Throttle 1046, no telemetry: well-known frame 0x82C6.
        assert_eq!(dshot_frame(1046, false), 0x82C6);
        assert_eq!(dshot_frame(0, false), 0);
    }

    #[test]
    fn fan_scale_maps_onto_throttle_range() {
        assert_eq!(fan_throttle(0), 0);
        assert_eq!(fan_throttle(100), DSHOT_THROTTLE_MAX);
        assert_eq!(fan_throttle(250), DSHOT_THROTTLE_MAX);
        let half = fan_throttle(50);
        assert!(half > DSHOT_THROTTLE_MIN && half < DSHOT_THROTTLE_MAX);
        assert!(fan_throttle(1) >= DSHOT_THROTTLE_MIN);
    }
}
