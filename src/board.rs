use embassy_stm32::gpio::{AnyPin, Pin};
use embassy_stm32::peripherals::{DMA1_CH2, DMA1_CH4, PA0, PA1, PA11, PA12, PC13, UART4, USB_OTG_FS};
use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::Config;

/// Flight-controller CRSF link on UART4 (TX=PA0, RX=PA1).
pub struct LinkResources {
    pub uart: UART4,
    pub tx: PA0,
    pub rx: PA1,
    pub tx_dma: DMA1_CH4,
    pub rx_dma: DMA1_CH2,
}

pub struct UsbResources {
    pub otg: USB_OTG_FS,
    pub dp: PA12,
    pub dm: PA11,
}

pub struct Board {
    pub link: LinkResources,
    pub usb: UsbResources,
    /// Scoop fan ESC signal on the MOTOR1 pad (PB0).
    pub fan_esc: AnyPin,
    pub led: PC13,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: TimeHertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2), // 168 MHz
            divq: Some(PllQDiv::DIV7), // 48 MHz for USB
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;

        let p = embassy_stm32::init(config);

        Self {
            link: LinkResources {
                uart: p.UART4,
                tx: p.PA0,
                rx: p.PA1,
                tx_dma: p.DMA1_CH4,
                rx_dma: p.DMA1_CH2,
            },
            usb: UsbResources {
                otg: p.USB_OTG_FS,
                dp: p.PA12,
                dm: p.PA11,
            },
            fan_esc: p.PB0.degrade(),
            led: p.PC13,
        }
    }
}
