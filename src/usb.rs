use embassy_stm32::usb_otg::{self, Driver};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_usb::class::cdc_acm::{CdcAcmClass, State};
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

use crate::board::UsbResources;

bind_interrupts!(pub struct Irqs {
    OTG_FS => usb_otg::InterruptHandler<peripherals::USB_OTG_FS>;
});

pub type UsbDriver = Driver<'static, peripherals::USB_OTG_FS>;
pub type UsbSerial<'a> = CdcAcmClass<'a, UsbDriver>;

/// CDC-ACM max packet size.
pub const MAX_PACKET: usize = 64;

static EP_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
static CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static CDC_STATE: StaticCell<State<'static>> = StaticCell::new();

#[embassy_executor::task]
pub async fn usb_task(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

/// Brings up the debug port. Call once.
pub fn init(res: UsbResources) -> (UsbDevice<'static, UsbDriver>, UsbSerial<'static>) {
    let mut usb_config = usb_otg::Config::default();
    usb_config.vbus_detection = false;
    let driver = Driver::new_fs(
        res.otg,
        Irqs,
        res.dp,
        res.dm,
        EP_OUT_BUFFER.init([0; 256]),
        usb_config,
    );

    let mut config = Config::new(0xc0de, 0xcafe);
    config.manufacturer = Some("Windvane");
    config.product = Some("Wind vane supervisor");
    config.serial_number = Some("00000001");

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESC.init([0; 256]),
        BOS_DESC.init([0; 256]),
        &mut [], // msos_descs
        CONTROL_BUF.init([0; 64]),
    );

    let class = CdcAcmClass::new(&mut builder, CDC_STATE.init(State::new()), MAX_PACKET as u16);
    let usb = builder.build();

    (usb, class)
}
