use core::fmt::Write;

use embassy_executor::task;
use embassy_futures::select::{select, Either};
use windvane::host::Severity;

use super::{LogReceiver, NoticeReceiver};
use crate::usb::{UsbSerial, MAX_PACKET};

/// Debug port writer: notices and log records, one text line each.
/// Lines are dropped while no terminal is attached.
#[task]
pub async fn report_task(mut usb_serial: UsbSerial<'static>, notices: NoticeReceiver, logs: LogReceiver) {
    let mut line = heapless::String::<256>::new();

    loop {
        line.clear();
        let formatted = match select(notices.receive(), logs.receive()).await {
            Either::First(notice) => {
                let tag = match notice.severity {
                    Severity::Info => "INFO",
                    Severity::Warning => "WARN",
                };
                write!(line, "{},{}\r\n", tag, notice.text)
            }
            Either::Second(record) => record.write_csv(&mut line),
        };
        if formatted.is_err() || !usb_serial.dtr() {
            continue;
        }

        for chunk in line.as_bytes().chunks(MAX_PACKET) {
            if usb_serial.write_packet(chunk).await.is_err() {
                break;
            }
        }
    }
}
