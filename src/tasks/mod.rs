use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use windvane::host::Severity;
use windvane::record::LogRecord;
use windvane::state::FlightMode;

pub mod fan_task;
pub mod link_task;
pub mod report_task;
pub mod supervisor_task;

pub const NOTICE_LEN: usize = 64;
pub const NOTICE_DEPTH: usize = 4;
pub const LOG_DEPTH: usize = 8;

/// Text notification bound for the debug port.
pub struct Notice {
    pub severity: Severity,
    pub text: heapless::String<NOTICE_LEN>,
}

pub type NoticeChannel = Channel<CriticalSectionRawMutex, Notice, NOTICE_DEPTH>;
pub type NoticeSender = Sender<'static, CriticalSectionRawMutex, Notice, NOTICE_DEPTH>;
pub type NoticeReceiver = Receiver<'static, CriticalSectionRawMutex, Notice, NOTICE_DEPTH>;

pub type LogChannel = Channel<CriticalSectionRawMutex, LogRecord, LOG_DEPTH>;
pub type LogSender = Sender<'static, CriticalSectionRawMutex, LogRecord, LOG_DEPTH>;
pub type LogReceiver = Receiver<'static, CriticalSectionRawMutex, LogRecord, LOG_DEPTH>;

/// Cap=1: only the latest mode request matters.
pub type ModeChannel = Channel<CriticalSectionRawMutex, FlightMode, 1>;
pub type ModeSender = Sender<'static, CriticalSectionRawMutex, FlightMode, 1>;
pub type ModeReceiver = Receiver<'static, CriticalSectionRawMutex, FlightMode, 1>;
