//! CRSF link to the flight controller.
//!
//! The flight controller streams its telemetry frames (GPS, battery, vario,
//! attitude, flight mode) to us as if we were a receiver. Mode requests go
//! back as an extended command frame.

use crate::state::FlightMode;

pub const CRSF_SYNC: u8 = 0xC8;
pub const CRSF_ADDRESS_FLIGHT_CONTROLLER: u8 = 0xC8;
pub const CRSF_ADDRESS_RECEIVER: u8 = 0xEC;

pub const CRSF_FRAMETYPE_GPS: u8 = 0x02;
pub const CRSF_FRAMETYPE_BATTERY_SENSOR: u8 = 0x08;
pub const CRSF_FRAMETYPE_VARIO: u8 = 0x09;
pub const CRSF_FRAMETYPE_ATTITUDE: u8 = 0x1E;
pub const CRSF_FRAMETYPE_FLIGHT_MODE: u8 = 0x21;
pub const CRSF_FRAMETYPE_COMMAND: u8 = 0x32;

/// FC command realm, mode request subcommand.
pub const CRSF_COMMAND_FC: u8 = 0x01;
pub const CRSF_SUBCOMMAND_SET_MODE: u8 = 0x0F;

/// Length byte covers type, payload and CRC.
const MIN_LEN_BYTE: u8 = 2;
const MAX_LEN_BYTE: u8 = 62;
pub const MAX_FRAME_SIZE: usize = MAX_LEN_BYTE as usize + 2;
pub const MAX_PAYLOAD: usize = MAX_LEN_BYTE as usize - 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    BadLength,
    BadCrc,
    Truncated,
    Unsupported(u8),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: u8,
    payload: heapless::Vec<u8, MAX_PAYLOAD>,
}

impl Frame {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

pub struct CrsfParser {
    buffer: heapless::Vec<u8, MAX_FRAME_SIZE>,
}

impl CrsfParser {
    pub const fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
        }
    }

    /// Feeds one byte. Returns a result once a whole frame has been collected.
    pub fn push_byte(&mut self, b: u8) -> Option<Result<Frame, FrameError>> {
        // [Sync] [Len] [Type] [Payload...] [CRC]
        if self.buffer.is_empty() {
            if b == CRSF_SYNC {
                let _ = self.buffer.push(b);
            }
            return None;
        }

        if self.buffer.len() == 1 {
            if !(MIN_LEN_BYTE..=MAX_LEN_BYTE).contains(&b) {
                self.buffer.clear();
                return Some(Err(FrameError::BadLength));
            }
            let _ = self.buffer.push(b);
            return None;
        }

        let total_size = 2 + self.buffer[1] as usize;
        let _ = self.buffer.push(b);
        if self.buffer.len() < total_size {
            return None;
        }

        let result = parse_frame(&self.buffer);
        self.buffer.clear();
        Some(result)
    }
}

impl Default for CrsfParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates one complete frame (sync byte included).
pub fn parse_frame(raw: &[u8]) -> Result<Frame, FrameError> {
    if raw.len() < 4 {
        return Err(FrameError::Truncated);
    }
    let len_byte = raw[1];
    if !(MIN_LEN_BYTE..=MAX_LEN_BYTE).contains(&len_byte) {
        return Err(FrameError::BadLength);
    }
    let total_size = 2 + len_byte as usize;
    if raw.len() < total_size {
        return Err(FrameError::Truncated);
    }

    let body = &raw[2..total_size - 1];
    if crc8_d5(body) != raw[total_size - 1] {
        return Err(FrameError::BadCrc);
    }

    let payload = heapless::Vec::from_slice(&body[1..]).map_err(|_| FrameError::BadLength)?;
    Ok(Frame {
        frame_type: body[0],
        payload,
    })
}

fn crc8(poly: u8, data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ poly;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

pub fn crc8_d5(data: &[u8]) -> u8 {
    crc8(0xD5, data)
}

/// Inner checksum of command frames.
pub fn crc8_ba(data: &[u8]) -> u8 {
    crc8(0xBA, data)
}

/// Serializes `[Sync] [Len] [Type] [Payload...] [CRC]` into `buf`.
/// Returns the number of bytes written.
pub fn build_frame(buf: &mut [u8], frame_type: u8, payload: &[u8]) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::BadLength);
    }
    let len = 2 + payload.len();
    if buf.len() < len + 2 {
        return Err(FrameError::Truncated);
    }

    buf[0] = CRSF_SYNC;
    buf[1] = len as u8;
    buf[2] = frame_type;
    buf[3..3 + payload.len()].copy_from_slice(payload);
    buf[3 + payload.len()] = crc8_d5(&buf[2..3 + payload.len()]);

    Ok(2 + len)
}

/// Command frame asking the flight controller to switch mode.
pub fn build_mode_request(buf: &mut [u8], mode: FlightMode) -> Result<usize, FrameError> {
    let name = mode.crsf_name().ok_or(FrameError::Unsupported(CRSF_FRAMETYPE_COMMAND))?;

    let mut payload: heapless::Vec<u8, MAX_PAYLOAD> = heapless::Vec::new();
    let header = [
        CRSF_ADDRESS_FLIGHT_CONTROLLER,
        CRSF_ADDRESS_RECEIVER,
        CRSF_COMMAND_FC,
        CRSF_SUBCOMMAND_SET_MODE,
    ];
    payload.extend_from_slice(&header).map_err(|_| FrameError::BadLength)?;
    payload.extend_from_slice(name.as_bytes()).map_err(|_| FrameError::BadLength)?;
    payload.push(0).map_err(|_| FrameError::BadLength)?;

    // Inner CRC covers the frame type as well.
    let mut inner: heapless::Vec<u8, MAX_FRAME_SIZE> = heapless::Vec::new();
    let _ = inner.push(CRSF_FRAMETYPE_COMMAND);
    inner.extend_from_slice(&payload).map_err(|_| FrameError::BadLength)?;
    payload.push(crc8_ba(&inner)).map_err(|_| FrameError::BadLength)?;

    build_frame(buf, CRSF_FRAMETYPE_COMMAND, &payload)
}

// ── Telemetry decoding ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpsFix {
    pub latitude_deg: f32,
    pub longitude_deg: f32,
    pub ground_speed_mps: f32,
    pub course_deg: f32,
    pub altitude_m: f32,
    pub satellites: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReading {
    pub voltage: f32,
    pub current: f32,
    pub consumed_mah: u32,
    pub remaining_percent: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vario {
    pub altitude_m: f32,
    pub vertical_speed_mps: f32,
}

/// Euler angles in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Telemetry {
    Gps(GpsFix),
    Battery(BatteryReading),
    Vario(Vario),
    Attitude(Attitude),
    FlightMode { mode: FlightMode, armed: bool },
}

fn be_u16(p: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([p[at], p[at + 1]])
}

fn be_i16(p: &[u8], at: usize) -> i16 {
    i16::from_be_bytes([p[at], p[at + 1]])
}

fn be_i32(p: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([p[at], p[at + 1], p[at + 2], p[at + 3]])
}

fn expect_len(payload: &[u8], len: usize) -> Result<(), FrameError> {
    if payload.len() < len {
        Err(FrameError::Truncated)
    } else {
        Ok(())
    }
}

/// Vario altitude: MSB clear is decimetres with a 10000 dm offset, MSB set is metres.
fn unpack_altitude(packed: u16) -> f32 {
    if packed & 0x8000 == 0 {
        (packed as i32 - 10_000) as f32 / 10.0
    } else {
        (packed & 0x7FFF) as f32
    }
}

pub fn decode(frame: &Frame) -> Result<Telemetry, FrameError> {
    let p = frame.payload();
    match frame.frame_type {
        CRSF_FRAMETYPE_GPS => {
            expect_len(p, 15)?;
            Ok(Telemetry::Gps(GpsFix {
                latitude_deg: be_i32(p, 0) as f32 / 1e7,
                longitude_deg: be_i32(p, 4) as f32 / 1e7,
                // km/h * 10
                ground_speed_mps: be_u16(p, 8) as f32 / 36.0,
                course_deg: be_u16(p, 10) as f32 / 100.0,
                altitude_m: be_u16(p, 12) as f32 - 1000.0,
                satellites: p[14],
            }))
        }
        CRSF_FRAMETYPE_BATTERY_SENSOR => {
            expect_len(p, 8)?;
            Ok(Telemetry::Battery(BatteryReading {
                voltage: be_u16(p, 0) as f32 / 10.0,
                current: be_u16(p, 2) as f32 / 10.0,
                consumed_mah: u32::from_be_bytes([0, p[4], p[5], p[6]]),
                remaining_percent: p[7],
            }))
        }
        CRSF_FRAMETYPE_VARIO => {
            expect_len(p, 4)?;
            Ok(Telemetry::Vario(Vario {
                altitude_m: unpack_altitude(be_u16(p, 0)),
                vertical_speed_mps: be_i16(p, 2) as f32 / 100.0,
            }))
        }
        CRSF_FRAMETYPE_ATTITUDE => {
            expect_len(p, 6)?;
            // 100 µrad per LSB, pitch first.
            Ok(Telemetry::Attitude(Attitude {
                pitch: be_i16(p, 0) as f32 / 10_000.0,
                roll: be_i16(p, 2) as f32 / 10_000.0,
                yaw: be_i16(p, 4) as f32 / 10_000.0,
            }))
        }
        CRSF_FRAMETYPE_FLIGHT_MODE => {
            let end = p.iter().position(|&b| b == 0).ok_or(FrameError::Truncated)?;
            let text = core::str::from_utf8(&p[..end])
                .map_err(|_| FrameError::Unsupported(CRSF_FRAMETYPE_FLIGHT_MODE))?;
            // Disarmed modes carry a trailing '*'.
            let (name, armed) = match text.strip_suffix('*') {
                Some(name) => (name, false),
                None => (text, true),
            };
            Ok(Telemetry::FlightMode {
                mode: FlightMode::from_crsf_name(name),
                armed,
            })
        }
        other => Err(FrameError::Unsupported(other)),
    }
}

/// Latest value of every telemetry stream.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkState {
    pub gps: Option<GpsFix>,
    pub battery: Option<BatteryReading>,
    pub vario: Option<Vario>,
    pub attitude: Option<Attitude>,
    pub mode: Option<FlightMode>,
    pub armed: bool,
    pub last_frame_us: u64,
}

impl LinkState {
    pub const EMPTY: Self = Self {
        gps: None,
        battery: None,
        vario: None,
        attitude: None,
        mode: None,
        armed: false,
        last_frame_us: 0,
    };

    pub fn apply(&mut self, telemetry: Telemetry, now_us: u64) {
        match telemetry {
            Telemetry::Gps(fix) => self.gps = Some(fix),
            Telemetry::Battery(reading) => self.battery = Some(reading),
            Telemetry::Vario(vario) => self.vario = Some(vario),
            Telemetry::Attitude(attitude) => self.attitude = Some(attitude),
            Telemetry::FlightMode { mode, armed } => {
                self.mode = Some(mode);
                self.armed = armed;
            }
        }
        self.last_frame_us = now_us;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_bytes(frame_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let n = build_frame(&mut buf, frame_type, payload).unwrap();
        buf[..n].to_vec()
    }

    fn feed(parser: &mut CrsfParser, bytes: &[u8]) -> Vec<Result<Frame, FrameError>> {
        bytes.iter().filter_map(|&b| parser.push_byte(b)).collect()
    }

    #[test]
    fn crc_matches_known_vector() {
        // Standard CRSF check value for poly 0xD5.
        assert_eq!(crc8_d5(b"123456789"), 0xBC);
    }

    #[test]
    fn parser_resyncs_after_garbage() {
        let mut parser = CrsfParser::new();
        let mut stream = vec![0x00, 0x13, 0x77];
        stream.extend(frame_bytes(CRSF_FRAMETYPE_ATTITUDE, &[0, 0, 0, 0, 0, 0]));
        let results = feed(&mut parser, &stream);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().frame_type, CRSF_FRAMETYPE_ATTITUDE);
    }

    #[test]
    fn corrupted_frame_reports_bad_crc() {
        let mut parser = CrsfParser::new();
        let mut bytes = frame_bytes(CRSF_FRAMETYPE_VARIO, &[0x27, 0x10, 0, 0]);
        bytes[4] ^= 0xFF;
        assert_eq!(feed(&mut parser, &bytes), vec![Err(FrameError::BadCrc)]);
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut parser = CrsfParser::new();
        assert_eq!(feed(&mut parser, &[CRSF_SYNC, 63]), vec![Err(FrameError::BadLength)]);
        assert_eq!(parse_frame(&[CRSF_SYNC, 10, 0x02, 0x00]), Err(FrameError::Truncated));
    }

    #[test]
    fn decodes_gps() {
        let mut p = [0u8; 15];
        p[0..4].copy_from_slice(&473_977_420i32.to_be_bytes());
        p[4..8].copy_from_slice(&85_455_940i32.to_be_bytes());
        p[8..10].copy_from_slice(&360u16.to_be_bytes()); // 36 km/h
        p[10..12].copy_from_slice(&9_000u16.to_be_bytes());
        p[12..14].copy_from_slice(&1_450u16.to_be_bytes());
        p[14] = 9;
        let frame = parse_frame(&frame_bytes(CRSF_FRAMETYPE_GPS, &p)).unwrap();
        let Telemetry::Gps(fix) = decode(&frame).unwrap() else {
            panic!("not gps");
        };
        assert!((fix.ground_speed_mps - 10.0).abs() < 1e-4);
        assert_eq!(fix.course_deg, 90.0);
        assert_eq!(fix.altitude_m, 450.0);
        assert_eq!(fix.satellites, 9);
    }

    #[test]
    fn decodes_battery_and_vario() {
        let p = [0x00, 0xA8, 0x00, 0x7B, 0x00, 0x01, 0xF4, 80];
        let frame = parse_frame(&frame_bytes(CRSF_FRAMETYPE_BATTERY_SENSOR, &p)).unwrap();
        let Telemetry::Battery(b) = decode(&frame).unwrap() else {
            panic!("not battery");
        };
        assert!((b.voltage - 16.8).abs() < 1e-4);
        assert!((b.current - 12.3).abs() < 1e-4);
        assert_eq!(b.consumed_mah, 500);
        assert_eq!(b.remaining_percent, 80);

        // 25 m in decimetres, climbing 1.5 m/s.
        let mut p = [0u8; 4];
        p[0..2].copy_from_slice(&10_250u16.to_be_bytes());
        p[2..4].copy_from_slice(&150i16.to_be_bytes());
        let frame = parse_frame(&frame_bytes(CRSF_FRAMETYPE_VARIO, &p)).unwrap();
        assert_eq!(
            decode(&frame).unwrap(),
            Telemetry::Vario(Vario {
                altitude_m: 25.0,
                vertical_speed_mps: 1.5
            })
        );
        assert_eq!(unpack_altitude(0x8000 | 3_000), 3_000.0);
    }

    #[test]
    fn decodes_flight_mode_and_arming() {
        let frame = parse_frame(&frame_bytes(CRSF_FRAMETYPE_FLIGHT_MODE, b"AUTO\0")).unwrap();
        assert_eq!(
            decode(&frame).unwrap(),
            Telemetry::FlightMode {
                mode: FlightMode::Auto,
                armed: true
            }
        );
        let frame = parse_frame(&frame_bytes(CRSF_FRAMETYPE_FLIGHT_MODE, b"LOIT*\0")).unwrap();
        assert_eq!(
            decode(&frame).unwrap(),
            Telemetry::FlightMode {
                mode: FlightMode::Loiter,
                armed: false
            }
        );
        let frame = parse_frame(&frame_bytes(CRSF_FRAMETYPE_FLIGHT_MODE, b"AUTO")).unwrap();
        assert_eq!(decode(&frame), Err(FrameError::Truncated));
    }

    #[test]
    fn short_payload_and_unknown_type() {
        let frame = parse_frame(&frame_bytes(CRSF_FRAMETYPE_ATTITUDE, &[0, 1])).unwrap();
        assert_eq!(decode(&frame), Err(FrameError::Truncated));
        let frame = parse_frame(&frame_bytes(0x16, &[0; 22])).unwrap();
        assert_eq!(decode(&frame), Err(FrameError::Unsupported(0x16)));
    }

    #[test]
    fn mode_request_round_trips_through_parser() {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let n = build_mode_request(&mut buf, FlightMode::Rtl).unwrap();
        let frame = parse_frame(&buf[..n]).unwrap();
        assert_eq!(frame.frame_type, CRSF_FRAMETYPE_COMMAND);

        let p = frame.payload();
        assert_eq!(&p[..4], &[0xC8, 0xEC, CRSF_COMMAND_FC, CRSF_SUBCOMMAND_SET_MODE]);
        assert_eq!(&p[4..8], b"RTL\0");
        let mut inner = vec![CRSF_FRAMETYPE_COMMAND];
        inner.extend_from_slice(&p[..p.len() - 1]);
        assert_eq!(crc8_ba(&inner), p[p.len() - 1]);

        assert_eq!(
            build_mode_request(&mut buf, FlightMode::Unknown),
            Err(FrameError::Unsupported(CRSF_FRAMETYPE_COMMAND))
        );
    }

    #[test]
    fn link_state_keeps_latest() {
        let mut state = LinkState::EMPTY;
        state.apply(
            Telemetry::FlightMode {
                mode: FlightMode::Guided,
                armed: true,
            },
            1_000,
        );
        state.apply(
            Telemetry::Attitude(Attitude {
                roll: 0.1,
                pitch: 0.0,
                yaw: 1.0,
            }),
            2_000,
        );
        assert_eq!(state.mode, Some(FlightMode::Guided));
        assert!(state.armed);
        assert_eq!(state.attitude.unwrap().yaw, 1.0);
        assert_eq!(state.last_frame_us, 2_000);
    }
}
