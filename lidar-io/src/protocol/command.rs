//! Outbound frame encoding
//!
//! Every frame is built the same way:
//!
//! ```text
//! payload = "," + tag + "," + name [ "," + args ]
//! length  = 1 (STX) + 4 (length digits) + len(payload) + 1 (ETX)
//! frame   = STX + "{length:04X}" + payload + ETX
//! ```
//!
//! Encoding is pure: no I/O and no shared state.

use super::constants::*;
use super::fixed::{angle_to_hex, meters_to_mm};
use super::message::ClassTag;
use crate::types::{ScanRecord, ScanWindow};
use std::fmt::Write;

/// Pick the class tag for an outbound command
///
/// The scan-window command is a write when it carries arguments and a
/// read otherwise. Unknown commands default to a method call.
pub fn command_tag(name: &str, has_args: bool) -> ClassTag {
    match name {
        CMD_SET_ACCESS_LEVEL | CMD_SENSOR_START | CMD_SENSOR_STOP => ClassTag::MethodCall,
        CMD_SENSOR_SCAN_INFO => ClassTag::ReadRequest,
        CMD_SCAN_DATA_CONFIG if has_args => ClassTag::WriteRequest,
        CMD_SCAN_DATA_CONFIG => ClassTag::ReadRequest,
        _ => ClassTag::MethodCall,
    }
}

/// Encode a client command with optional comma-joined arguments
pub fn encode_command(name: &str, args: Option<&str>) -> Vec<u8> {
    let args = args.filter(|a| !a.is_empty());
    let tag = command_tag(name, args.is_some());
    encode_frame(tag, name, args)
}

/// Encode one frame from its tag, command name and argument string
pub fn encode_frame(tag: ClassTag, name: &str, args: Option<&str>) -> Vec<u8> {
    let mut payload = String::with_capacity(32 + args.map_or(0, str::len));
    payload.push(FIELD_SEPARATOR);
    payload.push_str(tag.as_str());
    payload.push(FIELD_SEPARATOR);
    payload.push_str(name);
    if let Some(args) = args {
        payload.push(FIELD_SEPARATOR);
        payload.push_str(args);
    }

    let total_len = FRAME_OVERHEAD + payload.len();
    let mut frame = Vec::with_capacity(total_len);
    frame.push(STX);
    frame.extend_from_slice(format!("{:04X}", total_len).as_bytes());
    frame.extend_from_slice(payload.as_bytes());
    frame.push(ETX);
    frame
}

/// Arguments for a scan-window write: `minHex,maxHex`
pub fn scan_range_args(min_angle: f32, max_angle: f32) -> String {
    format!("{},{}", angle_to_hex(min_angle), angle_to_hex(max_angle))
}

/// Generic method acknowledgment: `sRA,<name>,1`
pub fn encode_ack(name: &str) -> Vec<u8> {
    encode_frame(ClassTag::MethodAck, name, Some("1"))
}

/// Write acknowledgment: `sWA,<name>`
pub fn encode_write_ack(name: &str) -> Vec<u8> {
    encode_frame(ClassTag::WriteAck, name, None)
}

/// Scan-window query reply: `sRA,LSScanDataConfig,<min>,<max>,<res>`
pub fn encode_scan_window_reply(window: &ScanWindow) -> Vec<u8> {
    let args = format!(
        "{},{},{}",
        angle_to_hex(window.min_angle),
        angle_to_hex(window.max_angle),
        angle_to_hex(window.resolution)
    );
    encode_frame(ClassTag::MethodAck, CMD_SCAN_DATA_CONFIG, Some(args.as_str()))
}

/// Scan notification (`sSN,ScanData`)
///
/// Field layout after the command name:
///
/// | Field | Content |
/// |-------|---------|
/// | 3 | version (1) |
/// | 4 | device status (0) |
/// | 5 | scan counter |
/// | 6 | time since start (µs) |
/// | 7 | transmit time (µs) |
/// | 8 | scan frequency |
/// | 9 | measurement frequency |
/// | 10 | angle begin (signed ×10000) |
/// | 11 | angle resolution (×10000) |
/// | 12 | amount of data |
/// | 13 | data channel count |
/// | 14 | `DIST1` |
/// | 15.. | distances (mm) |
///
/// An `RSSI1` section with one raw value per sample follows when the record
/// carries signal strengths.
pub fn encode_scan_notification(record: &ScanRecord, timestamp_us: u64) -> Vec<u8> {
    let channels = if record.rssi.is_empty() { 1 } else { 2 };
    let mut args = String::with_capacity(64 + record.ranges.len() * 5);

    // write! into a String cannot fail
    let _ = write!(
        args,
        "1,0,{:X},{:X},{:X},{:X},{:X},{:X},{:X},{:X},{:X},{}",
        record.scan_counter,
        timestamp_us as u32,
        timestamp_us as u32,
        record.scan_freq,
        record.meas_freq,
        record.angle_begin as u32,
        record.angle_resol,
        record.ranges.len(),
        channels,
        TOKEN_DIST,
    );
    for range in &record.ranges {
        let _ = write!(args, ",{:X}", meters_to_mm(*range));
    }

    if !record.rssi.is_empty() {
        let _ = write!(args, ",{}", TOKEN_RSSI);
        for value in &record.rssi {
            let _ = write!(args, ",{:X}", value.max(0.0).round() as u32);
        }
    }

    encode_frame(ClassTag::Notification, CMD_SCAN_DATA, Some(args.as_str()))
}
