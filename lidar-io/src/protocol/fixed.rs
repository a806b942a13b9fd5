//! Fixed-point numeric encodings used on the wire
//!
//! - Angles: degrees × 10000, signed 32-bit, sent as the two's complement bit
//!   pattern in uppercase hex (`-45.0` → `-450000` → `FFF92230`)
//! - Distances: metres × 1000, unsigned millimetres in uppercase hex
//! - Header counters: plain unsigned hex

use super::constants::{ANGLE_SCALE, DISTANCE_SCALE};
use crate::error::{Error, Result};

/// Convert degrees to the signed fixed-point wire value
#[inline]
pub fn angle_to_fixed(degrees: f32) -> i32 {
    (degrees * ANGLE_SCALE).round() as i32
}

/// Convert a signed fixed-point wire value back to degrees
#[inline]
pub fn fixed_to_angle(fixed: i32) -> f32 {
    fixed as f32 / ANGLE_SCALE
}

/// Encode degrees as an uppercase hex field (two's complement when negative)
pub fn angle_to_hex(degrees: f32) -> String {
    format!("{:X}", angle_to_fixed(degrees) as u32)
}

/// Decode an angle hex field into degrees
pub fn hex_to_angle(field: &str) -> Result<f32> {
    parse_hex_i32(field).map(fixed_to_angle)
}

/// Encode metres as an uppercase hex millimetre field
pub fn meters_to_hex(meters: f32) -> String {
    format!("{:X}", meters_to_mm(meters))
}

/// Quantize metres to integer millimetres (negative clamps to 0)
#[inline]
pub fn meters_to_mm(meters: f32) -> u32 {
    (meters.max(0.0) * DISTANCE_SCALE).round() as u32
}

/// Convert millimetres to metres
#[inline]
pub fn mm_to_meters(mm: u32) -> f32 {
    mm as f32 / DISTANCE_SCALE
}

/// Parse an unsigned hex field
pub fn parse_hex_u32(field: &str) -> Result<u32> {
    u32::from_str_radix(field.trim(), 16)
        .map_err(|e| Error::Protocol(format!("invalid hex field {:?}: {}", field, e)))
}

/// Parse a hex field as signed 32-bit two's complement
///
/// Values above `0x7FFFFFFF` are negative.
pub fn parse_hex_i32(field: &str) -> Result<i32> {
    let raw = parse_hex_u32(field)? as i64;
    let signed = if raw > 0x7FFF_FFFF {
        raw - 0x1_0000_0000
    } else {
        raw
    };
    Ok(signed as i32)
}
