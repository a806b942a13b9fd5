//! Inbound payload classification and scan decoding
//!
//! A frame payload (bytes between STX and ETX) is a comma-separated ASCII
//! field list:
//!
//! ```text
//! field 0: length (4 hex digits)
//! field 1: class tag (sMC, sRC, sWC, sRA, sWA, sSN)
//! field 2: command name
//! field 3..: command-specific
//! ```

use super::constants::*;
use super::fixed::{parse_hex_i32, parse_hex_u32};
use crate::error::{Error, Result};
use crate::types::ScanRecord;
use std::fmt;
use std::str::FromStr;

/// Protocol message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassTag {
    /// `sMC` - method call
    MethodCall,
    /// `sRC` - read request
    ReadRequest,
    /// `sWC` - write request
    WriteRequest,
    /// `sRA` - method/read acknowledgment
    MethodAck,
    /// `sWA` - write acknowledgment
    WriteAck,
    /// `sSN` - spontaneous notification
    Notification,
}

impl ClassTag {
    pub const fn as_str(self) -> &'static str {
        match self {
            ClassTag::MethodCall => "sMC",
            ClassTag::ReadRequest => "sRC",
            ClassTag::WriteRequest => "sWC",
            ClassTag::MethodAck => "sRA",
            ClassTag::WriteAck => "sWA",
            ClassTag::Notification => "sSN",
        }
    }
}

impl FromStr for ClassTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sMC" => Ok(ClassTag::MethodCall),
            "sRC" => Ok(ClassTag::ReadRequest),
            "sWC" => Ok(ClassTag::WriteRequest),
            "sRA" => Ok(ClassTag::MethodAck),
            "sWA" => Ok(ClassTag::WriteAck),
            "sSN" => Ok(ClassTag::Notification),
            other => Err(Error::Protocol(format!("unknown class tag {:?}", other))),
        }
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed protocol message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    tag: ClassTag,
    fields: Vec<String>,
}

impl Message {
    /// Classify one frame payload
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if !payload.is_ascii() {
            return Err(Error::Protocol("payload is not ASCII".to_string()));
        }
        let text = std::str::from_utf8(payload)
            .map_err(|e| Error::Protocol(format!("payload is not UTF-8: {}", e)))?;

        let fields: Vec<String> = text.split(FIELD_SEPARATOR).map(str::to_string).collect();
        if fields.len() < 3 {
            return Err(Error::Protocol(format!(
                "expected at least 3 fields, got {}",
                fields.len()
            )));
        }
        let tag = fields[1].parse::<ClassTag>()?;
        if fields[2].is_empty() {
            return Err(Error::Protocol("empty command name".to_string()));
        }

        Ok(Self { tag, fields })
    }

    pub fn tag(&self) -> ClassTag {
        self.tag
    }

    pub fn command(&self) -> &str {
        &self.fields[2]
    }

    /// Command-specific fields (index 3 onwards)
    pub fn args(&self) -> &[String] {
        &self.fields[3..]
    }

    /// All fields, including length, tag and command name
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Index of the first field equal to `token`
    pub fn find_token(&self, token: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == token)
    }

    /// Whether this message carries scan data
    pub fn is_scan(&self) -> bool {
        self.find_token(TOKEN_DIST).is_some()
    }
}

impl ScanRecord {
    /// Decode the scan header and data sections of a message
    ///
    /// Header fields are located relative to the `DIST1` token. Distances are
    /// millimetres converted to metres; signal strengths stay raw. A payload
    /// shorter than its declared `amountOfData` yields a partial record.
    pub fn decode(msg: &Message) -> Result<Self> {
        let fields = msg.fields();
        let d = msg
            .find_token(TOKEN_DIST)
            .ok_or_else(|| Error::Protocol(format!("missing {} section", TOKEN_DIST)))?;
        if d < OFFSET_SCAN_COUNTER {
            return Err(Error::Protocol(format!(
                "scan header too short: {} at field {}",
                TOKEN_DIST, d
            )));
        }

        let amount_of_data = parse_hex_u32(&fields[d - OFFSET_AMOUNT_OF_DATA])?;
        let ranges = read_section(fields, d, amount_of_data)?
            .into_iter()
            .map(|mm| mm as f32 / DISTANCE_SCALE)
            .collect::<Vec<_>>();

        let rssi = match msg.find_token(TOKEN_RSSI) {
            Some(r) => read_section(fields, r, amount_of_data)?
                .into_iter()
                .map(|v| v as f32)
                .collect(),
            None => Vec::new(),
        };

        if ranges.len() < amount_of_data as usize {
            log::debug!(
                "Truncated scan: {} of {} samples present",
                ranges.len(),
                amount_of_data
            );
        }

        Ok(Self {
            scan_counter: parse_hex_u32(&fields[d - OFFSET_SCAN_COUNTER])?,
            scan_freq: parse_hex_u32(&fields[d - OFFSET_SCAN_FREQ])?,
            meas_freq: parse_hex_u32(&fields[d - OFFSET_MEAS_FREQ])?,
            angle_begin: parse_hex_i32(&fields[d - OFFSET_ANGLE_BEGIN])?,
            angle_resol: parse_hex_u32(&fields[d - OFFSET_ANGLE_RESOL])?,
            amount_of_data,
            ranges,
            rssi,
        })
    }
}

/// Read up to `count` hex values following the token at `token_idx`
///
/// Stops at the end of the field list or at the next section token.
fn read_section(fields: &[String], token_idx: usize, count: u32) -> Result<Vec<u32>> {
    let available = fields.len().saturating_sub(token_idx + 1);
    let take = (count as usize).min(available);
    let mut values = Vec::with_capacity(take);
    for field in &fields[token_idx + 1..token_idx + 1 + take] {
        if field == TOKEN_RSSI || field == TOKEN_DIST {
            break;
        }
        values.push(parse_hex_u32(field)?);
    }
    Ok(values)
}
