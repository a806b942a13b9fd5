//! Constants for the ASCII sensor protocol

// Frame markers
pub const STX: u8 = 0x02; // Frame start
pub const ETX: u8 = 0x03; // Frame end

// Length field: 4 uppercase hex digits directly after STX
pub const LENGTH_FIELD_DIGITS: usize = 4;
/// STX + length digits + ETX
pub const FRAME_OVERHEAD: usize = 1 + LENGTH_FIELD_DIGITS + 1;

pub const FIELD_SEPARATOR: char = ',';

// Command names
pub const CMD_SET_ACCESS_LEVEL: &str = "SetAccessLevel";
pub const CMD_SENSOR_START: &str = "SensorStart";
pub const CMD_SENSOR_STOP: &str = "SensorStop";
pub const CMD_SENSOR_SCAN_INFO: &str = "SensorScanInfo";
pub const CMD_SCAN_DATA_CONFIG: &str = "LSScanDataConfig"; // Scan window query/write
pub const CMD_SCAN_DATA: &str = "ScanData"; // Spontaneous scan notification

// Section tokens inside a scan notification
pub const TOKEN_DIST: &str = "DIST1";
pub const TOKEN_RSSI: &str = "RSSI1";

// Scan header layout, relative to the DIST1 field index
pub const OFFSET_SCAN_COUNTER: usize = 9;
pub const OFFSET_SCAN_FREQ: usize = 6;
pub const OFFSET_MEAS_FREQ: usize = 5;
pub const OFFSET_ANGLE_BEGIN: usize = 4;
pub const OFFSET_ANGLE_RESOL: usize = 3;
pub const OFFSET_AMOUNT_OF_DATA: usize = 2;

// Fixed-point scales
pub const ANGLE_SCALE: f32 = 10_000.0; // 1 degree = 0x2710
pub const DISTANCE_SCALE: f32 = 1_000.0; // metres -> millimetres

/// Default access code sent with SetAccessLevel
pub const DEFAULT_ACCESS_CODE: &str = "0000";
