//! Codec properties across the protocol modules.

use lidar_io::protocol::command::{encode_command, encode_scan_notification, scan_range_args};
use lidar_io::protocol::constants::*;
use lidar_io::protocol::fixed::{angle_to_hex, hex_to_angle};
use lidar_io::protocol::{ClassTag, FrameDecoder, Message};
use lidar_io::types::ScanRecord;

fn stream_of_commands() -> (Vec<u8>, usize) {
    let frames = [
        encode_command(CMD_SET_ACCESS_LEVEL, Some(DEFAULT_ACCESS_CODE)),
        encode_command(CMD_SENSOR_START, None),
        encode_command(CMD_SCAN_DATA_CONFIG, Some(scan_range_args(-45.0, 225.0).as_str())),
        encode_command(CMD_SENSOR_STOP, None),
    ];
    let count = frames.len();
    (frames.concat(), count)
}

fn decode_all(decoder: &mut FrameDecoder, chunks: &[&[u8]]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend(decoder.feed(chunk));
    }
    out
}

/// Splitting a stream at any single point yields the same frames
#[test]
fn test_chunk_split_invariance() {
    let (stream, count) = stream_of_commands();
    let whole = decode_all(&mut FrameDecoder::new(), &[stream.as_slice()]);
    assert_eq!(whole.len(), count);

    for split in 0..=stream.len() {
        let (a, b) = stream.split_at(split);
        let frames = decode_all(&mut FrameDecoder::new(), &[a, b]);
        assert_eq!(frames, whole, "split at {}", split);
    }
}

/// Byte-at-a-time delivery yields the same frames
#[test]
fn test_byte_by_byte_delivery() {
    let (stream, _) = stream_of_commands();
    let whole = decode_all(&mut FrameDecoder::new(), &[stream.as_slice()]);

    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for byte in &stream {
        frames.extend(decoder.feed(std::slice::from_ref(byte)));
    }
    assert_eq!(frames, whole);
    assert_eq!(decoder.pending(), 0);
}

/// Every command in the table survives encode -> frame -> parse
#[test]
fn test_command_table_round_trip() {
    let window_args = scan_range_args(0.0, 90.0);
    let table: [(&str, Option<&str>, ClassTag); 6] = [
        (CMD_SET_ACCESS_LEVEL, Some("0000"), ClassTag::MethodCall),
        (CMD_SENSOR_START, None, ClassTag::MethodCall),
        (CMD_SENSOR_STOP, None, ClassTag::MethodCall),
        (CMD_SENSOR_SCAN_INFO, None, ClassTag::ReadRequest),
        (CMD_SCAN_DATA_CONFIG, Some(window_args.as_str()), ClassTag::WriteRequest),
        (CMD_SCAN_DATA_CONFIG, None, ClassTag::ReadRequest),
    ];

    for (name, args, tag) in table {
        let frame = encode_command(name, args);
        let mut decoder = FrameDecoder::with_limits(1024, true);
        let payloads: Vec<_> = decoder.feed(&frame).collect();
        assert_eq!(payloads.len(), 1, "{} not framed", name);

        let msg = Message::parse(&payloads[0]).unwrap();
        assert_eq!(msg.command(), name);
        assert_eq!(msg.tag(), tag, "{}", name);
        let expected_args: Vec<String> = args
            .map(|a| a.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        assert_eq!(msg.args(), expected_args.as_slice());
    }
}

#[test]
fn test_negative_angle_round_trip() {
    let hex = angle_to_hex(-45.0);
    assert_eq!(hex, "FFF92230");
    assert_eq!(hex_to_angle(&hex).unwrap(), -45.0);
}

#[test]
fn test_scan_notification_round_trip() {
    let record = ScanRecord {
        scan_counter: 0x1234,
        scan_freq: 1000,
        meas_freq: 8110,
        angle_begin: -450_000,
        angle_resol: 3330,
        amount_of_data: 5,
        ranges: vec![0.0, 0.5, 1.234, 10.0, 100.0],
        rssi: vec![10.0, 20.0, 30.0, 40.0, 50.0],
    };
    let frame = encode_scan_notification(&record, 123_456);

    let payload = FrameDecoder::new().feed(&frame).next().unwrap();
    let msg = Message::parse(&payload).unwrap();
    assert_eq!(msg.tag(), ClassTag::Notification);
    assert_eq!(msg.command(), CMD_SCAN_DATA);

    let decoded = ScanRecord::decode(&msg).unwrap();
    assert_eq!(decoded, record);
    assert!(decoded.is_complete());
}

/// A scan cut short yields the samples present and keeps the declared count
#[test]
fn test_truncated_scan_partial_ranges() {
    let record = ScanRecord {
        amount_of_data: 6,
        angle_resol: 10_000,
        ranges: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        ..Default::default()
    };
    let frame = encode_scan_notification(&record, 0);
    let text = String::from_utf8(frame[1..frame.len() - 1].to_vec()).unwrap();

    // Drop the last two samples
    let cut: Vec<&str> = text.split(',').collect();
    let truncated = cut[..cut.len() - 2].join(",");

    let msg = Message::parse(truncated.as_bytes()).unwrap();
    let decoded = ScanRecord::decode(&msg).unwrap();
    assert_eq!(decoded.amount_of_data, 6);
    assert_eq!(decoded.ranges, vec![1.0, 2.0, 3.0, 4.0]);
    assert!(!decoded.is_complete());
}

/// Bad frames between good ones are skipped without losing the good ones
#[test]
fn test_malformed_frames_do_not_poison_stream() {
    let mut stream = b"noise".to_vec();
    stream.extend(encode_command(CMD_SENSOR_START, None));
    stream.extend([STX]);
    stream.extend(b"0010,XYZ,Nothing");
    stream.extend([ETX]);
    stream.extend(encode_command(CMD_SENSOR_STOP, None));

    let names: Vec<String> = FrameDecoder::new()
        .feed(&stream)
        .filter_map(|p| Message::parse(&p).ok())
        .map(|m| m.command().to_string())
        .collect();
    assert_eq!(names, vec![CMD_SENSOR_START, CMD_SENSOR_STOP]);
}
