//! ASCII sensor protocol codec
//!
//! - [`frame`]: STX/ETX stream framing
//! - [`command`]: outbound frame encoding
//! - [`message`]: payload classification and scan decoding
//! - [`fixed`]: fixed-point angle/distance encodings

pub mod command;
pub mod constants;
pub mod fixed;
pub mod frame;
pub mod message;

pub use command::{encode_command, encode_frame};
pub use frame::FrameDecoder;
pub use message::{ClassTag, Message};
