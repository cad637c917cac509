//! Sync-marked binary framing for motor-control links.
//!
//! Every frame on the wire carries a fixed 8-byte header:
//! - A sync marker byte (`0xA0`) for stream resynchronization
//! - A sender-assigned 8-bit sequence id
//! - A two-level address: component id and data id
//! - A 13-bit payload length packed with 3 flag bits
//! - A 16-bit check word (CRC-16 by default)
//!
//! Decoding never consumes input on its own; callers decide how to advance
//! their buffers, which is what the receive synchronizer in
//! `unifylink-engine` builds on.

pub mod codec;
pub mod component;
pub mod crc;
pub mod error;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::UnifyCodec;
pub use codec::{
    decode_frame, encode_frame, try_decode, Frame, FrameConfig, FrameHeader, Integrity,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAX_FRAME_LEN, MAX_PAYLOAD_LIMIT, SYNC,
};
pub use component::{component_name, is_builtin, ENCODERS, EXAMPLES, MOTORS, SYSTEM, UPDATE};
pub use crc::{crc16, crc16_update, CRC16_INIT};
pub use error::{FrameError, Result};
