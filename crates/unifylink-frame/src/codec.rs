use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::crc::{crc16, crc16_update};
use crate::error::{FrameError, Result};

/// Frame header: sync (1) + seq (1) + component (1) + data (1)
/// + length/flags (2) + check word (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Sync marker that starts every frame.
pub const SYNC: u8 = 0xA0;

/// Largest length the 13-bit length field can express.
pub const MAX_PAYLOAD_LIMIT: usize = 0x1FFF;

/// Default maximum payload size, matching the firmware's receive buffers.
pub const DEFAULT_MAX_PAYLOAD: usize = 512;

/// Largest frame under the default payload limit.
pub const MAX_FRAME_LEN: usize = HEADER_SIZE + DEFAULT_MAX_PAYLOAD;

const LENGTH_MASK: u16 = 0x1FFF;
const FLAG_SHIFT: u16 = 13;
const FLAG_MASK: u8 = 0x07;
/// Bytes of the header covered by the CRC (everything before the check word).
const CHECKED_HEADER_LEN: usize = 6;

/// How the check word at header bytes 6..8 is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Integrity {
    /// CRC-16/CCITT-FALSE over header bytes 0..6 and the payload.
    /// Flags are limited to the 3 bits of the length word.
    #[default]
    Crc16,
    /// No integrity check. Byte 6 carries the full 8-bit flags field and
    /// byte 7 is reserved (zero).
    None,
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Values above 8191 are clamped to the
    /// 13-bit field limit. Default: 512.
    pub max_payload_size: usize,
    /// Check word handling. Default: CRC-16.
    pub integrity: Integrity,
}

impl FrameConfig {
    /// The payload limit actually enforced.
    pub fn effective_max_payload(&self) -> usize {
        self.max_payload_size.min(MAX_PAYLOAD_LIMIT)
    }

    /// Largest frame this configuration can produce or accept.
    pub fn max_frame_len(&self) -> usize {
        HEADER_SIZE + self.effective_max_payload()
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            integrity: Integrity::Crc16,
        }
    }
}

/// The fixed 8-byte header, as parsed from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub seq: u8,
    pub component_id: u8,
    pub data_id: u8,
    /// Raw little-endian length word: low 13 bits length, high 3 bits flags.
    pub length_word: u16,
    /// Raw check word (bytes 6..8).
    pub check: [u8; 2],
}

impl FrameHeader {
    /// Parse a header from the first [`HEADER_SIZE`] bytes of `src`.
    ///
    /// Returns `Ok(None)` if fewer than [`HEADER_SIZE`] bytes are available.
    pub fn parse(src: &[u8]) -> Result<Option<Self>> {
        let Some(&first) = src.first() else {
            return Ok(None);
        };
        if first != SYNC {
            return Err(FrameError::InvalidSync { found: first });
        }
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut cursor = &src[1..HEADER_SIZE];
        let seq = cursor.get_u8();
        let component_id = cursor.get_u8();
        let data_id = cursor.get_u8();
        let length_word = cursor.get_u16_le();
        let check = [cursor.get_u8(), cursor.get_u8()];

        Ok(Some(Self {
            seq,
            component_id,
            data_id,
            length_word,
            check,
        }))
    }

    /// Declared payload length (13 bits).
    pub fn payload_len(&self) -> usize {
        usize::from(self.length_word & LENGTH_MASK)
    }

    /// Flags as interpreted under the given integrity mode.
    pub fn flags(&self, integrity: Integrity) -> u8 {
        match integrity {
            Integrity::Crc16 => (self.length_word >> FLAG_SHIFT) as u8,
            Integrity::None => self.check[0],
        }
    }

    /// Total wire size of the frame this header announces.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_len()
    }
}

/// A decoded frame: address, sequencing and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sender-assigned sequence id.
    pub seq: u8,
    /// Subsystem selector.
    pub component_id: u8,
    /// Message-type selector within the component.
    pub data_id: u8,
    /// Opaque flags owned by higher layers.
    pub flags: u8,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame with sequence id and flags zeroed.
    pub fn new(component_id: u8, data_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            seq: 0,
            component_id,
            data_id,
            flags: 0,
            payload: payload.into(),
        }
    }

    /// Set the sequence id.
    pub fn with_seq(mut self, seq: u8) -> Self {
        self.seq = seq;
        self
    }

    /// Set the flags.
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// The (component id, data id) dispatch key.
    pub fn key(&self) -> (u8, u8) {
        (self.component_id, self.data_id)
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encode this frame into a fresh buffer.
    pub fn to_bytes(&self, config: &FrameConfig) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self, config, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode a frame into the wire format.
///
/// Wire format (little-endian):
/// ```text
/// ┌──────┬─────┬───────────┬─────────┬─────────────────┬────────────┬─────────┐
/// │ 0xA0 │ Seq │ Component │ Data id │ Len(13)|Flg(3)  │ Check word │ Payload │
/// │ (1B) │(1B) │   (1B)    │  (1B)   │     (2B LE)     │  (2B LE)   │ (Len B) │
/// └──────┴─────┴───────────┴─────────┴─────────────────┴────────────┴─────────┘
/// ```
///
/// Under [`Integrity::Crc16`] only the low 3 bits of `frame.flags` are
/// carried.
pub fn encode_frame(frame: &Frame, config: &FrameConfig, dst: &mut BytesMut) -> Result<()> {
    let max = config.effective_max_payload();
    if frame.payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: frame.payload.len(),
            max,
        });
    }

    let length_word = (u16::from(frame.flags & FLAG_MASK) << FLAG_SHIFT)
        | (frame.payload.len() as u16 & LENGTH_MASK);

    let start = dst.len();
    dst.reserve(frame.wire_size());
    dst.put_u8(SYNC);
    dst.put_u8(frame.seq);
    dst.put_u8(frame.component_id);
    dst.put_u8(frame.data_id);
    dst.put_u16_le(length_word);

    match config.integrity {
        Integrity::Crc16 => {
            let crc = crc16_update(
                crc16(&dst[start..start + CHECKED_HEADER_LEN]),
                &frame.payload,
            );
            dst.put_u16_le(crc);
        }
        Integrity::None => {
            dst.put_u8(frame.flags);
            dst.put_u8(0);
        }
    }

    dst.put_slice(&frame.payload);
    Ok(())
}

/// Try to decode one frame from the start of `window`.
///
/// - `Ok(None)`: incomplete, wait for more bytes.
/// - `Err(_)`: the window does not start with a valid frame; the caller
///   should drop a byte and rescan (see [`FrameError::is_resync`]).
/// - `Ok(Some((frame, consumed)))`: a frame of exactly `consumed` bytes.
///
/// Never consumes input.
pub fn try_decode(window: &[u8], config: &FrameConfig) -> Result<Option<(Frame, usize)>> {
    let Some(header) = FrameHeader::parse(window)? else {
        return Ok(None);
    };

    let max = config.effective_max_payload();
    let payload_len = header.payload_len();
    if payload_len > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max,
        });
    }

    let total = header.frame_len();
    if window.len() < total {
        return Ok(None);
    }

    let payload = &window[HEADER_SIZE..total];
    verify(&header, &window[..CHECKED_HEADER_LEN], payload, config.integrity)?;

    let frame = Frame {
        seq: header.seq,
        component_id: header.component_id,
        data_id: header.data_id,
        flags: header.flags(config.integrity),
        payload: Bytes::copy_from_slice(payload),
    };
    Ok(Some((frame, total)))
}

/// Decode a frame from a buffer, consuming its bytes on success.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On error nothing is consumed.
pub fn decode_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Frame>> {
    match try_decode(src, config)? {
        Some((frame, consumed)) => {
            src.advance(consumed);
            Ok(Some(frame))
        }
        None => Ok(None),
    }
}

fn verify(
    header: &FrameHeader,
    checked_header: &[u8],
    payload: &[u8],
    integrity: Integrity,
) -> Result<()> {
    match integrity {
        Integrity::Crc16 => {
            let expected = u16::from_le_bytes(header.check);
            let actual = crc16_update(crc16(checked_header), payload);
            if expected != actual {
                return Err(FrameError::ChecksumMismatch { expected, actual });
            }
            Ok(())
        }
        Integrity::None => Ok(()),
    }
}
