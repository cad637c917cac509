use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, try_decode, Frame, FrameConfig, SYNC};
use crate::error::{FrameError, Result};

/// `tokio_util` codec for framed byte streams.
///
/// Decoding resynchronizes the same way the engine's receive synchronizer
/// does: bytes before a sync marker are skipped, and a sync marker whose
/// frame fails validation is dropped so scanning can resume one byte later.
/// Encoding stamps each outgoing frame with the codec's own wrapping
/// sequence counter.
#[derive(Debug, Clone, Default)]
pub struct UnifyCodec {
    config: FrameConfig,
    next_seq: u8,
    discarded: u64,
}

impl UnifyCodec {
    /// Create a codec with explicit configuration.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            next_seq: 0,
            discarded: 0,
        }
    }

    /// Total bytes skipped while resynchronizing.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    /// Current codec configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn skip(&mut self, src: &mut BytesMut, count: usize) {
        src.advance(count);
        self.discarded = self.discarded.saturating_add(count as u64);
    }
}

impl Decoder for UnifyCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            match src.iter().position(|&byte| byte == SYNC) {
                Some(0) => {}
                Some(offset) => self.skip(src, offset),
                None => {
                    let len = src.len();
                    self.skip(src, len);
                    return Ok(None);
                }
            }

            match try_decode(src, &self.config) {
                Ok(Some((frame, consumed))) => {
                    src.advance(consumed);
                    return Ok(Some(frame));
                }
                Ok(None) => {
                    src.reserve(self.config.max_frame_len().saturating_sub(src.len()));
                    return Ok(None);
                }
                Err(err) if err.is_resync() => {
                    tracing::debug!(error = %err, "dropping false sync byte");
                    self.skip(src, 1);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Encoder<Frame> for UnifyCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let frame = frame.with_seq(self.next_seq);
        encode_frame(&frame, &self.config, dst)?;
        self.next_seq = self.next_seq.wrapping_add(1);
        Ok(())
    }
}
