use bytes::{Buf, BytesMut};
use unifylink_frame::{try_decode, Frame, FrameConfig, FrameHeader, HEADER_SIZE, SYNC};

use crate::error::{LinkError, Result};

/// Position of the receive synchronizer within the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Scanning for a sync marker.
    SeekSync,
    /// A sync marker is at the front; waiting for the full header.
    AwaitHeader,
    /// Header accepted; waiting until `frame_len` bytes are buffered.
    AwaitPayload { frame_len: usize },
}

/// Why bytes were dropped from the front of the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Bytes before the next sync marker.
    Noise,
    /// A sync marker whose header declared a payload over the limit.
    Oversized,
    /// A complete frame whose check word did not match.
    Checksum,
}

/// One step of synchronizer progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A validated frame was extracted.
    Frame(Frame),
    /// Bytes were dropped. `new_run` is set on the first discard after a
    /// frame (or after startup), so a contiguous garbage run reports once.
    Discarded {
        bytes: usize,
        reason: DiscardReason,
        new_run: bool,
    },
}

/// Receive accumulator plus the state machine that finds frames in it.
///
/// Bytes go in with [`Synchronizer::push`]; [`Synchronizer::poll`] yields
/// frames and discards until no further progress is possible without more
/// input. A header whose length is never satisfied leaves the machine
/// waiting indefinitely.
#[derive(Debug)]
pub struct Synchronizer {
    buf: BytesMut,
    state: SyncState,
    config: FrameConfig,
    max_buffered: usize,
    in_garbage_run: bool,
}

impl Synchronizer {
    pub fn new(config: FrameConfig, max_buffered: usize) -> Self {
        let max_buffered = max_buffered.max(config.max_frame_len());
        Self {
            buf: BytesMut::with_capacity(max_buffered),
            state: SyncState::SeekSync,
            config,
            max_buffered,
            in_garbage_run: false,
        }
    }

    /// Append received bytes.
    ///
    /// Fails with [`LinkError::ReceiveOverflow`] if the accumulator cannot
    /// hold all of `data`; nothing is appended in that case.
    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        let available = self.capacity_left();
        if data.len() > available {
            return Err(LinkError::ReceiveOverflow {
                len: data.len(),
                available,
            });
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Advance the state machine by one event.
    ///
    /// Returns `None` when more input is needed.
    pub fn poll(&mut self) -> Option<SyncEvent> {
        loop {
            match self.state {
                SyncState::SeekSync => {
                    if self.buf.is_empty() {
                        return None;
                    }
                    match self.buf.iter().position(|&byte| byte == SYNC) {
                        Some(0) => self.state = SyncState::AwaitHeader,
                        Some(offset) => {
                            self.state = SyncState::AwaitHeader;
                            return Some(self.discard(offset, DiscardReason::Noise));
                        }
                        None => {
                            let len = self.buf.len();
                            return Some(self.discard(len, DiscardReason::Noise));
                        }
                    }
                }
                SyncState::AwaitHeader => {
                    let header = match FrameHeader::parse(&self.buf) {
                        Ok(Some(header)) => header,
                        Ok(None) => return None,
                        Err(_) => {
                            self.state = SyncState::SeekSync;
                            return Some(self.discard(1, DiscardReason::Noise));
                        }
                    };
                    if header.payload_len() > self.config.effective_max_payload() {
                        self.state = SyncState::SeekSync;
                        return Some(self.discard(1, DiscardReason::Oversized));
                    }
                    self.state = SyncState::AwaitPayload {
                        frame_len: header.frame_len(),
                    };
                }
                SyncState::AwaitPayload { frame_len } => {
                    if self.buf.len() < frame_len {
                        return None;
                    }
                    self.state = SyncState::SeekSync;
                    match try_decode(&self.buf[..frame_len], &self.config) {
                        Ok(Some((frame, consumed))) => {
                            self.buf.advance(consumed);
                            self.in_garbage_run = false;
                            return Some(SyncEvent::Frame(frame));
                        }
                        Ok(None) => return None,
                        Err(_) => return Some(self.discard(1, DiscardReason::Checksum)),
                    }
                }
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Bytes held in the accumulator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Bytes that can still be pushed.
    pub fn capacity_left(&self) -> usize {
        self.max_buffered.saturating_sub(self.buf.len())
    }

    fn discard(&mut self, bytes: usize, reason: DiscardReason) -> SyncEvent {
        self.buf.advance(bytes);
        let new_run = !self.in_garbage_run;
        self.in_garbage_run = true;
        SyncEvent::Discarded {
            bytes,
            reason,
            new_run,
        }
    }
}
