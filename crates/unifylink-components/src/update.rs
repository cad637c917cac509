//! Firmware update overlay (component 0x02).
//!
//! An image travels as a sequence of fixed 256-byte chunks followed by the
//! CRC-16 of the unpadded image. The last chunk is zero-padded; the
//! receiver trims it using the image length it learns out of band.

use std::sync::{Arc, Mutex};

use bytes::{Buf, BufMut, Bytes};
use unifylink_engine::{Handler, Link, PayloadError, WireMessage};
use unifylink_frame::{crc16, UPDATE};

use crate::error::{ComponentError, Result};
use crate::shared::{lock, Observer};

/// Bytes of image data per chunk.
pub const CHUNK_SIZE: usize = 256;

/// One chunk of firmware image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareChunk {
    pub data: [u8; CHUNK_SIZE],
}

impl FirmwareChunk {
    /// Build a chunk from up to [`CHUNK_SIZE`] bytes, zero-padding the rest.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut data = [0u8; CHUNK_SIZE];
        let len = bytes.len().min(CHUNK_SIZE);
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }
}

impl Default for FirmwareChunk {
    fn default() -> Self {
        Self {
            data: [0u8; CHUNK_SIZE],
        }
    }
}

impl WireMessage for FirmwareChunk {
    const WIRE_SIZE: usize = CHUNK_SIZE;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        let mut data = [0u8; CHUNK_SIZE];
        src.copy_to_slice(&mut data);
        Ok(Self { data })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(&self.data);
    }
}

/// CRC-16 of a whole firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareCrc {
    pub crc16: u16,
}

impl WireMessage for FirmwareCrc {
    const WIRE_SIZE: usize = 2;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        Ok(Self {
            crc16: src.get_u16_le(),
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u16_le(self.crc16);
    }
}

/// A firmware image split into chunks.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    data: Bytes,
    crc: u16,
}

impl FirmwareImage {
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let crc = crc16(&data);
        Self { data, crc }
    }

    /// Image length in bytes, without padding.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// CRC-16/CCITT-FALSE of the unpadded image.
    pub fn crc(&self) -> u16 {
        self.crc
    }

    pub fn chunk_count(&self) -> usize {
        self.data.len().div_ceil(CHUNK_SIZE)
    }

    /// The chunk at `index`, or `None` past the end.
    pub fn chunk(&self, index: usize) -> Option<FirmwareChunk> {
        self.data
            .chunks(CHUNK_SIZE)
            .nth(index)
            .map(FirmwareChunk::from_slice)
    }

    pub fn chunks(&self) -> impl Iterator<Item = FirmwareChunk> + '_ {
        self.data.chunks(CHUNK_SIZE).map(FirmwareChunk::from_slice)
    }
}

/// Progress of sending one image through a bounded send queue.
///
/// Each [`FirmwareUpload::pump`] queues as many chunks as fit; call it again
/// after the queue has been drained.
#[derive(Debug, Clone)]
pub struct FirmwareUpload {
    image: FirmwareImage,
    next: usize,
}

impl FirmwareUpload {
    pub fn new(image: FirmwareImage) -> Self {
        Self { image, next: 0 }
    }

    /// Queue chunks, then the CRC, until the queue fills. Returns `true`
    /// once everything has been queued.
    pub fn pump(&mut self, update: &Update) -> Result<bool> {
        while !self.is_complete() {
            let queued = match self.image.chunk(self.next) {
                Some(chunk) => update.send_chunk(&chunk),
                None => update.send_crc(self.image.crc()),
            };
            match queued {
                Ok(_) => self.next += 1,
                Err(ComponentError::Link(err)) if err.is_queue_full() => {
                    tracing::debug!(
                        queued = self.next,
                        total = self.frames_total(),
                        "firmware upload paused on full send queue"
                    );
                    return Ok(false);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    /// Frames queued so far (chunks plus the trailing CRC).
    pub fn frames_queued(&self) -> usize {
        self.next
    }

    /// Frames the whole upload takes.
    pub fn frames_total(&self) -> usize {
        self.image.chunk_count() + 1
    }

    pub fn is_complete(&self) -> bool {
        self.next >= self.frames_total()
    }

    pub fn image(&self) -> &FirmwareImage {
        &self.image
    }
}

#[derive(Debug, Default)]
struct UpdateState {
    chunk: FirmwareChunk,
    crc: FirmwareCrc,
    chunks_received: u64,
}

/// Firmware update overlay. Both messages answer read requests with the
/// last value seen.
#[derive(Debug, Clone)]
pub struct Update {
    link: Link,
    state: Arc<Mutex<UpdateState>>,
    on_chunk: Observer<FirmwareChunk>,
    on_crc: Observer<FirmwareCrc>,
}

impl Update {
    pub const COMPONENT_ID: u8 = UPDATE;
    pub const CHUNK_ID: u8 = 1;
    pub const CRC_ID: u8 = 2;

    pub fn new(link: &Link) -> Self {
        let update = Self {
            link: link.clone(),
            state: Arc::new(Mutex::new(UpdateState::default())),
            on_chunk: Observer::new(),
            on_crc: Observer::new(),
        };
        update.register_handlers();
        update
    }

    fn register_handlers(&self) {
        let (state, observer, cached) = (
            Arc::clone(&self.state),
            self.on_chunk.clone(),
            Arc::clone(&self.state),
        );
        self.link.register(
            UPDATE,
            Self::CHUNK_ID,
            Handler::typed(move |chunk: FirmwareChunk| {
                {
                    let mut state = lock(&state);
                    state.chunk = chunk;
                    state.chunks_received += 1;
                }
                observer.notify(&chunk);
                Ok(())
            })
            .with_responder(move || lock(&cached).chunk.to_payload()),
        );

        let (state, observer, cached) = (
            Arc::clone(&self.state),
            self.on_crc.clone(),
            Arc::clone(&self.state),
        );
        self.link.register(
            UPDATE,
            Self::CRC_ID,
            Handler::typed(move |crc: FirmwareCrc| {
                lock(&state).crc = crc;
                observer.notify(&crc);
                Ok(())
            })
            .with_responder(move || lock(&cached).crc.to_payload()),
        );
    }

    pub fn last_chunk(&self) -> FirmwareChunk {
        lock(&self.state).chunk
    }

    pub fn last_crc(&self) -> u16 {
        lock(&self.state).crc.crc16
    }

    /// Chunks received since construction.
    pub fn chunks_received(&self) -> u64 {
        lock(&self.state).chunks_received
    }

    pub fn send_chunk(&self, chunk: &FirmwareChunk) -> Result<usize> {
        lock(&self.state).chunk = *chunk;
        self.send(Self::CHUNK_ID, chunk)
    }

    pub fn send_crc(&self, crc16: u16) -> Result<usize> {
        let crc = FirmwareCrc { crc16 };
        lock(&self.state).crc = crc;
        self.send(Self::CRC_ID, &crc)
    }

    pub fn on_chunk<F>(&self, callback: F)
    where
        F: FnMut(&FirmwareChunk) + Send + 'static,
    {
        self.on_chunk.set(callback);
    }

    pub fn on_crc<F>(&self, callback: F)
    where
        F: FnMut(&FirmwareCrc) + Send + 'static,
    {
        self.on_crc.set(callback);
    }

    fn send<M: WireMessage>(&self, data_id: u8, message: &M) -> Result<usize> {
        Ok(self
            .link
            .encode_and_enqueue(UPDATE, data_id, &message.to_payload())?)
    }
}
