/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The window does not start with the sync marker.
    #[error("invalid sync byte 0x{found:02X} (expected 0xA0)")]
    InvalidSync { found: u8 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The check word stored in the header does not match the frame contents.
    #[error("frame checksum mismatch (header 0x{expected:04X}, computed 0x{actual:04X})")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True for errors that mean "this is not a frame start", i.e. the
    /// receiver should drop one byte and keep scanning.
    pub fn is_resync(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidSync { .. }
                | FrameError::PayloadTooLarge { .. }
                | FrameError::ChecksumMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
