use unifylink_frame::FrameError;

/// Errors returned by link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Frame-level error (payload too large for the configured limit).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Appending the frame would exceed the send queue budget.
    #[error("send queue full ({needed} bytes needed, {available} available)")]
    QueueFull { needed: usize, available: usize },

    /// The receive accumulator cannot hold the pushed bytes.
    #[error("receive buffer overflow ({len} bytes pushed, {available} available)")]
    ReceiveOverflow { len: usize, available: usize },

    /// An I/O error occurred on the driven stream.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The driven stream reached end of file.
    #[error("link closed by peer")]
    Closed,
}

impl LinkError {
    /// True if the caller should drain the queue and retry.
    pub fn is_queue_full(&self) -> bool {
        matches!(self, LinkError::QueueFull { .. })
    }

    /// True if the payload can never be sent under the current limit.
    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, LinkError::Frame(FrameError::PayloadTooLarge { .. }))
    }
}

/// Errors a typed decoder reports for an intact frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// The payload is not the fixed size of the registered message.
    #[error("payload length mismatch (expected {expected} bytes, got {actual})")]
    Length { expected: usize, actual: usize },

    /// A per-instance message addressed a slot that does not exist.
    #[error("instance {index} out of range (max {max})")]
    InstanceOutOfRange { index: usize, max: usize },

    /// The decoder rejected the content for another reason.
    #[error("invalid payload: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;
