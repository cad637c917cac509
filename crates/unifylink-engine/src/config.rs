use unifylink_frame::{FrameConfig, MAX_FRAME_LEN};

/// Default send queue budget: four maximum-size frames.
pub const DEFAULT_QUEUE_BYTES: usize = 4 * MAX_FRAME_LEN;

/// Default receive accumulator budget: four maximum-size frames.
pub const DEFAULT_RECEIVE_BYTES: usize = 4 * MAX_FRAME_LEN;

/// Configuration for a link engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Frame codec settings (payload limit, integrity mode).
    pub frame: FrameConfig,
    /// Maximum bytes held by the send queue. Default: 2080.
    pub max_queue_bytes: usize,
    /// Maximum bytes held by the receive accumulator. Default: 2080.
    /// Never smaller than one maximum-size frame, so a pending frame can
    /// always complete.
    pub max_receive_bytes: usize,
}

impl LinkConfig {
    /// Receive budget actually enforced.
    pub fn effective_receive_bytes(&self) -> usize {
        self.max_receive_bytes.max(self.frame.max_frame_len())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            max_queue_bytes: DEFAULT_QUEUE_BYTES,
            max_receive_bytes: DEFAULT_RECEIVE_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_budget_never_below_one_frame() {
        let config = LinkConfig {
            max_receive_bytes: 16,
            ..LinkConfig::default()
        };
        assert_eq!(config.effective_receive_bytes(), MAX_FRAME_LEN);
        assert_eq!(
            LinkConfig::default().effective_receive_bytes(),
            DEFAULT_RECEIVE_BYTES
        );
    }
}
