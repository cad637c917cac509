use serde::Serialize;

/// Snapshot of link counters.
///
/// All counters only increase over the life of an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Frames delivered to a handler (including answered read requests).
    pub success_count: u64,
    /// Garbage runs: noise, false sync markers, checksum failures. A
    /// contiguous run of rejected bytes counts once.
    pub transport_error_count: u64,
    /// Intact frames that could not be delivered: unknown key, wrong
    /// length, or content rejected by the decoder.
    pub decode_error_count: u64,
    /// Sequence ids skipped between consecutive received frames.
    pub sequence_gap_count: u64,
    /// Bytes accepted into the receive accumulator.
    pub bytes_received: u64,
    /// Bytes handed to the transport by drains.
    pub bytes_drained: u64,
    /// Frames accepted by the send queue.
    pub frames_enqueued: u64,
    /// Frames refused by the send queue or the payload limit.
    pub enqueue_rejected: u64,
    /// Receive pushes refused because the accumulator was full.
    pub receive_overflow: u64,
}

impl LinkStats {
    /// Total errors of every kind seen on the receive path.
    pub fn total_errors(&self) -> u64 {
        self.transport_error_count
            .saturating_add(self.decode_error_count)
            .saturating_add(self.receive_overflow)
    }
}

pub(crate) fn bump(counter: &mut u64, by: u64) {
    *counter = counter.saturating_add(by);
}
