use bytes::Bytes;
use unifylink_frame::Frame;

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::queue::SendQueue;
use crate::registry::{Dispatch, Handler, Registry};
use crate::stats::{bump, LinkStats};
use crate::sync::{DiscardReason, SyncEvent, SyncState, Synchronizer};

/// What one parse pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Frames extracted from the accumulator.
    pub frames: usize,
    /// Frames successfully handled.
    pub delivered: usize,
    /// Read requests answered.
    pub replies: usize,
    /// New garbage runs.
    pub transport_errors: usize,
    /// Intact frames that could not be delivered.
    pub decode_errors: usize,
    /// Bytes discarded while resynchronizing.
    pub discarded_bytes: usize,
}

/// A single link endpoint: receive path, dispatch, send queue and counters.
///
/// All methods take `&mut self`; wrap the engine in a [`crate::Link`] to
/// share it between threads.
#[derive(Debug)]
pub struct Engine {
    config: LinkConfig,
    sync: Synchronizer,
    registry: Registry,
    queue: SendQueue,
    stats: LinkStats,
    next_seq: u8,
    last_rx_seq: Option<u8>,
    tap: Tap,
}

impl Engine {
    /// Create an engine with explicit configuration.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            sync: Synchronizer::new(config.frame, config.effective_receive_bytes()),
            registry: Registry::new(),
            queue: SendQueue::new(config.max_queue_bytes),
            stats: LinkStats::default(),
            next_seq: 0,
            last_rx_seq: None,
            tap: Tap::default(),
            config,
        }
    }

    /// Append bytes read from the transport.
    ///
    /// Fails with [`LinkError::ReceiveOverflow`] if the accumulator cannot
    /// hold them; the push is dropped whole.
    pub fn push_received_bytes(&mut self, data: &[u8]) -> Result<()> {
        match self.sync.push(data) {
            Ok(()) => {
                bump(&mut self.stats.bytes_received, data.len() as u64);
                Ok(())
            }
            Err(err) => {
                bump(&mut self.stats.receive_overflow, 1);
                tracing::warn!(len = data.len(), error = %err, "receive push dropped");
                Err(err)
            }
        }
    }

    /// Extract and dispatch every complete frame in the accumulator.
    ///
    /// Never fails: malformed input is skipped and counted.
    pub fn run_parse_pass(&mut self) -> ParseReport {
        let mut report = ParseReport::default();
        while let Some(event) = self.sync.poll() {
            match event {
                SyncEvent::Discarded {
                    bytes,
                    reason,
                    new_run,
                } => {
                    report.discarded_bytes += bytes;
                    if reason == DiscardReason::Checksum {
                        tracing::warn!(bytes, "frame failed integrity check");
                    }
                    if new_run {
                        report.transport_errors += 1;
                        bump(&mut self.stats.transport_error_count, 1);
                        tracing::debug!(?reason, bytes, "resynchronizing receive stream");
                    }
                }
                SyncEvent::Frame(frame) => {
                    report.frames += 1;
                    tracing::trace!(
                        seq = frame.seq,
                        component_id = frame.component_id,
                        data_id = frame.data_id,
                        len = frame.payload.len(),
                        "frame received"
                    );
                    self.track_sequence(frame.seq);
                    self.dispatch(&frame, &mut report);
                }
            }
        }
        report
    }

    /// Encode a frame under the next sequence id and append it to the send
    /// queue. Returns the encoded size.
    ///
    /// The sequence id is consumed only if the frame is queued.
    pub fn encode_and_enqueue(
        &mut self,
        component_id: u8,
        data_id: u8,
        payload: &[u8],
    ) -> Result<usize> {
        self.enqueue_frame(Frame::new(
            component_id,
            data_id,
            Bytes::copy_from_slice(payload),
        ))
    }

    /// Like [`Engine::encode_and_enqueue`], keeping the frame's flags.
    /// The frame's own sequence id is overwritten.
    pub fn enqueue_frame(&mut self, frame: Frame) -> Result<usize> {
        let frame = frame.with_seq(self.next_seq);
        let queued = frame
            .to_bytes(&self.config.frame)
            .map_err(LinkError::from)
            .and_then(|encoded| self.queue.enqueue(&encoded).map(|()| encoded.len()));

        match queued {
            Ok(len) => {
                self.next_seq = self.next_seq.wrapping_add(1);
                bump(&mut self.stats.frames_enqueued, 1);
                tracing::trace!(
                    seq = frame.seq,
                    component_id = frame.component_id,
                    data_id = frame.data_id,
                    len,
                    "frame queued"
                );
                Ok(len)
            }
            Err(err) => {
                bump(&mut self.stats.enqueue_rejected, 1);
                tracing::debug!(
                    component_id = frame.component_id,
                    data_id = frame.data_id,
                    error = %err,
                    "frame not queued"
                );
                Err(err)
            }
        }
    }

    /// Queue a zero-length frame asking the peer for its current value.
    pub fn request(&mut self, component_id: u8, data_id: u8) -> Result<usize> {
        self.encode_and_enqueue(component_id, data_id, &[])
    }

    /// Take every queued byte for transmission.
    pub fn drain_outbound(&mut self) -> Bytes {
        let out = self.queue.drain();
        bump(&mut self.stats.bytes_drained, out.len() as u64);
        out
    }

    /// Install a handler for a key, replacing any previous registration.
    pub fn register(&mut self, component_id: u8, data_id: u8, handler: Handler) {
        self.registry.register(component_id, data_id, handler);
    }

    /// Accept any payload for a key without decoding it.
    pub fn register_any(&mut self, component_id: u8, data_id: u8) {
        self.registry.register_any(component_id, data_id);
    }

    /// Accept every key that has no handler yet.
    pub fn register_any_unclaimed(&mut self) -> usize {
        self.registry.register_any_unclaimed()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Counter snapshot.
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Observe every dispatched frame with its outcome and the counters
    /// as they stand right after it. Runs inside the parse pass, after the
    /// frame's handler; replaces any previous tap.
    pub fn on_dispatch<F>(&mut self, tap: F)
    where
        F: FnMut(&Frame, &Dispatch, &LinkStats) + Send + 'static,
    {
        self.tap = Tap(Some(Box::new(tap)));
    }

    /// Receive synchronizer state.
    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    /// Bytes waiting in the receive accumulator.
    pub fn buffered_bytes(&self) -> usize {
        self.sync.buffered()
    }

    /// Bytes that can still be pushed before overflow.
    pub fn receive_capacity(&self) -> usize {
        self.sync.capacity_left()
    }

    /// Bytes waiting in the send queue.
    pub fn queued_bytes(&self) -> usize {
        self.queue.len()
    }

    /// Sequence id the next queued frame will carry.
    pub fn next_seq(&self) -> u8 {
        self.next_seq
    }

    fn track_sequence(&mut self, seq: u8) {
        if let Some(last) = self.last_rx_seq {
            let expected = last.wrapping_add(1);
            if seq != expected {
                let skipped = seq.wrapping_sub(expected);
                bump(&mut self.stats.sequence_gap_count, u64::from(skipped));
                tracing::warn!(expected, seq, skipped, "sequence gap");
            }
        }
        self.last_rx_seq = Some(seq);
    }

    fn dispatch(&mut self, frame: &Frame, report: &mut ParseReport) {
        let outcome = self.registry.dispatch(frame);
        match &outcome {
            Dispatch::Delivered | Dispatch::Accepted => {
                report.delivered += 1;
                bump(&mut self.stats.success_count, 1);
            }
            Dispatch::Reply(payload) => {
                report.delivered += 1;
                report.replies += 1;
                bump(&mut self.stats.success_count, 1);
                if let Err(err) = self.enqueue_frame(Frame::new(
                    frame.component_id,
                    frame.data_id,
                    payload.clone(),
                )) {
                    tracing::warn!(
                        component_id = frame.component_id,
                        data_id = frame.data_id,
                        error = %err,
                        "read request reply dropped"
                    );
                }
            }
            outcome => {
                report.decode_errors += 1;
                bump(&mut self.stats.decode_error_count, 1);
                tracing::debug!(
                    component_id = frame.component_id,
                    data_id = frame.data_id,
                    len = frame.payload.len(),
                    ?outcome,
                    "frame not delivered"
                );
            }
        }
        if let Some(tap) = self.tap.0.as_mut() {
            tap(frame, &outcome, &self.stats);
        }
    }
}

type TapFn = Box<dyn FnMut(&Frame, &Dispatch, &LinkStats) + Send>;

/// Optional observer of every dispatch outcome.
#[derive(Default)]
struct Tap(Option<TapFn>);

impl std::fmt::Debug for Tap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0.is_some() { "Tap(set)" } else { "Tap(none)" })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}
