use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use unifylink_frame::Frame;

use crate::config::LinkConfig;
use crate::engine::{Engine, ParseReport};
use crate::error::Result;
use crate::registry::{Dispatch, Handler};
use crate::stats::LinkStats;

/// Cloneable, thread-safe handle to an [`Engine`].
///
/// Every operation locks the engine for its duration, so a push, a parse
/// pass, an enqueue or a drain never observes another half done. Handlers
/// run inside the parse pass while the lock is held and must not call back
/// into the same link.
#[derive(Debug, Clone)]
pub struct Link {
    inner: Arc<Mutex<Engine>>,
}

impl Link {
    /// Create a link with explicit configuration.
    pub fn new(config: LinkConfig) -> Self {
        Self::from_engine(Engine::new(config))
    }

    /// Wrap an existing engine.
    pub fn from_engine(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn push_received_bytes(&self, data: &[u8]) -> Result<()> {
        self.lock().push_received_bytes(data)
    }

    pub fn run_parse_pass(&self) -> ParseReport {
        self.lock().run_parse_pass()
    }

    pub fn encode_and_enqueue(&self, component_id: u8, data_id: u8, payload: &[u8]) -> Result<usize> {
        self.lock().encode_and_enqueue(component_id, data_id, payload)
    }

    pub fn enqueue_frame(&self, frame: Frame) -> Result<usize> {
        self.lock().enqueue_frame(frame)
    }

    pub fn request(&self, component_id: u8, data_id: u8) -> Result<usize> {
        self.lock().request(component_id, data_id)
    }

    pub fn drain_outbound(&self) -> Bytes {
        self.lock().drain_outbound()
    }

    pub fn register(&self, component_id: u8, data_id: u8, handler: Handler) {
        self.lock().register(component_id, data_id, handler);
    }

    pub fn register_any(&self, component_id: u8, data_id: u8) {
        self.lock().register_any(component_id, data_id);
    }

    pub fn register_any_unclaimed(&self) -> usize {
        self.lock().register_any_unclaimed()
    }

    pub fn stats(&self) -> LinkStats {
        self.lock().stats()
    }

    /// See [`Engine::on_dispatch`]. The tap runs with the link locked and
    /// must not call back into it.
    pub fn on_dispatch<F>(&self, tap: F)
    where
        F: FnMut(&Frame, &Dispatch, &LinkStats) + Send + 'static,
    {
        self.lock().on_dispatch(tap);
    }

    pub fn config(&self) -> LinkConfig {
        *self.lock().config()
    }

    /// Frames successfully handled under a key.
    pub fn hits(&self, component_id: u8, data_id: u8) -> u64 {
        self.lock().registry().hits(component_id, data_id)
    }

    /// Bytes that can still be pushed before overflow.
    pub fn receive_capacity(&self) -> usize {
        self.lock().receive_capacity()
    }

    // A handler that panicked leaves the engine consistent: dispatch runs
    // after the frame is consumed and counters are plain integers.
    fn lock(&self) -> MutexGuard<'_, Engine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn clones_share_one_engine() {
        let link = Link::default();
        let other = link.clone();
        other.encode_and_enqueue(1, 1, &[1, 2]).unwrap();
        assert_eq!(link.stats().frames_enqueued, 1);
        assert_eq!(link.drain_outbound().len(), 10);
    }

    #[test]
    fn concurrent_enqueue_produces_whole_frames() {
        let link = Link::default();
        let producers: Vec<_> = (0..4u8)
            .map(|id| {
                let link = link.clone();
                thread::spawn(move || {
                    for _ in 0..4 {
                        while link.encode_and_enqueue(id, 1, &[id; 16]).is_err() {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let received = Arc::new(AtomicUsize::new(0));
        let sink = Link::default();
        let counter = Arc::clone(&received);
        for id in 0..4u8 {
            let counter = Arc::clone(&counter);
            sink.register(
                id,
                1,
                Handler::raw(move |frame: &Frame| {
                    assert!(frame.payload.iter().all(|&b| b == frame.component_id));
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        for producer in producers {
            producer.join().unwrap();
        }
        sink.push_received_bytes(&link.drain_outbound()).unwrap();
        sink.run_parse_pass();

        assert_eq!(received.load(Ordering::SeqCst), 16);
        assert_eq!(sink.stats().sequence_gap_count, 0);
        assert_eq!(sink.stats().transport_error_count, 0);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let link = Link::default();
        link.register(0, 1, Handler::raw(|_| panic!("handler failure")));
        link.push_received_bytes(
            &Frame::new(0, 1, vec![1u8])
                .to_bytes(&Default::default())
                .unwrap(),
        )
        .unwrap();

        let worker = link.clone();
        let result = thread::spawn(move || worker.run_parse_pass()).join();
        assert!(result.is_err());

        link.encode_and_enqueue(0, 2, b"still usable").unwrap();
        assert_eq!(link.stats().frames_enqueued, 1);
    }
}
