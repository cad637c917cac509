use bytes::{Bytes, BytesMut};

use crate::error::{LinkError, Result};

/// Bounded FIFO of encoded frames awaiting transmission.
///
/// Frames are appended whole or not at all, so a drain always yields
/// complete frames in enqueue order.
#[derive(Debug)]
pub struct SendQueue {
    buf: BytesMut,
    max_bytes: usize,
}

impl SendQueue {
    /// Create a queue holding at most `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_bytes),
            max_bytes,
        }
    }

    /// Append an encoded frame.
    ///
    /// Fails with [`LinkError::QueueFull`] if it does not fit; the queue is
    /// left unchanged.
    pub fn enqueue(&mut self, encoded: &[u8]) -> Result<()> {
        let available = self.remaining();
        if encoded.len() > available {
            return Err(LinkError::QueueFull {
                needed: encoded.len(),
                available,
            });
        }
        self.buf.extend_from_slice(encoded);
        Ok(())
    }

    /// Take every queued byte, leaving the queue empty.
    pub fn drain(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Bytes currently queued.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes that can still be enqueued.
    pub fn remaining(&self) -> usize {
        self.max_bytes.saturating_sub(self.buf.len())
    }

    /// Configured byte budget.
    pub fn capacity(&self) -> usize {
        self.max_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let mut queue = SendQueue::new(64);
        queue.enqueue(b"first").unwrap();
        queue.enqueue(b"second").unwrap();
        assert_eq!(queue.len(), 11);
        assert_eq!(queue.drain().as_ref(), b"firstsecond");
        assert!(queue.is_empty());
    }

    #[test]
    fn rejects_when_full_and_keeps_contents() {
        let mut queue = SendQueue::new(8);
        queue.enqueue(b"12345").unwrap();

        let err = queue.enqueue(b"6789").unwrap_err();
        assert!(matches!(
            err,
            LinkError::QueueFull {
                needed: 4,
                available: 3
            }
        ));
        assert_eq!(queue.len(), 5);

        queue.enqueue(b"678").unwrap();
        assert_eq!(queue.remaining(), 0);
    }

    #[test]
    fn drain_frees_capacity() {
        let mut queue = SendQueue::new(4);
        queue.enqueue(b"abcd").unwrap();
        assert!(queue.enqueue(b"e").is_err());
        assert_eq!(queue.drain().len(), 4);
        queue.enqueue(b"e").unwrap();
        assert_eq!(queue.capacity(), 4);
    }

    #[test]
    fn drain_of_empty_queue_is_empty() {
        let mut queue = SendQueue::new(4);
        assert!(queue.drain().is_empty());
    }
}
