use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, Bytes};

use crate::engine::ParseReport;
use crate::error::{LinkError, Result};
use crate::link::Link;

const READ_CHUNK_SIZE: usize = 512;

/// What one [`LinkDriver::poll_once`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub bytes_read: usize,
    pub bytes_written: usize,
    pub parse: ParseReport,
}

/// Pumps a [`Link`] over any blocking `Read + Write` stream (a serial port,
/// a TCP socket, a pipe).
///
/// Configure a read timeout on the stream so `poll_once` returns when the
/// peer is quiet; `WouldBlock` and `TimedOut` are treated as "no data".
pub struct LinkDriver<T> {
    inner: T,
    link: Link,
    pending_tx: Bytes,
}

impl<T: Read + Write> LinkDriver<T> {
    pub fn new(inner: T, link: Link) -> Self {
        Self {
            inner,
            link,
            pending_tx: Bytes::new(),
        }
    }

    /// Flush queued frames, read whatever is available, run a parse pass,
    /// then flush again so replies go out in the same cycle.
    ///
    /// Outbound frames are written before the read, which may block on a
    /// stream without a read timeout.
    ///
    /// Returns `Err(LinkError::Closed)` when the stream reaches EOF.
    pub fn poll_once(&mut self) -> Result<PollReport> {
        let mut bytes_written = self.flush_outbound()?;
        let bytes_read = self.read_available()?;
        let parse = self.link.run_parse_pass();
        bytes_written += self.flush_outbound()?;
        Ok(PollReport {
            bytes_read,
            bytes_written,
            parse,
        })
    }

    /// Read one chunk into the link's receive accumulator.
    pub fn read_available(&mut self) -> Result<usize> {
        let room = self.link.receive_capacity().min(READ_CHUNK_SIZE);
        if room == 0 {
            return Ok(0);
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk[..room]) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(n) => {
                    self.link.push_received_bytes(&chunk[..n])?;
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_idle(&err) => return Ok(0),
                Err(err) => return Err(LinkError::Io(err)),
            }
        }
    }

    /// Write queued frames to the stream.
    ///
    /// Bytes the stream does not accept yet are kept and written first on
    /// the next call, so frames are never reordered or split across drains.
    pub fn flush_outbound(&mut self) -> Result<usize> {
        if self.pending_tx.is_empty() {
            self.pending_tx = self.link.drain_outbound();
        }

        let mut written = 0;
        while !self.pending_tx.is_empty() {
            match self.inner.write(&self.pending_tx) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(n) => {
                    self.pending_tx.advance(n);
                    written += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_idle(&err) => break,
                Err(err) => return Err(LinkError::Io(err)),
            }
        }

        if written > 0 {
            loop {
                match self.inner.flush() {
                    Ok(()) => break,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => return Err(LinkError::Io(err)),
                }
            }
        }
        Ok(written)
    }

    /// Bytes drained from the link but not yet accepted by the stream.
    pub fn pending_bytes(&self) -> usize {
        self.pending_tx.len()
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the driver and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn is_idle(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
