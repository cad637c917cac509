//! System passthrough (component 0x00).

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use unifylink_engine::{Frame, Handler, Link};
use unifylink_frame::SYSTEM;

use crate::error::Result;
use crate::shared::{lock, Observer};

/// Raw system channel. Payloads of any length up to the frame limit are
/// passed through undecoded; the last one is cached.
#[derive(Debug, Clone)]
pub struct System {
    link: Link,
    last: Arc<Mutex<Bytes>>,
    on_raw: Observer<Bytes>,
}

impl System {
    pub const COMPONENT_ID: u8 = SYSTEM;
    pub const RAW_ID: u8 = 1;

    pub fn new(link: &Link) -> Self {
        let system = Self {
            link: link.clone(),
            last: Arc::new(Mutex::new(Bytes::new())),
            on_raw: Observer::new(),
        };

        let (last, observer) = (Arc::clone(&system.last), system.on_raw.clone());
        system.link.register(
            SYSTEM,
            Self::RAW_ID,
            Handler::raw(move |frame: &Frame| {
                *lock(&last) = frame.payload.clone();
                observer.notify(&frame.payload);
            }),
        );
        system
    }

    /// Last payload received.
    pub fn last_payload(&self) -> Bytes {
        lock(&self.last).clone()
    }

    pub fn send_raw(&self, payload: &[u8]) -> Result<usize> {
        Ok(self.link.encode_and_enqueue(SYSTEM, Self::RAW_ID, payload)?)
    }

    pub fn on_raw<F>(&self, callback: F)
    where
        F: FnMut(&Bytes) + Send + 'static,
    {
        self.on_raw.set(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_payloads_of_any_length_pass_through() {
        let link = Link::default();
        let system = System::new(&link);
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lengths);
        system.on_raw(move |payload| sink.lock().unwrap().push(payload.len()));

        system.send_raw(b"").unwrap();
        system.send_raw(b"ping").unwrap();
        system.send_raw(&[0x5A; 512]).unwrap();
        link.push_received_bytes(&link.drain_outbound()).unwrap();
        link.run_parse_pass();

        assert_eq!(*lengths.lock().unwrap(), vec![0, 4, 512]);
        assert_eq!(system.last_payload().len(), 512);
        assert_eq!(link.stats().success_count, 3);
    }

    #[test]
    fn oversized_raw_payload_is_rejected() {
        let system = System::new(&Link::default());
        let err = system.send_raw(&[0u8; 513]).unwrap_err();
        assert!(matches!(
            err,
            crate::ComponentError::Link(ref link_err) if link_err.is_payload_too_large()
        ));
    }
}
