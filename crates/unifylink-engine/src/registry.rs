use bytes::Bytes;
use unifylink_frame::Frame;

use crate::error::PayloadError;
use crate::message::WireMessage;

const KEY_SPACE: usize = 1 << 16;

type DecodeFn = Box<dyn FnMut(&Frame) -> Result<(), PayloadError> + Send>;
type RespondFn = Box<dyn Fn() -> Bytes + Send>;

/// Per-key receive handler.
///
/// A handler pairs a decoder with the callback that consumes its output.
/// Typed handlers enforce the message's fixed size before decoding; raw
/// handlers accept any payload length. An optional responder answers
/// zero-length read requests with the current value.
pub struct Handler {
    expected_len: Option<usize>,
    decode: DecodeFn,
    responder: Option<RespondFn>,
}

impl Handler {
    /// Decode payloads as `M` and pass them to `on_message`.
    ///
    /// The callback may reject a decoded message; that counts as a decode
    /// error.
    pub fn typed<M, F>(mut on_message: F) -> Self
    where
        M: WireMessage + 'static,
        F: FnMut(M) -> Result<(), PayloadError> + Send + 'static,
    {
        Self {
            expected_len: Some(M::WIRE_SIZE),
            decode: Box::new(move |frame: &Frame| on_message(M::from_payload(&frame.payload)?)),
            responder: None,
        }
    }

    /// Pass every frame for the key to `on_frame`, whatever its length.
    pub fn raw<F>(mut on_frame: F) -> Self
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        Self {
            expected_len: None,
            decode: Box::new(move |frame: &Frame| {
                on_frame(frame);
                Ok(())
            }),
            responder: None,
        }
    }

    /// Answer zero-length frames with the payload `respond` produces.
    pub fn with_responder<F>(mut self, respond: F) -> Self
    where
        F: Fn() -> Bytes + Send + 'static,
    {
        self.responder = Some(Box::new(respond));
        self
    }

    /// Fixed payload size, if the handler enforces one.
    pub fn expected_len(&self) -> Option<usize> {
        self.expected_len
    }

    /// True if zero-length frames are answered.
    pub fn responds(&self) -> bool {
        self.responder.is_some()
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("expected_len", &self.expected_len)
            .field("responds", &self.responder.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Handler(Handler),
    Wildcard,
}

#[derive(Debug, Default)]
struct Entry {
    slot: Slot,
    hits: u64,
}

/// Outcome of dispatching one intact frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The handler accepted the frame.
    Delivered,
    /// The key is registered as a wildcard; the frame counts as handled.
    Accepted,
    /// A read request; the payload to send back under the same key.
    Reply(Bytes),
    /// Nothing is registered for the key.
    Unregistered,
    /// The payload length does not match the registered message size.
    LengthMismatch { expected: usize, actual: usize },
    /// The decoder or callback rejected the content.
    Rejected(PayloadError),
}

impl Dispatch {
    /// True if the frame counts as successfully handled.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Dispatch::Delivered | Dispatch::Accepted | Dispatch::Reply(_)
        )
    }
}

/// Table mapping (component id, data id) to handlers.
///
/// All 65536 keys have a slot; registration replaces whatever was there.
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let mut entries = Vec::with_capacity(KEY_SPACE);
        entries.resize_with(KEY_SPACE, Entry::default);
        Self { entries }
    }

    /// Install `handler` for a key, replacing any previous registration.
    pub fn register(&mut self, component_id: u8, data_id: u8, handler: Handler) {
        self.install(component_id, data_id, Slot::Handler(handler));
    }

    /// Accept any payload for a key without decoding it.
    pub fn register_any(&mut self, component_id: u8, data_id: u8) {
        self.install(component_id, data_id, Slot::Wildcard);
    }

    /// Replace the slot for a key. Hit counts belong to the key and survive
    /// replacement.
    fn install(&mut self, component_id: u8, data_id: u8, slot: Slot) {
        self.entries[index(component_id, data_id)].slot = slot;
    }

    /// Mark every unregistered key as a wildcard. Returns how many keys
    /// were filled.
    pub fn register_any_unclaimed(&mut self) -> usize {
        let mut filled = 0;
        for entry in &mut self.entries {
            if matches!(entry.slot, Slot::Empty) {
                entry.slot = Slot::Wildcard;
                filled += 1;
            }
        }
        filled
    }

    /// True if anything (handler or wildcard) is registered for the key.
    pub fn is_registered(&self, component_id: u8, data_id: u8) -> bool {
        !matches!(self.entries[index(component_id, data_id)].slot, Slot::Empty)
    }

    /// Frames successfully handled under the key.
    pub fn hits(&self, component_id: u8, data_id: u8) -> u64 {
        self.entries[index(component_id, data_id)].hits
    }

    /// Keys with a handler or wildcard, in ascending order.
    pub fn registered_keys(&self) -> Vec<(u8, u8)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !matches!(entry.slot, Slot::Empty))
            .map(|(i, _)| key_of(i))
            .collect()
    }

    /// Route one intact frame to its handler.
    pub fn dispatch(&mut self, frame: &Frame) -> Dispatch {
        let entry = &mut self.entries[index(frame.component_id, frame.data_id)];
        let outcome = match &mut entry.slot {
            Slot::Empty => Dispatch::Unregistered,
            Slot::Wildcard => Dispatch::Accepted,
            Slot::Handler(handler) => match (&handler.responder, frame.payload.is_empty()) {
                (Some(respond), true) => Dispatch::Reply(respond()),
                _ => match handler.expected_len {
                    Some(expected) if expected != frame.payload.len() => {
                        Dispatch::LengthMismatch {
                            expected,
                            actual: frame.payload.len(),
                        }
                    }
                    _ => match (handler.decode)(frame) {
                        Ok(()) => Dispatch::Delivered,
                        Err(err) => Dispatch::Rejected(err),
                    },
                },
            },
        };
        if outcome.is_success() {
            entry.hits = entry.hits.saturating_add(1);
        }
        outcome
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("registered", &self.registered_keys().len())
            .finish()
    }
}

fn index(component_id: u8, data_id: u8) -> usize {
    (usize::from(component_id) << 8) | usize::from(data_id)
}

fn key_of(index: usize) -> (u8, u8) {
    ((index >> 8) as u8, index as u8)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn frame(component_id: u8, data_id: u8, payload: &[u8]) -> Frame {
        Frame::new(component_id, data_id, payload.to_vec())
    }

    #[test]
    fn replacing_a_registration_keeps_key_hits() {
        let mut registry = Registry::new();
        registry.register_any(4, 4);
        assert_eq!(registry.dispatch(&frame(4, 4, b"abc")), Dispatch::Accepted);

        registry.register(4, 4, Handler::typed(|_: u8| Ok(())));
        assert_eq!(
            registry.dispatch(&frame(4, 4, b"abc")),
            Dispatch::LengthMismatch {
                expected: 1,
                actual: 3
            }
        );
        assert_eq!(registry.dispatch(&frame(4, 4, &[7])), Dispatch::Delivered);
        assert_eq!(registry.hits(4, 4), 2);
        assert_eq!(registry.registered_keys(), vec![(4, 4)]);
    }

    #[test]
    fn unregistered_key() {
        let mut registry = Registry::new();
        assert_eq!(registry.dispatch(&frame(9, 9, b"x")), Dispatch::Unregistered);
        assert!(!registry.is_registered(9, 9));
    }

    #[test]
    fn typed_handler_checks_length_then_decodes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut registry = Registry::new();
        registry.register(
            1,
            2,
            Handler::typed(move |value: u16| {
                sink.lock().unwrap().push(value);
                Ok(())
            }),
        );

        assert_eq!(registry.dispatch(&frame(1, 2, &[0x34, 0x12])), Dispatch::Delivered);
        assert_eq!(
            registry.dispatch(&frame(1, 2, &[1, 2, 3])),
            Dispatch::LengthMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(*seen.lock().unwrap(), vec![0x1234]);
        assert_eq!(registry.hits(1, 2), 1);
    }

    #[test]
    fn callback_rejection_is_reported() {
        let mut registry = Registry::new();
        registry.register(
            1,
            3,
            Handler::typed(|value: u8| {
                if value < 8 {
                    Ok(())
                } else {
                    Err(PayloadError::InstanceOutOfRange {
                        index: usize::from(value),
                        max: 8,
                    })
                }
            }),
        );
        assert!(matches!(
            registry.dispatch(&frame(1, 3, &[8])),
            Dispatch::Rejected(PayloadError::InstanceOutOfRange { index: 8, .. })
        ));
        assert_eq!(registry.hits(1, 3), 0);
    }

    #[test]
    fn raw_handler_accepts_any_length() {
        let count = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&count);
        let mut registry = Registry::new();
        registry.register(
            0,
            1,
            Handler::raw(move |f: &Frame| *sink.lock().unwrap() += f.payload.len()),
        );

        registry.dispatch(&frame(0, 1, b""));
        registry.dispatch(&frame(0, 1, b"hello"));
        assert_eq!(*count.lock().unwrap(), 5);
        assert_eq!(registry.hits(0, 1), 2);
    }

    #[test]
    fn empty_payload_with_responder_is_read_request() {
        let mut registry = Registry::new();
        registry.register(
            1,
            1,
            Handler::typed(|_: u16| Ok(())).with_responder(|| Bytes::from_static(&[7, 0])),
        );

        assert_eq!(
            registry.dispatch(&frame(1, 1, b"")),
            Dispatch::Reply(Bytes::from_static(&[7, 0]))
        );
        assert_eq!(registry.hits(1, 1), 1);
    }

    #[test]
    fn empty_payload_without_responder_is_length_mismatch() {
        let mut registry = Registry::new();
        registry.register(1, 1, Handler::typed(|_: u16| Ok(())));
        assert_eq!(
            registry.dispatch(&frame(1, 1, b"")),
            Dispatch::LengthMismatch {
                expected: 2,
                actual: 0
            }
        );
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = Registry::new();
        registry.register(2, 2, Handler::typed(|_: u8| Ok(())));
        registry.register(2, 2, Handler::typed(|_: u16| Ok(())));
        assert_eq!(registry.dispatch(&frame(2, 2, &[1, 2])), Dispatch::Delivered);
        assert!(matches!(
            registry.dispatch(&frame(2, 2, &[1])),
            Dispatch::LengthMismatch { .. }
        ));

        registry.register_any(2, 2);
        assert_eq!(registry.dispatch(&frame(2, 2, &[1])), Dispatch::Accepted);
    }

    #[test]
    fn register_any_unclaimed_keeps_existing_handlers() {
        let mut registry = Registry::new();
        registry.register(1, 1, Handler::typed(|_: u16| Ok(())));

        let filled = registry.register_any_unclaimed();
        assert_eq!(filled, KEY_SPACE - 1);
        assert_eq!(registry.registered_keys().len(), KEY_SPACE);
        assert!(matches!(
            registry.dispatch(&frame(1, 1, &[1])),
            Dispatch::LengthMismatch { .. }
        ));
        assert_eq!(registry.dispatch(&frame(200, 7, b"?")), Dispatch::Accepted);
    }

    #[test]
    fn registered_keys_are_sorted() {
        let mut registry = Registry::new();
        registry.register_any(3, 1);
        registry.register_any(1, 5);
        registry.register_any(1, 2);
        assert_eq!(registry.registered_keys(), vec![(1, 2), (1, 5), (3, 1)]);
    }
}
