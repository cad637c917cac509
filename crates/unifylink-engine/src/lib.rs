//! Protocol engine for Unify Link.
//!
//! The [`Engine`] owns everything a link endpoint mutates: the receive
//! accumulator and its synchronizer, the dispatch registry, the bounded send
//! queue and the statistics counters. [`Link`] wraps an engine in a mutex so
//! a transport-read thread, a parse loop and command callers can share it.
//!
//! Malformed input never surfaces as an error from a parse pass; it is
//! absorbed and counted. Only caller-recoverable conditions (oversized
//! payloads, a full queue, a full receive buffer) are returned as errors.

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod link;
pub mod message;
pub mod queue;
pub mod registry;
pub mod stats;
pub mod sync;

pub use config::{LinkConfig, DEFAULT_QUEUE_BYTES, DEFAULT_RECEIVE_BYTES};
pub use driver::{LinkDriver, PollReport};
pub use engine::{Engine, ParseReport};
pub use error::{LinkError, PayloadError, Result};
pub use link::Link;
pub use message::WireMessage;
pub use queue::SendQueue;
pub use registry::{Dispatch, Handler, Registry};
pub use stats::LinkStats;
pub use sync::{DiscardReason, SyncEvent, SyncState, Synchronizer};
pub use unifylink_frame::{Frame, FrameConfig, FrameError, Integrity};
