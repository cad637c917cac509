//! Framed binary link protocol for motor-control hardware.
//!
//! Unify Link carries small, fixed-layout messages between a host and a
//! device over any byte stream. Every frame is addressed by a
//! (component id, data id) pair, sequenced, and protected by a CRC-16.
//!
//! # Crate Structure
//!
//! - [`frame`]: wire format, CRC and the optional `tokio_util` codec
//! - [`engine`]: receive synchronizer, dispatch registry, send queue,
//!   statistics and the blocking stream driver
//! - [`components`]: motor, encoder, firmware-update and system overlays
//!   (behind the `components` feature)
//!
//! # Example
//!
//! ```
//! use unifylink::{Handler, Link};
//!
//! let link = Link::default();
//! link.register(1, 9, Handler::typed(|value: u16| {
//!     assert_eq!(value, 0x0102);
//!     Ok(())
//! }));
//!
//! link.encode_and_enqueue(1, 9, &[0x02, 0x01]).unwrap();
//! let wire = link.drain_outbound();
//! link.push_received_bytes(&wire).unwrap();
//! link.run_parse_pass();
//! assert_eq!(link.stats().success_count, 1);
//! ```

/// Re-export frame types.
pub mod frame {
    pub use unifylink_frame::*;
}

/// Re-export engine types.
pub mod engine {
    pub use unifylink_engine::*;
}

/// Re-export component overlays (requires `components` feature).
#[cfg(feature = "components")]
pub mod components {
    pub use unifylink_components::*;
}

pub use unifylink_engine::{
    Engine, Frame, FrameConfig, Handler, Integrity, Link, LinkConfig, LinkDriver, LinkError,
    LinkStats, PayloadError, WireMessage,
};
