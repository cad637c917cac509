//! Built-in component IDs.
//!
//! The component id selects the subsystem a frame belongs to; the data id is
//! scoped within it. Ids 0x00-0x04 are assigned, the rest are free for
//! application use.

/// Link-level system messages (raw passthrough).
pub const SYSTEM: u8 = 0x00;

/// Motor telemetry, configuration and setpoints.
pub const MOTORS: u8 = 0x01;

/// Firmware-update channel.
pub const UPDATE: u8 = 0x02;

/// Encoder telemetry and configuration.
pub const ENCODERS: u8 = 0x03;

/// Reserved for demo payloads.
pub const EXAMPLES: u8 = 0x04;

/// Returns a human-readable name for a component ID.
pub fn component_name(id: u8) -> &'static str {
    match id {
        SYSTEM => "SYSTEM",
        MOTORS => "MOTORS",
        UPDATE => "UPDATE",
        ENCODERS => "ENCODERS",
        EXAMPLES => "EXAMPLES",
        _ => "USER",
    }
}

/// Returns true if the component ID is one of the built-in components.
pub fn is_builtin(id: u8) -> bool {
    id <= EXAMPLES
}
