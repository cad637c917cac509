//! Component overlays for Unify Link.
//!
//! Each overlay binds one component id on a [`Link`]: it registers a
//! decoder per data id at construction, keeps the last value received for
//! each message as cached component state, and offers helpers that encode
//! and queue outgoing messages.
//!
//! Observers (`on_*`) run inside the link's parse pass. They may read the
//! overlay's cached state but must not send through the same link.
//!
//! [`Link`]: unifylink_engine::Link

pub mod encoder;
pub mod error;
pub mod motor;
pub mod system;
pub mod text;
pub mod update;

mod shared;

pub use encoder::{
    EncoderErrorCode, EncoderFeedback, EncoderInfo, EncoderSettings, Encoders, MAX_ENCODERS,
};
pub use error::{ComponentError, Result};
pub use motor::{
    MotorErrorCode, MotorFeedback, MotorInfo, MotorMode, MotorPid, MotorSettings, MotorSetpoint,
    Motors, PidParams, MAX_MOTORS,
};
pub use system::System;
pub use update::{FirmwareChunk, FirmwareCrc, FirmwareImage, FirmwareUpload, Update, CHUNK_SIZE};
