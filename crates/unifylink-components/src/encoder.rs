//! Absolute encoder overlay (component 0x03).

use std::sync::{Arc, Mutex};

use bytes::{Buf, BufMut};
use serde::Serialize;
use unifylink_engine::{Handler, Link, PayloadError, WireMessage};
use unifylink_frame::ENCODERS;

use crate::error::Result;
use crate::shared::{lock, Observer};
use crate::text::str_from_fixed;

/// Encoders reported in one feedback table.
pub const MAX_ENCODERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EncoderErrorCode {
    #[default]
    Ok,
    Overflow,
    MagnetTooStrong,
    MagnetTooWeak,
    Internal,
    Other(u8),
}

impl From<u8> for EncoderErrorCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Overflow,
            2 => Self::MagnetTooStrong,
            3 => Self::MagnetTooWeak,
            255 => Self::Internal,
            other => Self::Other(other),
        }
    }
}

impl From<EncoderErrorCode> for u8 {
    fn from(code: EncoderErrorCode) -> Self {
        match code {
            EncoderErrorCode::Ok => 0,
            EncoderErrorCode::Overflow => 1,
            EncoderErrorCode::MagnetTooStrong => 2,
            EncoderErrorCode::MagnetTooWeak => 3,
            EncoderErrorCode::Internal => 255,
            EncoderErrorCode::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EncoderFeedback {
    pub position: u16,
    pub velocity: i32,
    pub error_code: EncoderErrorCode,
}

impl WireMessage for EncoderFeedback {
    const WIRE_SIZE: usize = 7;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        Ok(Self {
            position: src.get_u16_le(),
            velocity: src.get_i32_le(),
            error_code: src.get_u8().into(),
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u16_le(self.position);
        dst.put_i32_le(self.velocity);
        dst.put_u8(self.error_code.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EncoderInfo {
    pub encoder_id: u8,
    /// Bits per revolution.
    pub resolution: u8,
    pub max_velocity: u32,
    pub max_position: u32,
    pub run_time: u32,
    pub model: [u8; 32],
    pub serial: [u8; 12],
    pub firmware_version: u32,
}

impl EncoderInfo {
    pub fn model_name(&self) -> String {
        str_from_fixed(&self.model).into_owned()
    }
}

impl WireMessage for EncoderInfo {
    const WIRE_SIZE: usize = 62;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        let encoder_id = src.get_u8();
        let resolution = src.get_u8();
        let max_velocity = src.get_u32_le();
        let max_position = src.get_u32_le();
        let run_time = src.get_u32_le();
        let mut model = [0u8; 32];
        src.copy_to_slice(&mut model);
        let mut serial = [0u8; 12];
        src.copy_to_slice(&mut serial);
        Ok(Self {
            encoder_id,
            resolution,
            max_velocity,
            max_position,
            run_time,
            model,
            serial,
            firmware_version: src.get_u32_le(),
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.encoder_id);
        dst.put_u8(self.resolution);
        dst.put_u32_le(self.max_velocity);
        dst.put_u32_le(self.max_position);
        dst.put_u32_le(self.run_time);
        dst.put_slice(&self.model);
        dst.put_slice(&self.serial);
        dst.put_u32_le(self.firmware_version);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EncoderSettings {
    /// Milliseconds between feedback frames.
    pub feedback_interval: u8,
    pub reset_id: u8,
}

impl WireMessage for EncoderSettings {
    const WIRE_SIZE: usize = 2;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        Ok(Self {
            feedback_interval: src.get_u8(),
            reset_id: src.get_u8(),
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.feedback_interval);
        dst.put_u8(self.reset_id);
    }
}

#[derive(Debug, Default)]
struct EncoderState {
    feedback: [EncoderFeedback; MAX_ENCODERS],
    info: EncoderInfo,
    settings: EncoderSettings,
}

/// Encoder overlay. Every message answers read requests with its cached
/// value.
#[derive(Debug, Clone)]
pub struct Encoders {
    link: Link,
    state: Arc<Mutex<EncoderState>>,
    /// Held from cache update to enqueue so the cache matches the last
    /// frame sent.
    command: Arc<Mutex<()>>,
    on_feedback: Observer<[EncoderFeedback; MAX_ENCODERS]>,
    on_info: Observer<EncoderInfo>,
    on_settings: Observer<EncoderSettings>,
}

impl Encoders {
    pub const COMPONENT_ID: u8 = ENCODERS;
    pub const FEEDBACK_ID: u8 = 1;
    pub const INFO_ID: u8 = 2;
    pub const SETTINGS_ID: u8 = 3;

    pub fn new(link: &Link) -> Self {
        let encoders = Self {
            link: link.clone(),
            state: Arc::new(Mutex::new(EncoderState::default())),
            command: Arc::new(Mutex::new(())),
            on_feedback: Observer::new(),
            on_info: Observer::new(),
            on_settings: Observer::new(),
        };
        encoders.register_handlers();
        encoders
    }

    fn register_handlers(&self) {
        let (state, observer, cached) = (
            Arc::clone(&self.state),
            self.on_feedback.clone(),
            Arc::clone(&self.state),
        );
        self.link.register(
            ENCODERS,
            Self::FEEDBACK_ID,
            Handler::typed(move |feedback: [EncoderFeedback; MAX_ENCODERS]| {
                lock(&state).feedback = feedback;
                observer.notify(&feedback);
                Ok(())
            })
            .with_responder(move || lock(&cached).feedback.to_payload()),
        );

        let (state, observer, cached) = (
            Arc::clone(&self.state),
            self.on_info.clone(),
            Arc::clone(&self.state),
        );
        self.link.register(
            ENCODERS,
            Self::INFO_ID,
            Handler::typed(move |info: EncoderInfo| {
                lock(&state).info = info;
                observer.notify(&info);
                Ok(())
            })
            .with_responder(move || lock(&cached).info.to_payload()),
        );

        let (state, observer, cached) = (
            Arc::clone(&self.state),
            self.on_settings.clone(),
            Arc::clone(&self.state),
        );
        self.link.register(
            ENCODERS,
            Self::SETTINGS_ID,
            Handler::typed(move |settings: EncoderSettings| {
                lock(&state).settings = settings;
                observer.notify(&settings);
                Ok(())
            })
            .with_responder(move || lock(&cached).settings.to_payload()),
        );
    }

    pub fn feedback(&self) -> [EncoderFeedback; MAX_ENCODERS] {
        lock(&self.state).feedback
    }

    pub fn info(&self) -> EncoderInfo {
        lock(&self.state).info
    }

    pub fn settings(&self) -> EncoderSettings {
        lock(&self.state).settings
    }

    /// Cache and send the feedback table.
    pub fn send_feedback(&self, feedback: [EncoderFeedback; MAX_ENCODERS]) -> Result<usize> {
        let _command = lock(&self.command);
        lock(&self.state).feedback = feedback;
        self.send(Self::FEEDBACK_ID, &feedback)
    }

    /// Cache and send the info block.
    pub fn send_info(&self, info: EncoderInfo) -> Result<usize> {
        let _command = lock(&self.command);
        lock(&self.state).info = info;
        self.send(Self::INFO_ID, &info)
    }

    /// Cache and send the settings.
    pub fn send_settings(&self, settings: EncoderSettings) -> Result<usize> {
        let _command = lock(&self.command);
        lock(&self.state).settings = settings;
        self.send(Self::SETTINGS_ID, &settings)
    }

    pub fn request_feedback(&self) -> Result<usize> {
        Ok(self.link.request(ENCODERS, Self::FEEDBACK_ID)?)
    }

    pub fn request_info(&self) -> Result<usize> {
        Ok(self.link.request(ENCODERS, Self::INFO_ID)?)
    }

    pub fn request_settings(&self) -> Result<usize> {
        Ok(self.link.request(ENCODERS, Self::SETTINGS_ID)?)
    }

    pub fn on_feedback<F>(&self, callback: F)
    where
        F: FnMut(&[EncoderFeedback; MAX_ENCODERS]) + Send + 'static,
    {
        self.on_feedback.set(callback);
    }

    pub fn on_info<F>(&self, callback: F)
    where
        F: FnMut(&EncoderInfo) + Send + 'static,
    {
        self.on_info.set(callback);
    }

    pub fn on_settings<F>(&self, callback: F)
    where
        F: FnMut(&EncoderSettings) + Send + 'static,
    {
        self.on_settings.set(callback);
    }

    fn send<M: WireMessage>(&self, data_id: u8, message: &M) -> Result<usize> {
        Ok(self
            .link
            .encode_and_enqueue(ENCODERS, data_id, &message.to_payload())?)
    }
}
