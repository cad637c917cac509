//! Decoding of built-in component messages for display.

use serde::Serialize;
use serde_json::{json, Value};
use unifylink_components::{
    EncoderFeedback, EncoderInfo, EncoderSettings, Encoders, FirmwareCrc, MotorFeedback,
    MotorInfo, MotorPid, MotorSettings, MotorSetpoint, Motors, Update, MAX_ENCODERS, MAX_MOTORS,
};
use unifylink_engine::WireMessage;
use unifylink_frame::{is_builtin, Frame, ENCODERS, MOTORS, UPDATE};

/// Decode a frame addressed to a known message, if its payload fits.
pub fn describe(frame: &Frame) -> Option<Value> {
    if !is_builtin(frame.component_id) {
        return None;
    }
    match frame.key() {
        (MOTORS, Motors::FEEDBACK_ID) => decode::<[MotorFeedback; MAX_MOTORS]>(frame),
        (MOTORS, Motors::INFO_ID) => {
            let info = MotorInfo::from_payload(&frame.payload).ok()?;
            Some(with_model(to_value(&info)?, info.model_name()))
        }
        (MOTORS, Motors::SETTINGS_ID) => decode::<MotorSettings>(frame),
        (MOTORS, Motors::SETPOINT_ID) => decode::<[MotorSetpoint; MAX_MOTORS]>(frame),
        (MOTORS, Motors::PID_ID) => decode::<MotorPid>(frame),
        (ENCODERS, Encoders::FEEDBACK_ID) => decode::<[EncoderFeedback; MAX_ENCODERS]>(frame),
        (ENCODERS, Encoders::INFO_ID) => {
            let info = EncoderInfo::from_payload(&frame.payload).ok()?;
            Some(with_model(to_value(&info)?, info.model_name()))
        }
        (ENCODERS, Encoders::SETTINGS_ID) => decode::<EncoderSettings>(frame),
        (UPDATE, Update::CRC_ID) => {
            let crc = FirmwareCrc::from_payload(&frame.payload).ok()?;
            Some(json!({ "crc16": format!("{:#06x}", crc.crc16) }))
        }
        _ => None,
    }
}

fn decode<M: WireMessage + Serialize>(frame: &Frame) -> Option<Value> {
    to_value(&M::from_payload(&frame.payload).ok()?)
}

fn to_value<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

fn with_model(mut value: Value, model: String) -> Value {
    if let Some(object) = value.as_object_mut() {
        object.insert("model".to_string(), Value::String(model));
    }
    value
}
