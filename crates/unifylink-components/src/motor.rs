//! Motor controller overlay (component 0x01).

use std::sync::{Arc, Mutex};

use bytes::{Buf, BufMut};
use serde::Serialize;
use unifylink_engine::{Handler, Link, PayloadError, WireMessage};
use unifylink_frame::MOTORS;

use crate::error::{check_index, ComponentError, Result};
use crate::shared::{lock, Observer};
use crate::text::str_from_fixed;

/// Motors addressed by one controller.
pub const MAX_MOTORS: usize = 8;

/// Motor fault state reported in feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MotorErrorCode {
    #[default]
    Ok,
    OverHeat,
    Internal,
    /// A code this library does not know, kept as sent.
    Other(u8),
}

impl From<u8> for MotorErrorCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::OverHeat,
            255 => Self::Internal,
            other => Self::Other(other),
        }
    }
}

impl From<MotorErrorCode> for u8 {
    fn from(code: MotorErrorCode) -> Self {
        match code {
            MotorErrorCode::Ok => 0,
            MotorErrorCode::OverHeat => 1,
            MotorErrorCode::Internal => 255,
            MotorErrorCode::Other(other) => other,
        }
    }
}

/// Control mode; selects how a setpoint is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MotorMode {
    #[default]
    Current,
    Speed,
    Position,
    Mit,
    Other(u8),
}

impl From<u8> for MotorMode {
    fn from(mode: u8) -> Self {
        match mode {
            0 => Self::Current,
            1 => Self::Speed,
            2 => Self::Position,
            3 => Self::Mit,
            other => Self::Other(other),
        }
    }
}

impl From<MotorMode> for u8 {
    fn from(mode: MotorMode) -> Self {
        match mode {
            MotorMode::Current => 0,
            MotorMode::Speed => 1,
            MotorMode::Position => 2,
            MotorMode::Mit => 3,
            MotorMode::Other(other) => other,
        }
    }
}

/// Periodic state of one motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MotorFeedback {
    pub position: u16,
    pub speed: i16,
    pub current: u16,
    pub temperature: i8,
    pub error_code: MotorErrorCode,
}

impl WireMessage for MotorFeedback {
    const WIRE_SIZE: usize = 8;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        Ok(Self {
            position: src.get_u16_le(),
            speed: src.get_i16_le(),
            current: src.get_u16_le(),
            temperature: src.get_i8(),
            error_code: src.get_u8().into(),
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u16_le(self.position);
        dst.put_i16_le(self.speed);
        dst.put_u16_le(self.current);
        dst.put_i8(self.temperature);
        dst.put_u8(self.error_code.into());
    }
}

/// Static description of one motor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MotorInfo {
    pub motor_id: u8,
    /// Gear reduction ratio.
    pub ratio: f32,
    /// rad/s
    pub max_speed: f32,
    /// A
    pub max_current: f32,
    /// Nm/A
    pub torque_constant: f32,
    pub max_position: u32,
    /// Hours
    pub run_time: u32,
    pub model: [u8; 32],
    pub serial: [u8; 12],
    pub firmware_version: u32,
}

impl MotorInfo {
    /// Model name up to its NUL terminator.
    pub fn model_name(&self) -> String {
        str_from_fixed(&self.model).into_owned()
    }
}

impl WireMessage for MotorInfo {
    const WIRE_SIZE: usize = 73;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        let motor_id = src.get_u8();
        let ratio = src.get_f32_le();
        let max_speed = src.get_f32_le();
        let max_current = src.get_f32_le();
        let torque_constant = src.get_f32_le();
        let max_position = src.get_u32_le();
        let run_time = src.get_u32_le();
        let mut model = [0u8; 32];
        src.copy_to_slice(&mut model);
        let mut serial = [0u8; 12];
        src.copy_to_slice(&mut serial);
        Ok(Self {
            motor_id,
            ratio,
            max_speed,
            max_current,
            torque_constant,
            max_position,
            run_time,
            model,
            serial,
            firmware_version: src.get_u32_le(),
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.motor_id);
        dst.put_f32_le(self.ratio);
        dst.put_f32_le(self.max_speed);
        dst.put_f32_le(self.max_current);
        dst.put_f32_le(self.torque_constant);
        dst.put_u32_le(self.max_position);
        dst.put_u32_le(self.run_time);
        dst.put_slice(&self.model);
        dst.put_slice(&self.serial);
        dst.put_u32_le(self.firmware_version);
    }
}

/// Per-motor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MotorSettings {
    pub motor_id: u8,
    /// Milliseconds between feedback frames.
    pub feedback_interval: u8,
    /// New id to assign to the motor.
    pub reset_id: u8,
    pub mode: MotorMode,
}

impl WireMessage for MotorSettings {
    const WIRE_SIZE: usize = 4;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        Ok(Self {
            motor_id: src.get_u8(),
            feedback_interval: src.get_u8(),
            reset_id: src.get_u8(),
            mode: src.get_u8().into(),
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.motor_id);
        dst.put_u8(self.feedback_interval);
        dst.put_u8(self.reset_id);
        dst.put_u8(self.mode.into());
    }
}

/// Command for one motor. Field meaning depends on the motor's mode:
///
/// | Mode     | `set`    | `set_extra` | `set_extra2` |
/// |----------|----------|-------------|--------------|
/// | Current  | current  | 0           | 0            |
/// | Speed    | speed    | 0           | 0            |
/// | Position | position | speed       | 0            |
/// | Mit      | position | speed       | current      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MotorSetpoint {
    pub set: i16,
    pub set_extra: i16,
    pub set_extra2: i16,
}

impl WireMessage for MotorSetpoint {
    const WIRE_SIZE: usize = 6;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        Ok(Self {
            set: src.get_i16_le(),
            set_extra: src.get_i16_le(),
            set_extra2: src.get_i16_le(),
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_i16_le(self.set);
        dst.put_i16_le(self.set_extra);
        dst.put_i16_le(self.set_extra2);
    }
}

/// Gains and limits of one control loop.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PidParams {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub feed_forward: f32,
    pub integral_limit: f32,
    pub output_limit: f32,
    pub deadband: f32,
}

impl WireMessage for PidParams {
    const WIRE_SIZE: usize = 28;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        Ok(Self {
            kp: src.get_f32_le(),
            ki: src.get_f32_le(),
            kd: src.get_f32_le(),
            feed_forward: src.get_f32_le(),
            integral_limit: src.get_f32_le(),
            output_limit: src.get_f32_le(),
            deadband: src.get_f32_le(),
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        for value in [
            self.kp,
            self.ki,
            self.kd,
            self.feed_forward,
            self.integral_limit,
            self.output_limit,
            self.deadband,
        ] {
            dst.put_f32_le(value);
        }
    }
}

/// Cascaded loop tuning of one motor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MotorPid {
    pub motor_id: u8,
    pub current: PidParams,
    pub speed: PidParams,
    pub position: PidParams,
}

impl WireMessage for MotorPid {
    const WIRE_SIZE: usize = 1 + 3 * PidParams::WIRE_SIZE;

    fn decode<B: Buf>(src: &mut B) -> std::result::Result<Self, PayloadError> {
        Ok(Self {
            motor_id: src.get_u8(),
            current: PidParams::decode(src)?,
            speed: PidParams::decode(src)?,
            position: PidParams::decode(src)?,
        })
    }

    fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.motor_id);
        self.current.encode(dst);
        self.speed.encode(dst);
        self.position.encode(dst);
    }
}

#[derive(Debug, Default)]
struct MotorState {
    feedback: [MotorFeedback; MAX_MOTORS],
    info: [MotorInfo; MAX_MOTORS],
    settings: [MotorSettings; MAX_MOTORS],
    setpoints: [MotorSetpoint; MAX_MOTORS],
    pid: [MotorPid; MAX_MOTORS],
}

impl MotorState {
    fn new() -> Self {
        let mut state = Self::default();
        for (id, (settings, pid)) in state.settings.iter_mut().zip(&mut state.pid).enumerate() {
            settings.motor_id = id as u8;
            pid.motor_id = id as u8;
        }
        for (id, info) in state.info.iter_mut().enumerate() {
            info.motor_id = id as u8;
        }
        state
    }
}

/// Motor controller overlay.
///
/// Feedback and setpoints are tables covering every motor and answer read
/// requests with the cached table. Info, settings and PID travel one motor
/// at a time and are stored at the `motor_id` they carry; an id of
/// [`MAX_MOTORS`] or more is rejected as a decode error.
#[derive(Debug, Clone)]
pub struct Motors {
    link: Link,
    state: Arc<Mutex<MotorState>>,
    /// Held from snapshot to enqueue so table frames leave in the order
    /// their snapshots were taken. Never taken by receive handlers.
    command: Arc<Mutex<()>>,
    on_feedback: Observer<[MotorFeedback; MAX_MOTORS]>,
    on_info: Observer<MotorInfo>,
    on_settings: Observer<MotorSettings>,
    on_setpoints: Observer<[MotorSetpoint; MAX_MOTORS]>,
    on_pid: Observer<MotorPid>,
}

impl Motors {
    pub const COMPONENT_ID: u8 = MOTORS;
    pub const FEEDBACK_ID: u8 = 1;
    pub const INFO_ID: u8 = 2;
    pub const SETTINGS_ID: u8 = 3;
    pub const SETPOINT_ID: u8 = 4;
    pub const PID_ID: u8 = 5;

    /// Bind the motor component on `link`, replacing any handlers already
    /// registered for its keys.
    pub fn new(link: &Link) -> Self {
        let motors = Self {
            link: link.clone(),
            state: Arc::new(Mutex::new(MotorState::new())),
            command: Arc::new(Mutex::new(())),
            on_feedback: Observer::new(),
            on_info: Observer::new(),
            on_settings: Observer::new(),
            on_setpoints: Observer::new(),
            on_pid: Observer::new(),
        };
        motors.register_handlers();
        motors
    }

    fn register_handlers(&self) {
        let (state, observer) = (Arc::clone(&self.state), self.on_feedback.clone());
        let cached = Arc::clone(&self.state);
        self.link.register(
            MOTORS,
            Self::FEEDBACK_ID,
            Handler::typed(move |feedback: [MotorFeedback; MAX_MOTORS]| {
                lock(&state).feedback = feedback;
                observer.notify(&feedback);
                Ok(())
            })
            .with_responder(move || lock(&cached).feedback.to_payload()),
        );

        let (state, observer) = (Arc::clone(&self.state), self.on_info.clone());
        self.link.register(
            MOTORS,
            Self::INFO_ID,
            Handler::typed(move |info: MotorInfo| {
                let index = instance(info.motor_id)?;
                lock(&state).info[index] = info;
                observer.notify(&info);
                Ok(())
            }),
        );

        let (state, observer) = (Arc::clone(&self.state), self.on_settings.clone());
        self.link.register(
            MOTORS,
            Self::SETTINGS_ID,
            Handler::typed(move |settings: MotorSettings| {
                let index = instance(settings.motor_id)?;
                lock(&state).settings[index] = settings;
                observer.notify(&settings);
                Ok(())
            }),
        );

        let (state, observer) = (Arc::clone(&self.state), self.on_setpoints.clone());
        let cached = Arc::clone(&self.state);
        self.link.register(
            MOTORS,
            Self::SETPOINT_ID,
            Handler::typed(move |setpoints: [MotorSetpoint; MAX_MOTORS]| {
                lock(&state).setpoints = setpoints;
                observer.notify(&setpoints);
                Ok(())
            })
            .with_responder(move || lock(&cached).setpoints.to_payload()),
        );

        let (state, observer) = (Arc::clone(&self.state), self.on_pid.clone());
        self.link.register(
            MOTORS,
            Self::PID_ID,
            Handler::typed(move |pid: MotorPid| {
                let index = instance(pid.motor_id)?;
                lock(&state).pid[index] = pid;
                observer.notify(&pid);
                Ok(())
            }),
        );
    }

    pub fn feedback(&self) -> [MotorFeedback; MAX_MOTORS] {
        lock(&self.state).feedback
    }

    pub fn info(&self, motor: u8) -> Result<MotorInfo> {
        let index = check_index(motor, MAX_MOTORS)?;
        Ok(lock(&self.state).info[index])
    }

    pub fn settings(&self, motor: u8) -> Result<MotorSettings> {
        let index = check_index(motor, MAX_MOTORS)?;
        Ok(lock(&self.state).settings[index])
    }

    pub fn setpoints(&self) -> [MotorSetpoint; MAX_MOTORS] {
        lock(&self.state).setpoints
    }

    pub fn pid(&self, motor: u8) -> Result<MotorPid> {
        let index = check_index(motor, MAX_MOTORS)?;
        Ok(lock(&self.state).pid[index])
    }

    /// Cached control mode of a motor.
    pub fn mode(&self, motor: u8) -> Result<MotorMode> {
        Ok(self.settings(motor)?.mode)
    }

    /// Command a current. The motor must be in [`MotorMode::Current`].
    pub fn set_current(&self, motor: u8, current: i16) -> Result<usize> {
        self.write_setpoint(
            motor,
            MotorMode::Current,
            MotorSetpoint {
                set: current,
                ..MotorSetpoint::default()
            },
        )
    }

    /// Command a speed. The motor must be in [`MotorMode::Speed`].
    pub fn set_speed(&self, motor: u8, speed: i16) -> Result<usize> {
        self.write_setpoint(
            motor,
            MotorMode::Speed,
            MotorSetpoint {
                set: speed,
                ..MotorSetpoint::default()
            },
        )
    }

    /// Command a position reached at `speed`. The motor must be in
    /// [`MotorMode::Position`].
    pub fn set_position(&self, motor: u8, position: u16, speed: i16) -> Result<usize> {
        self.write_setpoint(
            motor,
            MotorMode::Position,
            MotorSetpoint {
                set: position as i16,
                set_extra: speed,
                set_extra2: 0,
            },
        )
    }

    /// Command position, speed and current together. The motor must be in
    /// [`MotorMode::Mit`].
    pub fn set_mit(&self, motor: u8, position: u16, speed: i16, current: u16) -> Result<usize> {
        self.write_setpoint(
            motor,
            MotorMode::Mit,
            MotorSetpoint {
                set: position as i16,
                set_extra: speed,
                set_extra2: current as i16,
            },
        )
    }

    /// Change a motor's mode and send its settings.
    pub fn set_mode(&self, motor: u8, mode: MotorMode) -> Result<usize> {
        let index = check_index(motor, MAX_MOTORS)?;
        let _command = lock(&self.command);
        let settings = {
            let mut state = lock(&self.state);
            state.settings[index].motor_id = motor;
            state.settings[index].mode = mode;
            state.settings[index]
        };
        self.send(Self::SETTINGS_ID, &settings)
    }

    /// Cache and send the feedback table.
    pub fn send_feedback(&self, feedback: [MotorFeedback; MAX_MOTORS]) -> Result<usize> {
        let _command = lock(&self.command);
        lock(&self.state).feedback = feedback;
        self.send(Self::FEEDBACK_ID, &feedback)
    }

    /// Cache and send one motor's info.
    pub fn send_info(&self, info: MotorInfo) -> Result<usize> {
        let index = check_index(info.motor_id, MAX_MOTORS)?;
        let _command = lock(&self.command);
        lock(&self.state).info[index] = info;
        self.send(Self::INFO_ID, &info)
    }

    /// Cache and send one motor's settings.
    pub fn send_settings(&self, settings: MotorSettings) -> Result<usize> {
        let index = check_index(settings.motor_id, MAX_MOTORS)?;
        let _command = lock(&self.command);
        lock(&self.state).settings[index] = settings;
        self.send(Self::SETTINGS_ID, &settings)
    }

    /// Send the cached setpoint table.
    pub fn send_setpoints(&self) -> Result<usize> {
        let _command = lock(&self.command);
        let setpoints = self.setpoints();
        self.send(Self::SETPOINT_ID, &setpoints)
    }

    /// Cache and send one motor's PID tuning.
    pub fn send_pid(&self, pid: MotorPid) -> Result<usize> {
        let index = check_index(pid.motor_id, MAX_MOTORS)?;
        let _command = lock(&self.command);
        lock(&self.state).pid[index] = pid;
        self.send(Self::PID_ID, &pid)
    }

    /// Ask the peer for its feedback table.
    pub fn request_feedback(&self) -> Result<usize> {
        Ok(self.link.request(MOTORS, Self::FEEDBACK_ID)?)
    }

    /// Ask the peer for its setpoint table.
    pub fn request_setpoints(&self) -> Result<usize> {
        Ok(self.link.request(MOTORS, Self::SETPOINT_ID)?)
    }

    pub fn on_feedback<F>(&self, callback: F)
    where
        F: FnMut(&[MotorFeedback; MAX_MOTORS]) + Send + 'static,
    {
        self.on_feedback.set(callback);
    }

    pub fn on_info<F>(&self, callback: F)
    where
        F: FnMut(&MotorInfo) + Send + 'static,
    {
        self.on_info.set(callback);
    }

    pub fn on_settings<F>(&self, callback: F)
    where
        F: FnMut(&MotorSettings) + Send + 'static,
    {
        self.on_settings.set(callback);
    }

    pub fn on_setpoints<F>(&self, callback: F)
    where
        F: FnMut(&[MotorSetpoint; MAX_MOTORS]) + Send + 'static,
    {
        self.on_setpoints.set(callback);
    }

    pub fn on_pid<F>(&self, callback: F)
    where
        F: FnMut(&MotorPid) + Send + 'static,
    {
        self.on_pid.set(callback);
    }

    // State is released before the link is locked; receive handlers lock
    // state while the link is held.
    fn write_setpoint(&self, motor: u8, required: MotorMode, setpoint: MotorSetpoint) -> Result<usize> {
        let index = check_index(motor, MAX_MOTORS)?;
        let _command = lock(&self.command);
        let setpoints = {
            let mut state = lock(&self.state);
            let actual = state.settings[index].mode;
            if actual != required {
                tracing::debug!(motor, ?required, ?actual, "setpoint refused in wrong mode");
                return Err(ComponentError::ModeMismatch {
                    motor,
                    expected: required,
                    actual,
                });
            }
            state.setpoints[index] = setpoint;
            state.setpoints
        };
        self.send(Self::SETPOINT_ID, &setpoints)
    }

    fn send<M: WireMessage>(&self, data_id: u8, message: &M) -> Result<usize> {
        Ok(self
            .link
            .encode_and_enqueue(MOTORS, data_id, &message.to_payload())?)
    }
}

fn instance(motor_id: u8) -> std::result::Result<usize, PayloadError> {
    let index = usize::from(motor_id);
    if index >= MAX_MOTORS {
        tracing::warn!(motor_id, max = MAX_MOTORS, "motor id out of range");
        return Err(PayloadError::InstanceOutOfRange {
            index,
            max: MAX_MOTORS,
        });
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use unifylink_engine::LinkConfig;
    use unifylink_frame::{try_decode, FrameConfig};

    use super::*;
    use crate::text::fixed_str;

    fn round_trip(link: &Link) {
        let out = link.drain_outbound();
        link.push_received_bytes(&out).unwrap();
        link.run_parse_pass();
    }

    fn sample_info(motor_id: u8) -> MotorInfo {
        MotorInfo {
            motor_id,
            ratio: 6.0,
            max_speed: 5000.0,
            max_current: 15.0,
            torque_constant: 0.05,
            max_position: 200_000,
            run_time: 1000,
            model: fixed_str("TestMotor123"),
            serial: [
                0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC,
            ],
            firmware_version: 0x0102_0304,
        }
    }

    fn with_mode(motors: &Motors, motor: u8, mode: MotorMode) {
        lock(&motors.state).settings[usize::from(motor)].mode = mode;
    }

    #[test]
    fn message_sizes() {
        assert_eq!(MotorFeedback::WIRE_SIZE, 8);
        assert_eq!(MotorInfo::WIRE_SIZE, 73);
        assert_eq!(MotorSettings::WIRE_SIZE, 4);
        assert_eq!(MotorSetpoint::WIRE_SIZE, 6);
        assert_eq!(MotorPid::WIRE_SIZE, 85);
        assert_eq!(<[MotorFeedback; MAX_MOTORS]>::WIRE_SIZE, 64);
        assert_eq!(sample_info(0).to_payload().len(), 73);
        assert_eq!(MotorPid::default().to_payload().len(), 85);
    }

    #[test]
    fn codes_and_modes() {
        assert_eq!(u8::from(MotorErrorCode::Ok), 0);
        assert_eq!(u8::from(MotorErrorCode::OverHeat), 1);
        assert_eq!(u8::from(MotorErrorCode::Internal), 255);
        assert_eq!(MotorErrorCode::from(7), MotorErrorCode::Other(7));
        assert_eq!(MotorMode::from(3), MotorMode::Mit);
        assert_eq!(u8::from(MotorMode::Other(9)), 9);
    }

    #[test]
    fn info_is_stored_at_its_motor_id() {
        let link = Link::default();
        let motors = Motors::new(&link);
        motors.send_info(sample_info(5)).unwrap();
        lock(&motors.state).info[5] = MotorInfo::default();

        round_trip(&link);
        assert_eq!(link.stats().success_count, 1);
        let info = motors.info(5).unwrap();
        assert_eq!(info, sample_info(5));
        assert_eq!(info.model_name(), "TestMotor123");
    }

    #[test]
    fn info_with_out_of_range_id_is_decode_error() {
        let link = Link::default();
        let motors = Motors::new(&link);
        link.encode_and_enqueue(MOTORS, Motors::INFO_ID, &sample_info(8).to_payload())
            .unwrap();

        round_trip(&link);
        assert_eq!(link.stats().decode_error_count, 1);
        assert_eq!(link.stats().success_count, 0);
        assert!(matches!(
            motors.info(8),
            Err(ComponentError::InstanceOutOfRange { index: 8, max: 8 })
        ));
    }

    #[test]
    fn settings_round_trip() {
        let link = Link::default();
        let motors = Motors::new(&link);
        let sent = MotorSettings {
            motor_id: 4,
            feedback_interval: 10,
            reset_id: 3,
            mode: MotorMode::Speed,
        };
        link.encode_and_enqueue(MOTORS, Motors::SETTINGS_ID, &sent.to_payload())
            .unwrap();

        round_trip(&link);
        assert_eq!(link.stats().success_count, 1);
        assert_eq!(motors.settings(4).unwrap(), sent);
        assert_eq!(motors.mode(4).unwrap(), MotorMode::Speed);
    }

    #[test]
    fn setpoint_table_round_trip() {
        let link = Link::default();
        let motors = Motors::new(&link);
        let mut sent = [MotorSetpoint::default(); MAX_MOTORS];
        for (i, setpoint) in sent.iter_mut().enumerate() {
            setpoint.set = 1000 + i as i16 * 100;
        }
        link.encode_and_enqueue(MOTORS, Motors::SETPOINT_ID, &sent.to_payload())
            .unwrap();

        round_trip(&link);
        assert_eq!(link.stats().success_count, 1);
        assert_eq!(motors.setpoints(), sent);
    }

    #[test]
    fn set_speed_requires_speed_mode() {
        let link = Link::default();
        let motors = Motors::new(&link);
        with_mode(&motors, 1, MotorMode::Speed);

        motors.set_speed(1, 1500).unwrap();
        assert_eq!(
            motors.setpoints()[1],
            MotorSetpoint {
                set: 1500,
                set_extra: 0,
                set_extra2: 0
            }
        );

        let out = link.drain_outbound();
        let (frame, _) = try_decode(&out, &FrameConfig::default()).unwrap().unwrap();
        assert_eq!(frame.key(), (MOTORS, Motors::SETPOINT_ID));
        assert_eq!(frame.payload.len(), 48);
    }

    #[test]
    fn set_position_and_mit_fill_extra_fields() {
        let link = Link::default();
        let motors = Motors::new(&link);
        with_mode(&motors, 2, MotorMode::Position);
        with_mode(&motors, 3, MotorMode::Mit);

        motors.set_position(2, 3200, 120).unwrap();
        motors.set_mit(3, 2048, 200, 50).unwrap();

        let setpoints = motors.setpoints();
        assert_eq!(
            setpoints[2],
            MotorSetpoint {
                set: 3200,
                set_extra: 120,
                set_extra2: 0
            }
        );
        assert_eq!(
            setpoints[3],
            MotorSetpoint {
                set: 2048,
                set_extra: 200,
                set_extra2: 50
            }
        );
    }

    #[test]
    fn mode_mismatch_is_rejected_without_sending() {
        let link = Link::default();
        let motors = Motors::new(&link);
        with_mode(&motors, 4, MotorMode::Current);

        assert!(matches!(
            motors.set_speed(4, 100),
            Err(ComponentError::ModeMismatch {
                motor: 4,
                expected: MotorMode::Speed,
                actual: MotorMode::Current
            })
        ));
        assert!(motors.set_position(4, 1000, 10).is_err());
        assert!(motors.set_mit(4, 1000, 10, 5).is_err());

        with_mode(&motors, 4, MotorMode::Speed);
        assert!(motors.set_current(4, 100).is_err());

        assert_eq!(motors.setpoints()[4], MotorSetpoint::default());
        assert_eq!(link.stats().frames_enqueued, 0);
    }

    #[test]
    fn concurrent_setters_send_tables_in_snapshot_order() {
        let link = Link::new(LinkConfig {
            max_queue_bytes: 64 * 1024,
            ..LinkConfig::default()
        });
        let motors = Motors::new(&link);
        for motor in 0..MAX_MOTORS as u8 {
            with_mode(&motors, motor, MotorMode::Speed);
        }
        link.drain_outbound();

        let workers: Vec<_> = (0..MAX_MOTORS as u8)
            .map(|motor| {
                let motors = motors.clone();
                std::thread::spawn(move || {
                    for speed in 1..=50 {
                        motors.set_speed(motor, speed).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let config = FrameConfig::default();
        let out = link.drain_outbound();
        let mut rest = &out[..];
        let mut last = None;
        let mut frames = 0;
        while let Some((frame, consumed)) = try_decode(rest, &config).unwrap() {
            last = Some(frame);
            frames += 1;
            rest = &rest[consumed..];
        }
        assert_eq!(frames, MAX_MOTORS * 50);

        let last = last.unwrap();
        let table = <[MotorSetpoint; MAX_MOTORS]>::from_payload(&last.payload).unwrap();
        assert_eq!(table, motors.setpoints());
        assert!(table.iter().all(|setpoint| setpoint.set == 50));
    }

    #[test]
    fn setters_reject_unknown_motor() {
        let motors = Motors::new(&Link::default());
        assert!(matches!(
            motors.set_current(8, 1),
            Err(ComponentError::InstanceOutOfRange { index: 8, .. })
        ));
    }

    #[test]
    fn set_mode_sends_settings() {
        let link = Link::default();
        let motors = Motors::new(&link);
        motors.set_mode(6, MotorMode::Position).unwrap();

        let out = link.drain_outbound();
        let (frame, _) = try_decode(&out, &FrameConfig::default()).unwrap().unwrap();
        assert_eq!(frame.key(), (MOTORS, Motors::SETTINGS_ID));
        assert_eq!(frame.payload.as_ref(), &[6, 0, 0, 2]);
        motors.set_position(6, 10, 1).unwrap();
    }

    #[test]
    fn info_and_settings_observers_fire() {
        let link = Link::default();
        let motors = Motors::new(&link);
        let seen_info = Arc::new(Mutex::new(None));
        let seen_settings = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&seen_info);
        motors.on_info(move |info| *sink.lock().unwrap() = Some(*info));
        let sink = Arc::clone(&seen_settings);
        motors.on_settings(move |settings| *sink.lock().unwrap() = Some(*settings));

        motors.send_info(sample_info(2)).unwrap();
        motors
            .send_settings(MotorSettings {
                motor_id: 6,
                feedback_interval: 20,
                reset_id: 2,
                mode: MotorMode::Position,
            })
            .unwrap();
        round_trip(&link);

        assert_eq!(seen_info.lock().unwrap().unwrap().motor_id, 2);
        let settings = seen_settings.lock().unwrap().unwrap();
        assert_eq!((settings.motor_id, settings.feedback_interval), (6, 20));
        assert_eq!(settings.mode, MotorMode::Position);
    }

    #[test]
    fn every_motor_info_lands_in_its_slot() {
        let link = Link::default();
        let motors = Motors::new(&link);
        for id in 0..MAX_MOTORS as u8 {
            let info = MotorInfo {
                motor_id: id,
                ratio: f32::from(id),
                ..MotorInfo::default()
            };
            link.encode_and_enqueue(MOTORS, Motors::INFO_ID, &info.to_payload())
                .unwrap();
            round_trip(&link);
            assert_eq!(motors.info(id).unwrap().ratio, f32::from(id));
        }
        assert_eq!(link.stats().success_count, MAX_MOTORS as u64);
    }

    #[test]
    fn pid_round_trip() {
        let link = Link::default();
        let motors = Motors::new(&link);
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        motors.on_pid(move |_| flag.store(true, Ordering::SeqCst));

        let pid = MotorPid {
            motor_id: 0,
            current: PidParams {
                kp: 1.0,
                ki: 0.1,
                kd: 0.01,
                feed_forward: 0.0,
                integral_limit: 0.5,
                output_limit: 1.5,
                deadband: 2.0,
            },
            speed: PidParams {
                kp: 1.1,
                ..PidParams::default()
            },
            position: PidParams {
                deadband: 2.2,
                ..PidParams::default()
            },
        };
        link.encode_and_enqueue(MOTORS, Motors::PID_ID, &pid.to_payload())
            .unwrap();
        round_trip(&link);

        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(motors.pid(0).unwrap(), pid);
    }

    #[test]
    fn feedback_read_request_returns_cached_table() {
        let device_link = Link::default();
        let device = Motors::new(&device_link);
        let mut table = [MotorFeedback::default(); MAX_MOTORS];
        table[3] = MotorFeedback {
            position: 100,
            speed: -5,
            current: 7,
            temperature: 41,
            error_code: MotorErrorCode::OverHeat,
        };
        device.send_feedback(table).unwrap();
        device_link.drain_outbound();

        let host_link = Link::default();
        let host = Motors::new(&host_link);
        host.request_feedback().unwrap();

        device_link.push_received_bytes(&host_link.drain_outbound()).unwrap();
        device_link.run_parse_pass();
        host_link.push_received_bytes(&device_link.drain_outbound()).unwrap();
        host_link.run_parse_pass();

        assert_eq!(host.feedback(), table);
        assert_eq!(device_link.stats().success_count, 1);
        assert_eq!(host_link.stats().success_count, 1);
    }
}
