use unifylink_engine::LinkError;

use crate::motor::MotorMode;

/// Errors returned by component helpers.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// The underlying link refused the message.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// An instance index outside the component's table.
    #[error("instance {index} out of range (max {max})")]
    InstanceOutOfRange { index: usize, max: usize },

    /// A setpoint helper was used while the motor is in another mode.
    #[error("motor {motor} is in {actual:?} mode, {expected:?} required")]
    ModeMismatch {
        motor: u8,
        expected: MotorMode,
        actual: MotorMode,
    },
}

pub type Result<T> = std::result::Result<T, ComponentError>;

pub(crate) fn check_index(index: u8, max: usize) -> Result<usize> {
    let index = usize::from(index);
    if index >= max {
        return Err(ComponentError::InstanceOutOfRange { index, max });
    }
    Ok(index)
}
