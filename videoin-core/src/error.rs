use thiserror::Error;

use crate::config::Adjustment;
use crate::device::DeviceDescriptor;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// No registered backend accepted the descriptor at swap time.
    #[error("No registered backend offers device {0}")]
    DeviceUnavailable(DeviceDescriptor),

    #[error("Failed to open {device} at {width}x{height}@{fps}: {reason}")]
    OpenFailure {
        device: String,
        width: u32,
        height: u32,
        fps: u32,
        reason: String,
    },

    #[error("Frame read failed on {device}: {reason}")]
    ReadFailure { device: String, reason: String },

    #[error("Device enumeration failed: {0}")]
    EnumerationFailure(String),

    #[error("Device is not open")]
    NotOpen,

    #[error("Control not supported by device: {0:?}")]
    ControlNotSupported(Adjustment),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
