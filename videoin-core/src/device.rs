use std::fmt;

use bitflags::bitflags;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Framework, source and name of the synthetic fallback device.
pub const FALLBACK_DEVICE: &str = "Moving Logo";

/// Identifies one capture device.
///
/// Equality covers all three fields, so the same camera exposed by two
/// backends is two distinct descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct DeviceDescriptor {
    /// Backend family (e.g. "V4L2", "Moving Logo")
    pub framework: String,

    /// Sub-type within the framework (e.g. "video4linux2")
    pub source: String,

    /// Human readable device id (e.g. "HD Pro Webcam C920")
    pub name: String,
}

impl DeviceDescriptor {
    pub fn new(
        framework: impl Into<String>,
        source: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            framework: framework.into(),
            source: source.into(),
            name: name.into(),
        }
    }

    /// The always-available synthetic device.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_DEVICE, FALLBACK_DEVICE, FALLBACK_DEVICE)
    }

    pub fn is_fallback(&self) -> bool {
        self.framework == FALLBACK_DEVICE
            && self.source == FALLBACK_DEVICE
            && self.name == FALLBACK_DEVICE
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.name, self.framework, self.source)
    }
}

bitflags! {
    /// Capability level advertised by a hot-plugged capture device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VideoCapabilities: u32 {
        /// Legacy Video4Linux API
        const V4L1 = 0x01;
        /// Video4Linux2 API
        const V4L2 = 0x02;
    }
}

/// Hardware class a hot-plug event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Video,
    Audio,
}

/// Analogue video standard requested from the capture input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum VideoFormat {
    Pal,
    Ntsc,
    Secam,
    #[default]
    Auto,
}

/// Informational error codes a backend reports to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorCode {
    Device,
    Format,
    Channel,
    Colour,
    FrameRate,
    Scale,
}
