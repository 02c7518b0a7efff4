// Clippy/rustc checks kept on for the whole core layer
#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

// Modules
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod hal;
pub mod hotplug;
pub mod traits;

#[cfg(feature = "serialize")]
pub mod settings;

// Prelude for backend authors and the controller
pub mod prelude {
    pub use crate::config::{Adjustment, AdjustmentSet, Geometry, ModeConfig};
    pub use crate::device::{
        DeviceClass, DeviceDescriptor, DeviceErrorCode, VideoCapabilities, VideoFormat,
    };
    pub use crate::error::{CaptureError, Result};
    pub use crate::frame::{Frame, FrameSize};
    pub use crate::hal::{HalCore, HalListener};
    pub use crate::hotplug::{HotplugEvent, HotplugMonitor, HotplugSink, RawDevice};
    pub use crate::traits::{Backend, BackendObserver, DeviceConfig, DisplaySink};

    #[cfg(feature = "serialize")]
    pub use crate::settings::VideoInputSettings;
}

// Version and build information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
