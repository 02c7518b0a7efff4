pub mod backend;
pub mod conf_bridge;
pub mod controller;
pub mod dispatch;
pub mod fallback;
pub mod preview;

pub use videoin_core;

pub use conf_bridge::ConfigBridge;
pub use controller::{ControllerBuilder, ModeState, VideoInputController, VideoInputObserver};

/// Common imports: `use videoin::prelude::*;`
pub mod prelude {
    pub use crate::backend::platform_backends;
    pub use crate::conf_bridge::ConfigBridge;
    pub use crate::controller::{
        ControllerBuilder, Mode, ModeState, VideoInputController, VideoInputObserver,
    };
    pub use crate::dispatch::{Immediate, MainContext, MainQueue};
    pub use crate::fallback::MovingLogoBackend;
    pub use videoin_core::prelude::*;
}
