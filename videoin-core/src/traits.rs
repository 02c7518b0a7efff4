use std::sync::Arc;

use crate::config::{Adjustment, AdjustmentSet, Geometry};
use crate::device::{DeviceDescriptor, DeviceErrorCode, VideoCapabilities, VideoFormat};
use crate::error::Result;
use crate::frame::{Frame, FrameSize};

/// Payload of the "device opened" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Geometry the device actually opened at
    pub geometry: Geometry,

    /// Adjustment values read back from the hardware
    pub settings: AdjustmentSet,

    /// Whether the device exposes picture adjustments at all
    pub modifiable: bool,
}

/// Signals a backend raises about its own device.
///
/// Wired once, synchronously, when the backend is registered.
pub trait BackendObserver: Send + Sync {
    fn device_opened(&self, device: &DeviceDescriptor, config: &DeviceConfig);
    fn device_closed(&self, device: &DeviceDescriptor);
    fn device_error(&self, device: &DeviceDescriptor, code: DeviceErrorCode);
}

/// Capability implemented once per capture framework.
///
/// Only the controller calls into a backend, always with its state lock held,
/// so implementations need `Send` but not `Sync`.
pub trait Backend: Send {
    /// Framework name used to tag forwarded signals (e.g. "V4L2")
    fn framework(&self) -> &str;

    /// Connects the backend's signals. Called once before any other method.
    fn attach(&mut self, observer: Arc<dyn BackendObserver>);

    /// Lists the devices this backend can currently open.
    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>>;

    /// Selects `device` for the next `open`.
    ///
    /// Returns false when this backend cannot serve the descriptor; no
    /// hardware is touched either way.
    fn set_device(&mut self, device: &DeviceDescriptor, channel: u32, format: VideoFormat) -> bool;

    /// Opens the selected device and returns its current adjustments.
    fn open(&mut self, width: u32, height: u32, fps: u32) -> Result<AdjustmentSet>;

    fn close(&mut self);

    /// Reads one I420 frame into `buffer`, resizing it as needed.
    fn read_frame(&mut self, buffer: &mut Vec<u8>) -> Result<FrameSize>;

    /// Pushes one adjustment (0..=255 scale) to the open device.
    fn set_adjustment(&mut self, kind: Adjustment, value: u32) -> Result<()>;

    /// Maps a hot-plug triple onto one of this backend's descriptors.
    fn resolve_hotplug(
        &self,
        framework: &str,
        name: &str,
        capabilities: VideoCapabilities,
    ) -> Option<DeviceDescriptor>;
}

/// Receives raw frames for display.
pub trait DisplaySink: Send + Sync {
    /// `local` marks frames from our own camera, `active_devices` is how many
    /// inputs currently feed the sink.
    fn push_frame(&self, frame: Frame<'_>, local: bool, active_devices: usize);
}

// Box<dyn Backend> is what the controller stores; let it be used as a Backend too
impl<B: Backend + ?Sized> Backend for Box<B> {
    fn framework(&self) -> &str {
        (**self).framework()
    }

    fn attach(&mut self, observer: Arc<dyn BackendObserver>) {
        (**self).attach(observer)
    }

    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>> {
        (**self).devices()
    }

    fn set_device(&mut self, device: &DeviceDescriptor, channel: u32, format: VideoFormat) -> bool {
        (**self).set_device(device, channel, format)
    }

    fn open(&mut self, width: u32, height: u32, fps: u32) -> Result<AdjustmentSet> {
        (**self).open(width, height, fps)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn read_frame(&mut self, buffer: &mut Vec<u8>) -> Result<FrameSize> {
        (**self).read_frame(buffer)
    }

    fn set_adjustment(&mut self, kind: Adjustment, value: u32) -> Result<()> {
        (**self).set_adjustment(kind, value)
    }

    fn resolve_hotplug(
        &self,
        framework: &str,
        name: &str,
        capabilities: VideoCapabilities,
    ) -> Option<DeviceDescriptor> {
        (**self).resolve_hotplug(framework, name, capabilities)
    }
}
