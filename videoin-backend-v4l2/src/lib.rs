#![cfg(target_os = "linux")]

pub mod controls;
pub mod device;
pub mod hotplug;
pub mod pixel_map;
pub mod stream;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};
use v4l::Device;

use videoin_core::config::{Adjustment, AdjustmentSet, Geometry};
use videoin_core::device::{DeviceDescriptor, DeviceErrorCode, VideoCapabilities, VideoFormat};
use videoin_core::error::{CaptureError, Result};
use videoin_core::frame::FrameSize;
use videoin_core::hotplug::VIDEO_SUBSYSTEM;
use videoin_core::traits::{Backend, BackendObserver, DeviceConfig};

use crate::controls::PictureControls;
use crate::device::{CaptureNode, FRAMEWORK, SOURCE};
use crate::stream::FrameStream;

pub use crate::hotplug::{AlsaCards, DevWatcher};

/// Device picked by `set_device`, not yet opened.
#[derive(Debug, Clone)]
struct Selection {
    descriptor: DeviceDescriptor,
    path: PathBuf,
    channel: u32,
    format: VideoFormat,
}

struct OpenDevice {
    dev: Device,
    stream: FrameStream,
    controls: PictureControls,
}

/// Video4Linux2 capture backend.
pub struct V4l2Backend {
    observer: Option<Arc<dyn BackendObserver>>,
    selected: Option<Selection>,
    open: Option<OpenDevice>,
}

impl std::fmt::Debug for V4l2Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V4l2Backend")
            .field("selected", &self.selected)
            .field("open", &self.open.is_some())
            .finish()
    }
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self {
            observer: None,
            selected: None,
            open: None,
        }
    }

    fn report(&self, code: DeviceErrorCode) {
        if let (Some(observer), Some(sel)) = (&self.observer, &self.selected) {
            observer.device_error(&sel.descriptor, code);
        }
    }
}

impl Backend for V4l2Backend {
    fn framework(&self) -> &str {
        FRAMEWORK
    }

    fn attach(&mut self, observer: Arc<dyn BackendObserver>) {
        self.observer = Some(observer);
    }

    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>> {
        Ok(device::list_nodes().iter().map(CaptureNode::descriptor).collect())
    }

    fn set_device(&mut self, device: &DeviceDescriptor, channel: u32, format: VideoFormat) -> bool {
        if device.framework != FRAMEWORK {
            return false;
        }

        let node = device::list_nodes()
            .into_iter()
            .find(|node| node.descriptor() == *device);
        match node {
            Some(node) => {
                debug!(%device, path = %node.path.display(), "V4L2 device selected");
                self.selected = Some(Selection {
                    descriptor: device.clone(),
                    path: node.path,
                    channel,
                    format,
                });
                true
            }
            None => {
                debug!(%device, "No V4L2 node with that card name");
                false
            }
        }
    }

    fn open(&mut self, width: u32, height: u32, fps: u32) -> Result<AdjustmentSet> {
        self.close();
        let sel = self.selected.clone().ok_or(CaptureError::NotOpen)?;

        let configured = match device::configure(&sel.path, width, height, fps) {
            Ok(configured) => configured,
            Err(err) => {
                self.report(DeviceErrorCode::Device);
                return Err(err);
            }
        };

        // Inputs and analogue standards are left at the driver's choice
        if sel.channel != 0 {
            warn!(channel = sel.channel, "Input selection not supported, using input 0");
            self.report(DeviceErrorCode::Channel);
        }
        if sel.format != VideoFormat::Auto {
            warn!(format = ?sel.format, "Video standard selection not supported");
            self.report(DeviceErrorCode::Format);
        }
        if !configured.fps_applied {
            self.report(DeviceErrorCode::FrameRate);
        }
        if (configured.format.width, configured.format.height) != (width, height) {
            debug!(
                native_width = configured.format.width,
                native_height = configured.format.height,
                "Scaling frames to requested size"
            );
            self.report(DeviceErrorCode::Scale);
        }

        let size = FrameSize::new(width, height);
        let stream = match FrameStream::start(&configured.dev, configured.format, size) {
            Ok(stream) => stream,
            Err(err) => {
                self.report(DeviceErrorCode::Device);
                return Err(err);
            }
        };

        let controls = PictureControls::query(&configured.dev);
        let settings = controls.read(&configured.dev);
        let config = DeviceConfig {
            geometry: Geometry::new(width, height, fps),
            settings,
            modifiable: !controls.is_empty(),
        };

        info!(device = %sel.descriptor, width, height, fps, "V4L2 device streaming");
        self.open = Some(OpenDevice {
            dev: configured.dev,
            stream,
            controls,
        });
        if let Some(observer) = &self.observer {
            observer.device_opened(&sel.descriptor, &config);
        }
        Ok(settings)
    }

    fn close(&mut self) {
        if let Some(mut open) = self.open.take() {
            open.stream.stop();
            drop(open);
            if let (Some(observer), Some(sel)) = (&self.observer, &self.selected) {
                observer.device_closed(&sel.descriptor);
            }
        }
    }

    fn read_frame(&mut self, buffer: &mut Vec<u8>) -> Result<FrameSize> {
        let open = self.open.as_mut().ok_or(CaptureError::NotOpen)?;
        open.stream.next_into(buffer).map_err(|err| CaptureError::ReadFailure {
            device: self
                .selected
                .as_ref()
                .map(|sel| sel.descriptor.to_string())
                .unwrap_or_default(),
            reason: err.to_string(),
        })
    }

    fn set_adjustment(&mut self, kind: Adjustment, value: u32) -> Result<()> {
        let open = self.open.as_ref().ok_or(CaptureError::NotOpen)?;
        open.controls.write(&open.dev, kind, value)
    }

    fn resolve_hotplug(
        &self,
        framework: &str,
        name: &str,
        capabilities: VideoCapabilities,
    ) -> Option<DeviceDescriptor> {
        (framework == VIDEO_SUBSYSTEM && capabilities.contains(VideoCapabilities::V4L2))
            .then(|| DeviceDescriptor::new(FRAMEWORK, SOURCE, name))
    }
}

impl Drop for V4l2Backend {
    fn drop(&mut self) {
        self.close();
    }
}
