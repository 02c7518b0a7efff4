use tracing::{error, info, warn};
use videoin_core::config::{Geometry, ModeConfig, PendingAdjustmentSet};
use videoin_core::device::{DeviceDescriptor, VideoFormat};
use videoin_core::error::{CaptureError, Result};
use videoin_core::frame::FrameSize;
use videoin_core::traits::Backend;

/// Consumption mode owning the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Preview,
    Stream,
}

/// Outcome of one open attempt.
#[derive(Debug)]
pub(crate) enum OpenResult {
    Opened,
    Failed(CaptureError),
}

/// Everything guarded by the primary lock.
pub(crate) struct State {
    /// Registration order, never shrinks
    pub(crate) backends: Vec<Box<dyn Backend>>,
    /// Index of the backend serving `current_device`
    pub(crate) manager: Option<usize>,
    /// Geometry the manager's device is open at
    pub(crate) opened: Option<Geometry>,
    pub(crate) current_device: DeviceDescriptor,
    pub(crate) desired_device: DeviceDescriptor,
    pub(crate) channel: u32,
    pub(crate) format: VideoFormat,
    pub(crate) preview: ModeConfig,
    pub(crate) stream: ModeConfig,
    /// Stream geometry taken at the last `start_stream`; mid-call reopens
    /// stay at this size
    pub(crate) live_stream: Geometry,
}

impl State {
    pub(crate) fn new(preview: Geometry, stream: Geometry) -> Self {
        Self {
            backends: Vec::new(),
            manager: None,
            opened: None,
            current_device: DeviceDescriptor::fallback(),
            desired_device: DeviceDescriptor::fallback(),
            channel: 0,
            format: VideoFormat::Auto,
            preview: ModeConfig::new(preview),
            stream: ModeConfig::new(stream),
            live_stream: stream,
        }
    }

    pub(crate) fn mode(&self, mode: Mode) -> &ModeConfig {
        match mode {
            Mode::Preview => &self.preview,
            Mode::Stream => &self.stream,
        }
    }

    pub(crate) fn mode_mut(&mut self, mode: Mode) -> &mut ModeConfig {
        match mode {
            Mode::Preview => &mut self.preview,
            Mode::Stream => &mut self.stream,
        }
    }

    /// Geometry `mode` opens the device at.
    pub(crate) fn open_geometry(&self, mode: Mode) -> Geometry {
        match mode {
            Mode::Preview => self.preview.geometry,
            Mode::Stream => self.live_stream,
        }
    }

    /// Mode whose geometry the device should be open at. Stream wins.
    pub(crate) fn active_mode(&self) -> Option<Mode> {
        if self.stream.active {
            Some(Mode::Stream)
        } else if self.preview.active {
            Some(Mode::Preview)
        } else {
            None
        }
    }

    pub(crate) fn preview_only(&self) -> bool {
        self.preview.active && !self.stream.active
    }

    pub(crate) fn any_active(&self) -> bool {
        self.preview.active || self.stream.active
    }

    pub(crate) fn is_open(&self) -> bool {
        self.manager.is_some() && self.opened.is_some()
    }

    /// Makes the first backend accepting `device` the manager, falling back
    /// to the sentinel when none does.
    pub(crate) fn select(&mut self, device: &DeviceDescriptor) {
        if self.try_select(device) {
            return;
        }
        warn!(
            err = %CaptureError::DeviceUnavailable(device.clone()),
            "Falling back to {}",
            DeviceDescriptor::fallback()
        );
        self.select_fallback();
    }

    pub(crate) fn select_fallback(&mut self) {
        if !self.try_select(&DeviceDescriptor::fallback()) {
            error!("Sentinel backend refused the fallback device");
        }
    }

    fn try_select(&mut self, device: &DeviceDescriptor) -> bool {
        let (channel, format) = (self.channel, self.format);
        self.manager = None;

        let accepted = self
            .backends
            .iter_mut()
            .position(|backend| backend.set_device(device, channel, format));

        if let Some(index) = accepted {
            info!(%device, framework = self.backends[index].framework(), "Device selected");
            self.manager = Some(index);
            self.current_device = device.clone();
        }
        accepted.is_some()
    }

    /// Opens the manager's device at the geometry of `mode`.
    ///
    /// A refusal switches to the sentinel and retries once; the sentinel
    /// never refuses.
    pub(crate) fn open(&mut self, mode: Mode) {
        match self.try_open(mode) {
            OpenResult::Opened => return,
            OpenResult::Failed(err) => {
                warn!(%err, device = %self.current_device, "Open failed, using fallback device")
            }
        }

        self.select_fallback();
        if let OpenResult::Failed(err) = self.try_open(mode) {
            error!(%err, "Fallback device failed to open");
        }
    }

    fn try_open(&mut self, mode: Mode) -> OpenResult {
        let Some(index) = self.manager else {
            return OpenResult::Failed(CaptureError::NotOpen);
        };
        let geometry = self.open_geometry(mode);

        match self.backends[index].open(geometry.width, geometry.height, geometry.fps) {
            Ok(settings) => {
                info!(
                    device = %self.current_device,
                    width = geometry.width,
                    height = geometry.height,
                    fps = geometry.fps,
                    ?mode,
                    "Device opened"
                );
                self.opened = Some(geometry);
                self.mode_mut(mode).settings = settings;
                OpenResult::Opened
            }
            Err(err) => OpenResult::Failed(err),
        }
    }

    /// Closes the open device, keeping the manager selected for a reopen.
    pub(crate) fn close(&mut self) {
        if let (Some(index), Some(_)) = (self.manager, self.opened.take()) {
            info!(device = %self.current_device, "Closing device");
            self.backends[index].close();
        }
    }

    /// Closes and drops the selection; the next activation re-resolves the
    /// desired device.
    pub(crate) fn release(&mut self) {
        self.close();
        self.manager = None;
        self.current_device = self.desired_device.clone();
    }

    /// Ensures a manager exists before an open from idle.
    pub(crate) fn select_desired_if_needed(&mut self) {
        if self.manager.is_none() {
            let desired = self.desired_device.clone();
            self.select(&desired);
        }
    }

    pub(crate) fn read(&mut self, buffer: &mut Vec<u8>) -> Result<FrameSize> {
        match (self.manager, self.opened) {
            (Some(index), Some(_)) => self.backends[index].read_frame(buffer),
            _ => Err(CaptureError::NotOpen),
        }
    }
}

/// Adjustment requests, guarded by the secondary lock.
///
/// Mode flags are mirrored here so adjustment calls never wait on the
/// primary lock.
#[derive(Debug, Default)]
pub(crate) struct Adjustments {
    pub(crate) preview_active: bool,
    pub(crate) stream_active: bool,
    pub(crate) preview: PendingAdjustmentSet,
    pub(crate) stream: PendingAdjustmentSet,
}

impl Adjustments {
    /// The single mode that exclusively owns the device, if any.
    pub(crate) fn exclusive_mode(&self) -> Option<Mode> {
        match (self.preview_active, self.stream_active) {
            (true, false) => Some(Mode::Preview),
            (false, true) => Some(Mode::Stream),
            _ => None,
        }
    }

    pub(crate) fn pending(&self, mode: Mode) -> &PendingAdjustmentSet {
        match mode {
            Mode::Preview => &self.preview,
            Mode::Stream => &self.stream,
        }
    }

    pub(crate) fn pending_mut(&mut self, mode: Mode) -> &mut PendingAdjustmentSet {
        match mode {
            Mode::Preview => &mut self.preview,
            Mode::Stream => &mut self.stream,
        }
    }
}
