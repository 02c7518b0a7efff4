//! The synthetic "Moving Logo" device.
//!
//! Always enumerable, always openable, and its frame reads cannot fail while
//! open. The controller falls back to it whenever a real device is missing,
//! refuses to open or stops delivering frames.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;
use videoin_core::config::{Adjustment, AdjustmentSet, Geometry};
use videoin_core::device::{DeviceDescriptor, VideoCapabilities, VideoFormat, FALLBACK_DEVICE};
use videoin_core::error::{CaptureError, Result};
use videoin_core::frame::FrameSize;
use videoin_core::traits::{Backend, BackendObserver, DeviceConfig};

// I420 colours
const BACKGROUND_Y: u8 = 40;
const LOGO_Y: u8 = 210;
const LOGO_U: u8 = 170;
const LOGO_V: u8 = 90;
const NEUTRAL_CHROMA: u8 = 128;

pub struct MovingLogoBackend {
    observer: Option<Arc<dyn BackendObserver>>,
    selected: bool,
    opened: Option<Geometry>,
    position: (i64, i64),
    velocity: (i64, i64),
    last_frame: Option<Instant>,
}

impl std::fmt::Debug for MovingLogoBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovingLogoBackend")
            .field("selected", &self.selected)
            .field("opened", &self.opened)
            .field("position", &self.position)
            .finish()
    }
}

impl Default for MovingLogoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MovingLogoBackend {
    pub fn new() -> Self {
        Self {
            observer: None,
            selected: false,
            opened: None,
            position: (0, 0),
            velocity: (3, 2),
            last_frame: None,
        }
    }

    /// Sleeps until one frame interval has passed since the previous read.
    fn pace(&mut self, fps: u32) {
        if fps > 0 {
            let interval = Duration::from_secs(1) / fps;
            if let Some(last) = self.last_frame {
                let elapsed = last.elapsed();
                if elapsed < interval {
                    thread::sleep(interval - elapsed);
                }
            }
        }
        self.last_frame = Some(Instant::now());
    }

    fn advance(&mut self, width: i64, height: i64, side: i64) {
        let max_x = (width - side).max(0);
        let max_y = (height - side).max(0);

        let (mut x, mut y) = (self.position.0 + self.velocity.0, self.position.1 + self.velocity.1);
        if x <= 0 || x >= max_x {
            self.velocity.0 = -self.velocity.0;
            x = x.clamp(0, max_x);
        }
        if y <= 0 || y >= max_y {
            self.velocity.1 = -self.velocity.1;
            y = y.clamp(0, max_y);
        }
        self.position = (x, y);
    }
}

impl Backend for MovingLogoBackend {
    fn framework(&self) -> &str {
        FALLBACK_DEVICE
    }

    fn attach(&mut self, observer: Arc<dyn BackendObserver>) {
        self.observer = Some(observer);
    }

    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>> {
        Ok(vec![DeviceDescriptor::fallback()])
    }

    fn set_device(&mut self, device: &DeviceDescriptor, _channel: u32, _format: VideoFormat) -> bool {
        self.selected = device.is_fallback();
        self.selected
    }

    fn open(&mut self, width: u32, height: u32, fps: u32) -> Result<AdjustmentSet> {
        let geometry = Geometry::new(width, height, fps);
        debug!(width, height, fps, "Opening moving logo");

        self.opened = Some(geometry);
        self.position = (0, 0);
        self.last_frame = None;

        let settings = AdjustmentSet::default();
        if let Some(observer) = &self.observer {
            let config = DeviceConfig {
                geometry,
                settings,
                modifiable: false,
            };
            observer.device_opened(&DeviceDescriptor::fallback(), &config);
        }
        Ok(settings)
    }

    fn close(&mut self) {
        if self.opened.take().is_some() {
            if let Some(observer) = &self.observer {
                observer.device_closed(&DeviceDescriptor::fallback());
            }
        }
    }

    fn read_frame(&mut self, buffer: &mut Vec<u8>) -> Result<FrameSize> {
        let geometry = self.opened.ok_or(CaptureError::NotOpen)?;
        self.pace(geometry.fps);

        let size = FrameSize::new(geometry.width, geometry.height);
        let (w, h) = (geometry.width as i64, geometry.height as i64);
        let side = (w.min(h) / 4).max(1);
        self.advance(w, h, side);

        draw(buffer, size, self.position, side);
        Ok(size)
    }

    fn set_adjustment(&mut self, _kind: Adjustment, _value: u32) -> Result<()> {
        // Synthetic picture, nothing to adjust
        Ok(())
    }

    fn resolve_hotplug(
        &self,
        _framework: &str,
        _name: &str,
        _capabilities: VideoCapabilities,
    ) -> Option<DeviceDescriptor> {
        None
    }
}

/// Renders the background and a solid square into an I420 buffer.
fn draw(buffer: &mut Vec<u8>, size: FrameSize, (x, y): (i64, i64), side: i64) {
    let (w, h) = (size.width as usize, size.height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));

    buffer.clear();
    buffer.resize(w * h, BACKGROUND_Y);
    buffer.resize(size.yuv420p_len(), NEUTRAL_CHROMA);

    let (x, y, side) = (x as usize, y as usize, side as usize);
    let (x_end, y_end) = ((x + side).min(w), (y + side).min(h));

    for row in y..y_end {
        buffer[row * w + x..row * w + x_end].fill(LOGO_Y);
    }

    let (u_base, v_base) = (w * h, w * h + cw * ch);
    for row in (y / 2)..y_end.div_ceil(2).min(ch) {
        let (from, to) = (x / 2, x_end.div_ceil(2).min(cw));
        buffer[u_base + row * cw + from..u_base + row * cw + to].fill(LOGO_U);
        buffer[v_base + row * cw + from..v_base + row * cw + to].fill(LOGO_V);
    }
}
