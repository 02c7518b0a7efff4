//! Applies persisted settings to a controller.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use videoin_core::config::{Adjustment, AdjustmentSet};
use videoin_core::error::Result;
use videoin_core::settings::VideoInputSettings;

use crate::controller::VideoInputController;

/// Forwards configuration changes to the controller.
///
/// Every notification carries the full settings; only the parts that differ
/// from the last applied settings reach the controller.
#[derive(Debug)]
pub struct ConfigBridge {
    controller: Arc<VideoInputController>,
    applied: Mutex<Option<VideoInputSettings>>,
}

impl ConfigBridge {
    pub fn new(controller: Arc<VideoInputController>) -> Self {
        Self {
            controller,
            applied: Mutex::new(None),
        }
    }

    /// Parses a JSON settings document and applies it.
    pub fn load_json(&self, json: &str) -> Result<()> {
        let settings = VideoInputSettings::from_json(json)?;
        self.settings_changed(&settings);
        Ok(())
    }

    pub fn settings_changed(&self, settings: &VideoInputSettings) {
        let mut applied = self.applied.lock();
        let previous = applied.as_ref();

        let device_changed = previous.map_or(true, |p| {
            p.device != settings.device || p.channel != settings.channel || p.format != settings.format
        });
        if device_changed {
            info!(device = %settings.device, channel = settings.channel, "Device setting changed");
            self.controller
                .set_device(settings.device.clone(), settings.channel, settings.format);
        }

        if previous.map_or(true, |p| p.preview != settings.preview) {
            let g = settings.preview;
            self.controller.set_preview_config(g.width, g.height, g.fps);
        }

        if previous.map_or(true, |p| p.stream != settings.stream) {
            let g = settings.stream;
            self.controller.set_stream_config(g.width, g.height, g.fps);
        }

        if let Some(wanted) = settings.adjustments {
            let before = previous.and_then(|p| p.adjustments);
            for kind in Adjustment::ALL {
                let value = wanted.get(kind);
                if before.map(|b: AdjustmentSet| b.get(kind)) != Some(value) {
                    self.apply(kind, value);
                }
            }
        }

        *applied = Some(settings.clone());
        debug!("Settings applied");
    }

    fn apply(&self, kind: Adjustment, value: u32) {
        match kind {
            Adjustment::Colour => self.controller.set_colour(value),
            Adjustment::Brightness => self.controller.set_brightness(value),
            Adjustment::Whiteness => self.controller.set_whiteness(value),
            Adjustment::Contrast => self.controller.set_contrast(value),
        }
    }
}
