use serde::{Deserialize, Serialize};

use crate::config::{AdjustmentSet, Geometry};
use crate::device::{DeviceDescriptor, VideoFormat};
use crate::error::{CaptureError, Result};

/// Persisted video input configuration.
///
/// Every field has a default so partially written documents still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInputSettings {
    /// Device the user asked for
    pub device: DeviceDescriptor,
    pub channel: u32,
    pub format: VideoFormat,
    pub preview: Geometry,
    pub stream: Geometry,
    /// Adjustment defaults pushed while a single mode owns the device
    pub adjustments: Option<AdjustmentSet>,
}

impl Default for VideoInputSettings {
    fn default() -> Self {
        Self {
            device: DeviceDescriptor::fallback(),
            channel: 0,
            format: VideoFormat::Auto,
            preview: Geometry::PREVIEW_DEFAULT,
            stream: Geometry::STREAM_DEFAULT,
            adjustments: None,
        }
    }
}

impl VideoInputSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CaptureError::InvalidSettings(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CaptureError::InvalidSettings(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_uses_defaults() -> anyhow::Result<()> {
        let settings = VideoInputSettings::from_json(
            r#"{ "device": { "framework": "V4L2", "source": "video4linux2", "name": "Webcam" },
                 "format": "pal" }"#,
        )?;

        assert_eq!(settings.device.name, "Webcam");
        assert_eq!(settings.format, VideoFormat::Pal);
        assert_eq!(settings.preview, Geometry::PREVIEW_DEFAULT);
        assert_eq!(settings.stream, Geometry::STREAM_DEFAULT);
        assert!(settings.adjustments.is_none());
        Ok(())
    }

    #[test]
    fn saved_settings_load_back() -> anyhow::Result<()> {
        let mut settings = VideoInputSettings::default();
        settings.channel = 2;
        settings.adjustments = Some(AdjustmentSet::default());

        let loaded = VideoInputSettings::from_json(&settings.to_json()?)?;
        assert_eq!(loaded, settings);
        Ok(())
    }

    #[test]
    fn garbage_is_invalid_settings() {
        let err = VideoInputSettings::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CaptureError::InvalidSettings(_)));
    }
}
