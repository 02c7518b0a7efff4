use v4l::control::{Control, Description, Value};
use v4l::Device;

use videoin_core::config::{Adjustment, AdjustmentSet};
use videoin_core::error::{CaptureError, Result};

// Linux ABI values, /usr/include/linux/v4l2-controls.h
const V4L2_CID_BASE: u32 = 0x00980900;

const CID_BRIGHTNESS: u32 = V4L2_CID_BASE;
const CID_CONTRAST: u32 = V4L2_CID_BASE + 1;
const CID_SATURATION: u32 = V4L2_CID_BASE + 2;
// Whiteness shares its id with gamma
const CID_WHITENESS: u32 = V4L2_CID_BASE + 16;

/// Full scale of the controller's adjustment values
const SCALE_MAX: i64 = 255;

pub(crate) fn control_id(kind: Adjustment) -> u32 {
    match kind {
        Adjustment::Colour => CID_SATURATION,
        Adjustment::Brightness => CID_BRIGHTNESS,
        Adjustment::Whiteness => CID_WHITENESS,
        Adjustment::Contrast => CID_CONTRAST,
    }
}

/// Range of one hardware control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ControlRange {
    pub(crate) min: i64,
    pub(crate) max: i64,
}

impl ControlRange {
    pub(crate) fn to_device(self, value: u32) -> i64 {
        let value = i64::from(value).min(SCALE_MAX);
        self.min + value * (self.max - self.min) / SCALE_MAX
    }

    pub(crate) fn from_device(self, raw: i64) -> u32 {
        if self.max <= self.min {
            return AdjustmentSet::NEUTRAL;
        }
        let clamped = raw.clamp(self.min, self.max);
        ((clamped - self.min) * SCALE_MAX / (self.max - self.min)) as u32
    }
}

/// Picture controls exposed by one open device.
#[derive(Debug, Default)]
pub(crate) struct PictureControls {
    ranges: Vec<(Adjustment, ControlRange)>,
}

impl PictureControls {
    pub(crate) fn query(dev: &Device) -> Self {
        let descriptions: Vec<Description> = dev.query_controls().unwrap_or_default();

        let ranges = Adjustment::ALL
            .iter()
            .filter_map(|&kind| {
                let id = control_id(kind);
                descriptions.iter().find(|d| d.id == id).map(|d| {
                    (
                        kind,
                        ControlRange {
                            min: d.minimum,
                            max: d.maximum,
                        },
                    )
                })
            })
            .collect();

        Self { ranges }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    fn range(&self, kind: Adjustment) -> Option<ControlRange> {
        self.ranges
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, range)| *range)
    }

    /// Current values on the 0..=255 scale; missing controls read as neutral.
    pub(crate) fn read(&self, dev: &Device) -> AdjustmentSet {
        let mut settings = AdjustmentSet::default();
        for &(kind, range) in &self.ranges {
            if let Ok(Control {
                value: Value::Integer(raw),
                ..
            }) = dev.control(control_id(kind))
            {
                settings.set(kind, range.from_device(raw));
            }
        }
        settings
    }

    pub(crate) fn write(&self, dev: &Device, kind: Adjustment, value: u32) -> Result<()> {
        let range = self
            .range(kind)
            .ok_or(CaptureError::ControlNotSupported(kind))?;

        dev.set_control(Control {
            id: control_id(kind),
            value: Value::Integer(range.to_device(value)),
        })
        .map_err(CaptureError::Io)
    }
}
