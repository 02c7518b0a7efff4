#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Capture geometry: resolution plus frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Geometry {
    /// QCIF at 30 fps, what the local preview starts with
    pub const PREVIEW_DEFAULT: Self = Self::new(176, 144, 30);
    /// CIF at 30 fps
    pub const STREAM_DEFAULT: Self = Self::new(352, 288, 30);

    pub const fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::PREVIEW_DEFAULT
    }
}

/// One hardware picture adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adjustment {
    Colour,
    Brightness,
    Whiteness,
    Contrast,
}

impl Adjustment {
    pub const ALL: [Adjustment; 4] = [
        Adjustment::Colour,
        Adjustment::Brightness,
        Adjustment::Whiteness,
        Adjustment::Contrast,
    ];
}

/// Hardware adjustment values, 0..=255 each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct AdjustmentSet {
    pub colour: u32,
    pub brightness: u32,
    pub whiteness: u32,
    pub contrast: u32,
}

impl AdjustmentSet {
    /// Value at the middle of the 0..=255 scale
    pub const NEUTRAL: u32 = 127;

    pub fn get(&self, kind: Adjustment) -> u32 {
        match kind {
            Adjustment::Colour => self.colour,
            Adjustment::Brightness => self.brightness,
            Adjustment::Whiteness => self.whiteness,
            Adjustment::Contrast => self.contrast,
        }
    }

    pub fn set(&mut self, kind: Adjustment, value: u32) {
        match kind {
            Adjustment::Colour => self.colour = value,
            Adjustment::Brightness => self.brightness = value,
            Adjustment::Whiteness => self.whiteness = value,
            Adjustment::Contrast => self.contrast = value,
        }
    }
}

impl Default for AdjustmentSet {
    fn default() -> Self {
        Self {
            colour: Self::NEUTRAL,
            brightness: Self::NEUTRAL,
            whiteness: Self::NEUTRAL,
            contrast: Self::NEUTRAL,
        }
    }
}

/// Adjustments requested by the UI but not yet pushed to hardware.
///
/// `None` means "nothing requested"; a requested value stays recorded so a
/// reopened device gets it pushed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingAdjustmentSet {
    pub colour: Option<u32>,
    pub brightness: Option<u32>,
    pub whiteness: Option<u32>,
    pub contrast: Option<u32>,
}

impl PendingAdjustmentSet {
    pub fn request(&mut self, kind: Adjustment, value: u32) {
        let slot = match kind {
            Adjustment::Colour => &mut self.colour,
            Adjustment::Brightness => &mut self.brightness,
            Adjustment::Whiteness => &mut self.whiteness,
            Adjustment::Contrast => &mut self.contrast,
        };
        *slot = Some(value);
    }

    pub fn requested(&self, kind: Adjustment) -> Option<u32> {
        match kind {
            Adjustment::Colour => self.colour,
            Adjustment::Brightness => self.brightness,
            Adjustment::Whiteness => self.whiteness,
            Adjustment::Contrast => self.contrast,
        }
    }

    /// Requested values that differ from what the hardware last received.
    pub fn diff(&self, applied: &AdjustmentSet) -> Vec<(Adjustment, u32)> {
        Adjustment::ALL
            .iter()
            .filter_map(|&kind| match self.requested(kind) {
                Some(value) if value != applied.get(kind) => Some((kind, value)),
                _ => None,
            })
            .collect()
    }
}

/// Requested configuration of one consumption mode (preview or stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfig {
    pub active: bool,
    pub geometry: Geometry,
    /// Last values pushed to (or reported by) the hardware in this mode
    pub settings: AdjustmentSet,
}

impl ModeConfig {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            active: false,
            geometry,
            settings: AdjustmentSet::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_reports_only_changed_requests() {
        let applied = AdjustmentSet::default();
        let mut pending = PendingAdjustmentSet::default();
        assert!(pending.diff(&applied).is_empty());

        pending.request(Adjustment::Brightness, 200);
        pending.request(Adjustment::Contrast, AdjustmentSet::NEUTRAL);
        assert_eq!(pending.diff(&applied), vec![(Adjustment::Brightness, 200)]);
    }

    #[test]
    fn diff_is_empty_once_applied() {
        let mut applied = AdjustmentSet::default();
        let mut pending = PendingAdjustmentSet::default();
        pending.request(Adjustment::Colour, 10);

        for (kind, value) in pending.diff(&applied) {
            applied.set(kind, value);
        }
        assert_eq!(applied.colour, 10);
        assert!(pending.diff(&applied).is_empty());
    }

    #[test]
    fn mode_config_starts_inactive() {
        let mode = ModeConfig::new(Geometry::new(320, 240, 15));
        assert!(!mode.active);
        assert_eq!(mode.geometry, Geometry::new(320, 240, 15));
        assert_eq!(mode.settings, AdjustmentSet::default());
    }
}
