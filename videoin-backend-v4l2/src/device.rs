use std::path::{Path, PathBuf};

use tracing::{debug, info};
use v4l::capability::Flags;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, Format};

use videoin_core::device::DeviceDescriptor;
use videoin_core::error::{CaptureError, Result};

use crate::pixel_map;

pub const FRAMEWORK: &str = "V4L2";
pub const SOURCE: &str = "video4linux2";

/// A `/dev/video*` node able to capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureNode {
    pub path: PathBuf,
    /// Card name reported by the driver
    pub card: String,
}

impl CaptureNode {
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(FRAMEWORK, SOURCE, &self.card)
    }
}

/// Queries one node; `None` for output, metadata and vanished nodes.
pub fn probe(path: &Path) -> Option<CaptureNode> {
    let dev = Device::with_path(path).ok()?;
    let caps = dev.query_caps().ok()?;

    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        debug!(path = %path.display(), "Not a capture node");
        return None;
    }
    Some(CaptureNode {
        path: path.to_path_buf(),
        card: caps.card,
    })
}

/// Lists capture nodes in `/dev`.
pub fn list_nodes() -> Vec<CaptureNode> {
    v4l::context::enum_devices()
        .iter()
        .filter_map(|node| probe(node.path()))
        .collect()
}

/// Device configured for capture, before streaming starts.
pub(crate) struct Configured {
    pub(crate) dev: Device,
    pub(crate) format: Format,
    /// Whether the driver accepted the frame rate
    pub(crate) fps_applied: bool,
}

/// Opens `path` and negotiates a YUV format as close to `width`x`height`
/// as the driver allows.
pub(crate) fn configure(path: &Path, width: u32, height: u32, fps: u32) -> Result<Configured> {
    let failure = |reason: String| CaptureError::OpenFailure {
        device: path.display().to_string(),
        width,
        height,
        fps,
        reason,
    };

    let dev = Device::with_path(path).map_err(|e| failure(e.to_string()))?;

    let mut applied = None;
    for fourcc in pixel_map::preferred() {
        let wanted = Format::new(width, height, fourcc);
        match dev.set_format(&wanted) {
            Ok(format) if pixel_map::is_supported(format.fourcc) => {
                if format.fourcc != fourcc {
                    debug!(requested = %fourcc, got = %format.fourcc, "Driver picked the other YUV layout");
                }
                applied = Some(format);
                break;
            }
            Ok(format) => debug!(requested = %fourcc, got = %format.fourcc, "Format substituted by driver"),
            Err(err) => debug!(%err, %fourcc, "Format refused"),
        }
    }
    let format = applied.ok_or_else(|| failure("no YUV capture format".into()))?;

    let fps_applied = fps == 0 || dev.set_params(&Parameters::with_fps(fps)).is_ok();

    info!(
        path = %path.display(),
        width = format.width,
        height = format.height,
        fourcc = %format.fourcc,
        "V4L2 device configured"
    );
    Ok(Configured {
        dev,
        format,
        fps_applied,
    })
}
