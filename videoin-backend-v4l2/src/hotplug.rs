//! Linux event source for the hot-plug monitor.
//!
//! Watches `/dev` for `video*` nodes and `/dev/snd` for `pcm*` nodes with
//! inotify and replays creations and deletions as monitor events.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, WatchDescriptor};
use tracing::{debug, info, warn};

use videoin_core::error::{CaptureError, Result};
use videoin_core::hotplug::{AudioEnumerator, HotplugMonitor, RawDevice, CAPTURE_CAPABILITY, VIDEO_SUBSYSTEM};

use crate::device::{self, SOURCE};

const DEV_DIR: &str = "/dev";
const SND_DIR: &str = "/dev/snd";
const ASOUND_CARDS: &str = "/proc/asound/cards";
const AUDIO_SUBSYSTEM: &str = "sound";

const POLL_INTERVAL: Duration = Duration::from_millis(200);
// udev fixes permissions shortly after the node appears
const PROBE_ATTEMPTS: u32 = 5;
const PROBE_DELAY: Duration = Duration::from_millis(100);

/// Audio enumerator backed by `/proc/asound/cards`.
#[derive(Debug, Clone)]
pub struct AlsaCards {
    path: PathBuf,
}

impl Default for AlsaCards {
    fn default() -> Self {
        Self::new()
    }
}

impl AlsaCards {
    pub fn new() -> Self {
        Self::with_path(ASOUND_CARDS)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioEnumerator for AlsaCards {
    fn device_names(&self) -> Result<Vec<String>> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| CaptureError::EnumerationFailure(format!("{}: {e}", self.path.display())))?;
        Ok(parse_cards(&text))
    }
}

/// Card names from `/proc/asound/cards`.
///
/// Each card has a header line ` 0 [PCH            ]: HDA-Intel - HDA Intel PCH`
/// followed by an indented description line.
pub fn parse_cards(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let (index, rest) = line.trim_start().split_once(' ')?;
            index.parse::<u32>().ok()?;
            let (_, long) = rest.split_once("]: ")?;
            let name = long.split_once(" - ").map_or(long, |(_, name)| name);
            Some(name.trim().to_string())
        })
        .collect()
}

enum NodeKind {
    Video,
    Audio,
}

fn classify(dir: &Path, name: &OsStr) -> Option<NodeKind> {
    let name = name.to_str()?;
    if dir == Path::new(DEV_DIR) && name.starts_with("video") {
        Some(NodeKind::Video)
    } else if dir == Path::new(SND_DIR) && name.starts_with("pcm") {
        Some(NodeKind::Audio)
    } else {
        None
    }
}

fn capture_raw(node: &device::CaptureNode) -> RawDevice {
    RawDevice::new(node.path.display().to_string())
        .name(node.card.clone())
        .api(SOURCE)
        .capability(CAPTURE_CAPABILITY)
}

/// Background thread feeding a [`HotplugMonitor`] from inotify.
pub struct DevWatcher {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for DevWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevWatcher")
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl DevWatcher {
    pub fn spawn(monitor: Arc<HotplugMonitor>) -> Result<Self> {
        let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)
            .map_err(|e| CaptureError::Io(e.into()))?;

        let mut dirs = HashMap::new();
        for dir in [DEV_DIR, SND_DIR] {
            match inotify.add_watch(dir, AddWatchFlags::IN_CREATE | AddWatchFlags::IN_DELETE) {
                Ok(wd) => {
                    dirs.insert(wd, PathBuf::from(dir));
                }
                Err(err) => warn!(%err, dir, "Cannot watch directory"),
            }
        }

        // Removal events cannot be probed, remember what each node was
        let known: HashMap<PathBuf, RawDevice> = device::list_nodes()
            .iter()
            .map(|node| (node.path.clone(), capture_raw(node)))
            .collect();

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let worker = thread::Builder::new()
            .name("videoin-hotplug".into())
            .spawn(move || watch(inotify, dirs, known, monitor, worker_stop))?;

        info!("Hot-plug watcher started");
        Ok(Self {
            stop,
            worker: Some(worker),
        })
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Hot-plug watcher panicked");
            }
        }
    }
}

impl Drop for DevWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch(
    inotify: Inotify,
    dirs: HashMap<WatchDescriptor, PathBuf>,
    mut known: HashMap<PathBuf, RawDevice>,
    monitor: Arc<HotplugMonitor>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::SeqCst) {
        let events = match inotify.read_events() {
            Ok(events) => events,
            Err(Errno::EAGAIN) => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(err) => {
                warn!(%err, "inotify read failed, watcher exiting");
                break;
            }
        };

        for event in events {
            let (Some(dir), Some(name)) = (dirs.get(&event.wd), event.name.as_deref()) else {
                continue;
            };
            let path = dir.join(name);
            let created = event.mask.contains(AddWatchFlags::IN_CREATE);

            match classify(dir, name) {
                Some(NodeKind::Video) if created => {
                    let Some(node) = probe_with_retry(&path) else {
                        debug!(path = %path.display(), "New video node is not a capture device");
                        continue;
                    };
                    let raw = capture_raw(&node);
                    monitor.handle_event("add", VIDEO_SUBSYSTEM, &raw);
                    known.insert(path, raw);
                }
                Some(NodeKind::Video) => {
                    if let Some(raw) = known.remove(&path) {
                        monitor.handle_event("remove", VIDEO_SUBSYSTEM, &raw);
                    }
                }
                Some(NodeKind::Audio) => {
                    let action = if created { "add" } else { "remove" };
                    monitor.handle_event(action, AUDIO_SUBSYSTEM, &RawDevice::new(path.display().to_string()));
                }
                None => {}
            }
        }
    }
    debug!("Hot-plug watcher exiting");
}

fn probe_with_retry(path: &Path) -> Option<device::CaptureNode> {
    for attempt in 0..PROBE_ATTEMPTS {
        if let Some(node) = device::probe(path) {
            return Some(node);
        }
        if attempt + 1 < PROBE_ATTEMPTS {
            thread::sleep(PROBE_DELAY);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARDS: &str = " 0 [PCH            ]: HDA-Intel - HDA Intel PCH
                      HDA Intel PCH at 0xf7f10000 irq 32
 1 [C920           ]: USB-Audio - HD Pro Webcam C920
                      HD Pro Webcam C920 at usb-0000:00:14.0-2, high speed
";

    #[test]
    fn parses_card_names() {
        assert_eq!(
            parse_cards(CARDS),
            vec!["HDA Intel PCH".to_string(), "HD Pro Webcam C920".to_string()]
        );
    }

    #[test]
    fn no_soundcards() {
        assert!(parse_cards("--- no soundcards ---\n").is_empty());
    }

    #[test]
    fn missing_cards_file_is_an_enumeration_failure() {
        let cards = AlsaCards::with_path("/nonexistent/asound/cards");
        assert!(matches!(
            cards.device_names(),
            Err(CaptureError::EnumerationFailure(_))
        ));
    }

    #[test]
    fn only_watched_nodes_are_classified() {
        assert!(matches!(
            classify(Path::new("/dev"), OsStr::new("video2")),
            Some(NodeKind::Video)
        ));
        assert!(matches!(
            classify(Path::new("/dev/snd"), OsStr::new("pcmC0D0p")),
            Some(NodeKind::Audio)
        ));
        assert!(classify(Path::new("/dev"), OsStr::new("tty0")).is_none());
        assert!(classify(Path::new("/dev/snd"), OsStr::new("controlC0")).is_none());
    }
}
