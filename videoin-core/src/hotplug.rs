//! Translation of OS device notifications into add/remove events.
//!
//! The monitor never touches a backend. It only filters raw notifications to
//! capture-class and audio-class hardware and emits [`HotplugEvent`]s into a
//! [`HotplugSink`] (normally a [`HalCore`](crate::hal::HalCore)).
//!
//! Like the rest of the core crate it uses `std::sync` locks; see
//! [`hal`](crate::hal).

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::device::{DeviceClass, VideoCapabilities};
use crate::error::Result;

/// Capability string a capture device must advertise.
pub const CAPTURE_CAPABILITY: &str = "video_capture";

/// Subsystem name of capture-class events.
pub const VIDEO_SUBSYSTEM: &str = "video4linux";

/// Kind of OS notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugAction {
    Add,
    Remove,
    /// change/bind/... notifications, ignored
    Other,
}

impl HotplugAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "add" => Self::Add,
            "remove" => Self::Remove,
            _ => Self::Other,
        }
    }
}

/// Raw device description as delivered by the OS event source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDevice {
    /// Device node or OS path (e.g. "/dev/video0")
    pub node: String,

    /// Product / card name, when the OS knows one
    pub name: Option<String>,

    /// API level string: "video4linux" or "video4linux2"
    pub api: Option<String>,

    /// Advertised capability strings (e.g. "video_capture")
    pub capabilities: Vec<String>,
}

impl RawDevice {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn api(mut self, api: impl Into<String>) -> Self {
        self.api = Some(api.into());
        self
    }

    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }
}

/// Abstracted add/remove notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotplugEvent {
    pub class: DeviceClass,
    /// Subsystem the device was seen on (e.g. "video4linux", "alsa")
    pub framework: String,
    pub name: String,
    pub capabilities: VideoCapabilities,
}

/// Consumer of monitor output.
pub trait HotplugSink: Send + Sync {
    fn device_added(&self, event: &HotplugEvent);
    fn device_removed(&self, event: &HotplugEvent);
}

/// Lists audio device names.
///
/// Audio subsystems do not report which device changed, so the monitor
/// re-enumerates on every audio event and diffs.
pub trait AudioEnumerator: Send + Sync {
    fn device_names(&self) -> Result<Vec<String>>;
}

pub struct HotplugMonitor {
    sink: Arc<dyn HotplugSink>,
    audio: Box<dyn AudioEnumerator>,
    audio_devices: Mutex<Vec<String>>,
}

impl std::fmt::Debug for HotplugMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotplugMonitor")
            .field("audio_devices", &self.cached_audio_devices())
            .finish()
    }
}

impl HotplugMonitor {
    /// Creates a monitor and primes the audio device cache.
    pub fn new(sink: Arc<dyn HotplugSink>, audio: Box<dyn AudioEnumerator>) -> Self {
        let initial = audio.device_names().unwrap_or_else(|err| {
            warn!(%err, "Initial audio enumeration failed, starting with an empty list");
            Vec::new()
        });

        Self {
            sink,
            audio,
            audio_devices: Mutex::new(initial),
        }
    }

    /// Entry point for the OS event source. Never fails.
    pub fn handle_event(&self, action: &str, subsystem: &str, raw: &RawDevice) {
        let action = HotplugAction::parse(action);
        if action == HotplugAction::Other {
            return;
        }

        match classify(subsystem) {
            Some(DeviceClass::Video) => self.handle_capture(action, subsystem, raw),
            Some(DeviceClass::Audio) => self.handle_audio(action, subsystem),
            None => debug!(subsystem, node = %raw.node, "Ignoring event from unwatched subsystem"),
        }
    }

    pub fn cached_audio_devices(&self) -> Vec<String> {
        self.audio_devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn handle_capture(&self, action: HotplugAction, subsystem: &str, raw: &RawDevice) {
        let level = match raw.api.as_deref() {
            Some("video4linux") => VideoCapabilities::V4L1,
            Some("video4linux2") => VideoCapabilities::V4L2,
            other => {
                debug!(node = %raw.node, api = ?other, "Unrecognised capture API level");
                return;
            }
        };

        if !raw.capabilities.iter().any(|c| c == CAPTURE_CAPABILITY) {
            debug!(node = %raw.node, "Device does not advertise video capture");
            return;
        }

        let event = HotplugEvent {
            class: DeviceClass::Video,
            framework: subsystem.to_string(),
            name: raw.name.clone().unwrap_or_else(|| raw.node.clone()),
            capabilities: level,
        };

        match action {
            HotplugAction::Add => {
                info!(name = %event.name, "Video device added");
                self.sink.device_added(&event);
            }
            HotplugAction::Remove => {
                info!(name = %event.name, "Video device removed");
                self.sink.device_removed(&event);
            }
            HotplugAction::Other => {}
        }
    }

    fn handle_audio(&self, action: HotplugAction, subsystem: &str) {
        let fresh = match self.audio.device_names() {
            Ok(names) => names,
            Err(err) => {
                warn!(%err, subsystem, "Audio enumeration failed, keeping cached list");
                return;
            }
        };

        let (added, removed) = {
            let mut cached = self
                .audio_devices
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let added: Vec<String> = fresh
                .iter()
                .filter(|name| !cached.contains(name))
                .cloned()
                .collect();

            // Only the first missing entry is reported: when several devices
            // vanish in one event the rest are silently dropped from the cache.
            let removed = if action == HotplugAction::Remove {
                cached.iter().find(|name| !fresh.contains(name)).cloned()
            } else {
                None
            };

            *cached = fresh;
            (added, removed)
        };

        let event = |name: String| HotplugEvent {
            class: DeviceClass::Audio,
            framework: subsystem.to_string(),
            name,
            capabilities: VideoCapabilities::empty(),
        };

        for name in added {
            info!(%name, "Audio device added");
            self.sink.device_added(&event(name));
        }
        if let Some(name) = removed {
            info!(%name, "Audio device removed");
            self.sink.device_removed(&event(name));
        }
    }
}

fn classify(subsystem: &str) -> Option<DeviceClass> {
    match subsystem {
        VIDEO_SUBSYSTEM => Some(DeviceClass::Video),
        "alsa" | "oss" | "sound" => Some(DeviceClass::Audio),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(bool, HotplugEvent)>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<(bool, HotplugEvent)> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl HotplugSink for Recorder {
        fn device_added(&self, event: &HotplugEvent) {
            self.events.lock().unwrap().push((true, event.clone()));
        }

        fn device_removed(&self, event: &HotplugEvent) {
            self.events.lock().unwrap().push((false, event.clone()));
        }
    }

    /// Audio enumerator whose answer the test rewrites between events.
    #[derive(Clone, Default)]
    struct ScriptedAudio(Arc<Mutex<Option<Vec<String>>>>);

    impl ScriptedAudio {
        fn set(&self, names: &[&str]) {
            *self.0.lock().unwrap() = Some(names.iter().map(|n| n.to_string()).collect());
        }

        fn fail(&self) {
            *self.0.lock().unwrap() = None;
        }
    }

    impl AudioEnumerator for ScriptedAudio {
        fn device_names(&self) -> Result<Vec<String>> {
            self.0
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| CaptureError::EnumerationFailure("scripted".into()))
        }
    }

    fn monitor(initial: &[&str]) -> (HotplugMonitor, Arc<Recorder>, ScriptedAudio) {
        let recorder = Arc::new(Recorder::default());
        let audio = ScriptedAudio::default();
        audio.set(initial);
        let monitor = HotplugMonitor::new(recorder.clone(), Box::new(audio.clone()));
        (monitor, recorder, audio)
    }

    fn webcam() -> RawDevice {
        RawDevice::new("/dev/video0")
            .name("Webcam")
            .api("video4linux2")
            .capability(CAPTURE_CAPABILITY)
    }

    #[test]
    fn capture_add_and_remove_are_forwarded() {
        let (monitor, recorder, _) = monitor(&[]);

        monitor.handle_event("add", VIDEO_SUBSYSTEM, &webcam());
        monitor.handle_event("remove", VIDEO_SUBSYSTEM, &webcam());

        let events = recorder.take();
        assert_eq!(events.len(), 2);
        assert!(events[0].0);
        assert!(!events[1].0);
        assert_eq!(events[0].1.name, "Webcam");
        assert_eq!(events[0].1.framework, VIDEO_SUBSYSTEM);
        assert_eq!(events[0].1.capabilities, VideoCapabilities::V4L2);
    }

    #[test]
    fn non_add_remove_actions_are_ignored() {
        let (monitor, recorder, _) = monitor(&[]);
        monitor.handle_event("change", VIDEO_SUBSYSTEM, &webcam());
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn capture_requires_known_api_and_capture_capability() {
        let (monitor, recorder, _) = monitor(&[]);

        let no_api = RawDevice::new("/dev/video1").capability(CAPTURE_CAPABILITY);
        let output_only = RawDevice::new("/dev/video2")
            .api("video4linux2")
            .capability("video_output");
        let weird_api = RawDevice::new("/dev/video3")
            .api("video4linux3")
            .capability(CAPTURE_CAPABILITY);

        for raw in [no_api, output_only, weird_api] {
            monitor.handle_event("add", VIDEO_SUBSYSTEM, &raw);
        }
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn v4l1_level_and_node_fallback_name() {
        let (monitor, recorder, _) = monitor(&[]);
        let raw = RawDevice::new("/dev/video7")
            .api("video4linux")
            .capability(CAPTURE_CAPABILITY);

        monitor.handle_event("add", VIDEO_SUBSYSTEM, &raw);

        let events = recorder.take();
        assert_eq!(events[0].1.name, "/dev/video7");
        assert_eq!(events[0].1.capabilities, VideoCapabilities::V4L1);
    }

    #[test]
    fn audio_add_reports_new_names() {
        let (monitor, recorder, audio) = monitor(&["HDA Intel"]);
        audio.set(&["HDA Intel", "USB Headset"]);

        monitor.handle_event("add", "alsa", &RawDevice::new("/dev/snd/pcmC1D0c"));

        let events = recorder.take();
        assert_eq!(events.len(), 1);
        assert!(events[0].0);
        assert_eq!(events[0].1.class, DeviceClass::Audio);
        assert_eq!(events[0].1.name, "USB Headset");
        assert_eq!(
            monitor.cached_audio_devices(),
            vec!["HDA Intel".to_string(), "USB Headset".to_string()]
        );
    }

    #[test]
    fn audio_remove_reports_only_first_missing_entry() {
        let (monitor, recorder, audio) = monitor(&["A", "B", "C"]);
        audio.set(&["C"]);

        monitor.handle_event("remove", "alsa", &RawDevice::default());

        let events = recorder.take();
        assert_eq!(events.len(), 1);
        assert!(!events[0].0);
        assert_eq!(events[0].1.name, "A");
        // B vanished too but is gone from the cache without an event
        assert_eq!(monitor.cached_audio_devices(), vec!["C".to_string()]);
    }

    #[test]
    fn audio_enumeration_failure_keeps_cache() {
        let (monitor, recorder, audio) = monitor(&["A"]);
        audio.fail();

        monitor.handle_event("remove", "alsa", &RawDevice::default());

        assert!(recorder.take().is_empty());
        assert_eq!(monitor.cached_audio_devices(), vec!["A".to_string()]);
    }

    #[test]
    fn unknown_subsystem_is_ignored() {
        let (monitor, recorder, _) = monitor(&[]);
        monitor.handle_event("add", "usb", &webcam());
        assert!(recorder.take().is_empty());
    }
}
