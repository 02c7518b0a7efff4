//! Hardware-abstraction aggregator between the hot-plug monitor and its
//! listeners.
//!
//! The core crate keeps to `std::sync` locks so it carries no lock crate; a
//! poisoned lock is recovered, since the guarded lists stay consistent.

use std::sync::{Arc, PoisonError, RwLock};

use crate::hotplug::{HotplugEvent, HotplugSink};

/// Something interested in hot-plug events (the video input controller,
/// an audio core, ...).
pub trait HalListener: Send + Sync {
    /// `origin` names the aggregator that relayed the event.
    fn device_added(&self, event: &HotplugEvent, origin: &str);
    fn device_removed(&self, event: &HotplugEvent, origin: &str);
}

/// Hardware-abstraction aggregator: receives monitor output and fans it out.
pub struct HalCore {
    name: String,
    listeners: RwLock<Vec<Arc<dyn HalListener>>>,
}

impl std::fmt::Debug for HalCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HalCore")
            .field("name", &self.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl HalCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_listener(&self, listener: Arc<dyn HalListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // Listeners are called outside the registry lock so they may register more
    fn snapshot(&self) -> Vec<Arc<dyn HalListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HotplugSink for HalCore {
    fn device_added(&self, event: &HotplugEvent) {
        for listener in self.snapshot() {
            listener.device_added(event, &self.name);
        }
    }

    fn device_removed(&self, event: &HotplugEvent) {
        for listener in self.snapshot() {
            listener.device_removed(event, &self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceClass, VideoCapabilities};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl HalListener for Log {
        fn device_added(&self, event: &HotplugEvent, origin: &str) {
            self.0.lock().unwrap().push(format!("+{}@{}", event.name, origin));
        }

        fn device_removed(&self, event: &HotplugEvent, origin: &str) {
            self.0.lock().unwrap().push(format!("-{}@{}", event.name, origin));
        }
    }

    #[test]
    fn fans_out_to_every_listener_with_origin() {
        let hal = HalCore::new("inotify");
        let a = Arc::new(Log::default());
        let b = Arc::new(Log::default());
        hal.add_listener(a.clone());
        hal.add_listener(b.clone());

        let event = HotplugEvent {
            class: DeviceClass::Video,
            framework: "video4linux".into(),
            name: "cam0".into(),
            capabilities: VideoCapabilities::V4L2,
        };
        hal.device_added(&event);
        hal.device_removed(&event);

        for log in [a, b] {
            assert_eq!(
                *log.0.lock().unwrap(),
                vec!["+cam0@inotify".to_string(), "-cam0@inotify".to_string()]
            );
        }
    }
}
