use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use videoin_core::device::{DeviceDescriptor, DeviceErrorCode};
use videoin_core::traits::{BackendObserver, DeviceConfig};

use crate::dispatch::Job;

/// Notifications published by the controller, always on the main context
/// and never while the controller state is locked.
#[allow(unused_variables)]
pub trait VideoInputObserver: Send + Sync {
    fn device_opened(&self, framework: &str, device: &DeviceDescriptor, config: &DeviceConfig) {}

    fn device_closed(&self, framework: &str, device: &DeviceDescriptor) {}

    fn device_error(&self, framework: &str, device: &DeviceDescriptor, code: DeviceErrorCode) {}

    /// `is_desired` is set when the device is the one configuration asked for.
    fn device_added(&self, device: &DeviceDescriptor, is_desired: bool) {}

    /// `was_current` is set when the device was open when it disappeared.
    fn device_removed(&self, device: &DeviceDescriptor, was_current: bool) {}
}

/// Subscriber list shared between the controller and its backend relays.
#[derive(Default)]
pub(crate) struct Subscribers {
    list: RwLock<Vec<Arc<dyn VideoInputObserver>>>,
}

impl Subscribers {
    pub(crate) fn add(&self, observer: Arc<dyn VideoInputObserver>) {
        self.list.write().push(observer);
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn VideoInputObserver>> {
        self.list.read().clone()
    }
}

/// Wraps `notify` into a job calling every subscriber.
///
/// Jobs are queued while the state lock is held and handed to the main
/// context only after it is released.
pub(crate) fn notification<F>(subscribers: &Arc<Subscribers>, notify: F) -> Job
where
    F: Fn(&dyn VideoInputObserver) + Send + 'static,
{
    let subscribers = subscribers.clone();
    Box::new(move || {
        for observer in subscribers.snapshot() {
            notify(observer.as_ref());
        }
    })
}

/// Connects one backend's signals to the controller's subscribers.
pub(crate) struct EventRelay {
    pub(crate) framework: String,
    pub(crate) subscribers: Arc<Subscribers>,
    pub(crate) outbox: Sender<Job>,
}

impl EventRelay {
    fn post<F>(&self, notify: F)
    where
        F: Fn(&dyn VideoInputObserver) + Send + 'static,
    {
        // Receiver lives as long as the controller owning this backend
        let _ = self.outbox.send(notification(&self.subscribers, notify));
    }
}

impl BackendObserver for EventRelay {
    fn device_opened(&self, device: &DeviceDescriptor, config: &DeviceConfig) {
        let (framework, device, config) = (self.framework.clone(), device.clone(), *config);
        self.post(move |o| o.device_opened(&framework, &device, &config));
    }

    fn device_closed(&self, device: &DeviceDescriptor) {
        let (framework, device) = (self.framework.clone(), device.clone());
        self.post(move |o| o.device_closed(&framework, &device));
    }

    fn device_error(&self, device: &DeviceDescriptor, code: DeviceErrorCode) {
        let (framework, device) = (self.framework.clone(), device.clone());
        self.post(move |o| o.device_error(&framework, &device, code));
    }
}
