#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use videoin::prelude::*;

pub const MARK: u8 = 0xAB;

/// What a mock backend was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetDevice(String),
    Open(u32, u32, u32),
    Close,
    Read,
    Adjust(Adjustment, u32),
}

#[derive(Debug, Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub present: bool,
    pub fail_open: bool,
    pub fail_read: bool,
    pub opened: Option<(u32, u32, u32)>,
    pub selected: Option<DeviceDescriptor>,
}

/// Backend offering one device, with every call recorded.
#[derive(Clone)]
pub struct MockBackend {
    pub framework: String,
    pub device: DeviceDescriptor,
    pub state: Arc<Mutex<MockState>>,
    observer: Arc<Mutex<Option<Arc<dyn BackendObserver>>>>,
}

impl MockBackend {
    pub fn new(name: &str) -> Self {
        Self {
            framework: "v4l".to_string(),
            device: DeviceDescriptor::new("v4l", "v4l", name),
            state: Arc::new(Mutex::new(MockState {
                present: true,
                ..MockState::default()
            })),
            observer: Arc::new(Mutex::new(None)),
        }
    }

    /// Hot-plug subsystem this backend answers to.
    pub fn with_framework(mut self, framework: &str) -> Self {
        self.framework = framework.to_string();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls other than frame reads.
    pub fn control_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| *c != Call::Read).collect()
    }

    pub fn opens(&self) -> Vec<(u32, u32, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Open(w, h, f) => Some((w, h, f)),
                _ => None,
            })
            .collect()
    }

    pub fn adjustments(&self) -> Vec<(Adjustment, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Adjust(kind, value) => Some((kind, value)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().opened.is_some()
    }

    pub fn set_present(&self, present: bool) {
        self.state.lock().unwrap().present = present;
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    pub fn set_fail_read(&self, fail: bool) {
        self.state.lock().unwrap().fail_read = fail;
    }

    pub fn boxed(&self) -> Box<dyn Backend> {
        Box::new(self.clone())
    }
}

impl Backend for MockBackend {
    fn framework(&self) -> &str {
        &self.framework
    }

    fn attach(&mut self, observer: Arc<dyn BackendObserver>) {
        *self.observer.lock().unwrap() = Some(observer);
    }

    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>> {
        let st = self.state.lock().unwrap();
        Ok(if st.present { vec![self.device.clone()] } else { Vec::new() })
    }

    fn set_device(&mut self, device: &DeviceDescriptor, _channel: u32, _format: VideoFormat) -> bool {
        let mut st = self.state.lock().unwrap();
        st.calls.push(Call::SetDevice(device.name.clone()));
        let accepted = st.present && *device == self.device;
        st.selected = accepted.then(|| device.clone());
        accepted
    }

    fn open(&mut self, width: u32, height: u32, fps: u32) -> Result<AdjustmentSet> {
        {
            let mut st = self.state.lock().unwrap();
            st.calls.push(Call::Open(width, height, fps));
            if st.fail_open {
                return Err(CaptureError::OpenFailure {
                    device: self.device.to_string(),
                    width,
                    height,
                    fps,
                    reason: "refused".into(),
                });
            }
            st.opened = Some((width, height, fps));
        }
        let settings = AdjustmentSet::default();
        if let Some(observer) = self.observer.lock().unwrap().as_ref() {
            let config = DeviceConfig {
                geometry: Geometry::new(width, height, fps),
                settings,
                modifiable: true,
            };
            observer.device_opened(&self.device, &config);
        }
        Ok(settings)
    }

    fn close(&mut self) {
        let was_open = {
            let mut st = self.state.lock().unwrap();
            st.calls.push(Call::Close);
            st.opened.take().is_some()
        };
        if was_open {
            if let Some(observer) = self.observer.lock().unwrap().as_ref() {
                observer.device_closed(&self.device);
            }
        }
    }

    fn read_frame(&mut self, buffer: &mut Vec<u8>) -> Result<FrameSize> {
        let mut st = self.state.lock().unwrap();
        st.calls.push(Call::Read);
        let Some((w, h, _)) = st.opened else {
            return Err(CaptureError::NotOpen);
        };
        if st.fail_read {
            return Err(CaptureError::ReadFailure {
                device: self.device.to_string(),
                reason: "unplugged".into(),
            });
        }
        let size = FrameSize::new(w, h);
        buffer.clear();
        buffer.resize(size.yuv420p_len(), MARK);
        Ok(size)
    }

    fn set_adjustment(&mut self, kind: Adjustment, value: u32) -> Result<()> {
        self.state.lock().unwrap().calls.push(Call::Adjust(kind, value));
        Ok(())
    }

    fn resolve_hotplug(
        &self,
        framework: &str,
        name: &str,
        _capabilities: VideoCapabilities,
    ) -> Option<DeviceDescriptor> {
        (framework == self.framework && name == self.device.name).then(|| self.device.clone())
    }
}

#[derive(Default)]
pub struct NullSink {
    pub frames: AtomicUsize,
}

impl DisplaySink for NullSink {
    fn push_frame(&self, _frame: Frame<'_>, _local: bool, _active_devices: usize) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

/// Observer keeping a readable log of notifications.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl VideoInputObserver for Recorder {
    fn device_opened(&self, framework: &str, device: &DeviceDescriptor, config: &DeviceConfig) {
        let g = config.geometry;
        self.push(format!("opened {framework} {} {}x{}", device.name, g.width, g.height));
    }

    fn device_closed(&self, framework: &str, device: &DeviceDescriptor) {
        self.push(format!("closed {framework} {}", device.name));
    }

    fn device_added(&self, device: &DeviceDescriptor, is_desired: bool) {
        self.push(format!("added {} desired={is_desired}", device.name));
    }

    fn device_removed(&self, device: &DeviceDescriptor, was_current: bool) {
        self.push(format!("removed {} current={was_current}", device.name));
    }
}

pub fn controller_with(backends: &[&MockBackend]) -> VideoInputController {
    let mut builder = ControllerBuilder::new(Arc::new(NullSink::default()))
        .preview_interval(Duration::from_millis(1));
    for backend in backends {
        builder = builder.backend(backend.boxed());
    }
    builder.build().unwrap()
}

pub fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}
