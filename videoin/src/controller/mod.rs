//! Device input controller.
//!
//! Owns the registered backends and decides every open, close, reconfigure
//! and fallback. Frames are pulled through [`VideoInputController::get_frame_data`]
//! by either the preview loop or the call media pipeline.
//!
//! Locking: the state lock guards device identity and mode activity, the
//! adjustment lock guards pending picture adjustments. The state lock is
//! always taken first.

mod events;
mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, error, info, warn};
use videoin_core::config::{Adjustment, Geometry, ModeConfig};
use videoin_core::device::{DeviceClass, DeviceDescriptor, VideoCapabilities, VideoFormat};
use videoin_core::error::Result;
use videoin_core::frame::FrameSize;
use videoin_core::hal::HalListener;
use videoin_core::hotplug::HotplugEvent;
use videoin_core::traits::{Backend, DisplaySink};

use crate::dispatch::{Immediate, Job, MainContext};
use crate::fallback::MovingLogoBackend;
use crate::preview::{FrameSource, PreviewLoop, DEFAULT_INTERVAL};

pub use events::VideoInputObserver;
pub use state::Mode;

use events::{notification, EventRelay, Subscribers};
use state::{Adjustments, State};

// How long a preview pull waits for the state lock before rechecking cancel
const PULL_LOCK_SLICE: Duration = Duration::from_millis(10);

/// Which consumer currently owns the open device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Idle,
    PreviewOnly,
    /// Also reported while preview stays requested during a stream
    StreamOnly,
}

pub struct ControllerBuilder {
    display: Arc<dyn DisplaySink>,
    main: Arc<dyn MainContext>,
    preview: Geometry,
    stream: Geometry,
    interval: Duration,
    backends: Vec<Box<dyn Backend>>,
}

impl std::fmt::Debug for ControllerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerBuilder")
            .field("preview", &self.preview)
            .field("stream", &self.stream)
            .field("interval", &self.interval)
            .field("backends", &self.backends.len())
            .finish()
    }
}

impl ControllerBuilder {
    pub fn new(display: Arc<dyn DisplaySink>) -> Self {
        Self {
            display,
            main: Arc::new(Immediate),
            preview: Geometry::PREVIEW_DEFAULT,
            stream: Geometry::STREAM_DEFAULT,
            interval: DEFAULT_INTERVAL,
            backends: Vec::new(),
        }
    }

    /// Where observer notifications run. Defaults to [`Immediate`].
    ///
    /// Notifications are handed over one at a time and in order. With
    /// [`Immediate`] they run on the thread that caused them, or on the
    /// `videoin-events` thread for those raised by the preview loop; use a
    /// queue such as [`MainQueue`](crate::dispatch::MainQueue) to see them
    /// all on one thread.
    pub fn main_context(mut self, main: Arc<dyn MainContext>) -> Self {
        self.main = main;
        self
    }

    pub fn preview_geometry(mut self, width: u32, height: u32, fps: u32) -> Self {
        self.preview = Geometry::new(width, height, fps);
        self
    }

    pub fn stream_geometry(mut self, width: u32, height: u32, fps: u32) -> Self {
        self.stream = Geometry::new(width, height, fps);
        self
    }

    /// Pause between two preview pulls
    pub fn preview_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Registers a backend after the built-in fallback one.
    pub fn backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn build(self) -> Result<VideoInputController> {
        let preview = PreviewLoop::spawn(self.display, self.interval)?;
        let (outbox_tx, outbox_rx) = unbounded();
        let (wake_tx, wake_rx) = bounded(1);

        let inner = Arc::new(Inner {
            state: Mutex::new(State::new(self.preview, self.stream)),
            adjustments: Mutex::new(Adjustments::default()),
            preview,
            subscribers: Arc::new(Subscribers::default()),
            main: self.main,
            outbox_tx,
            outbox_rx,
            dispatching: ReentrantMutex::new(()),
            wake_tx,
        });
        let source: Weak<dyn FrameSource> = Arc::downgrade(&inner) as Weak<dyn FrameSource>;
        inner.preview.attach(source);

        let events = Arc::downgrade(&inner);
        thread::Builder::new()
            .name("videoin-events".into())
            .spawn(move || run_events(events, wake_rx))?;

        let controller = VideoInputController { inner };
        controller.add_backend(Box::new(MovingLogoBackend::new()));
        for backend in self.backends {
            controller.add_backend(backend);
        }
        Ok(controller)
    }
}

struct Inner {
    state: Mutex<State>,
    adjustments: Mutex<Adjustments>,
    preview: PreviewLoop,
    subscribers: Arc<Subscribers>,
    main: Arc<dyn MainContext>,
    // Notifications raised under the state lock, dispatched after it
    outbox_tx: Sender<Job>,
    outbox_rx: Receiver<Job>,
    // Held while handing jobs over; reentrant for observers calling back in
    dispatching: ReentrantMutex<()>,
    // Preview pulls leave their jobs to the events thread
    wake_tx: Sender<()>,
}

impl Inner {
    fn post(&self, job: Job) {
        let _ = self.outbox_tx.send(job);
    }

    /// Hands queued notifications to the main context. Never call with the
    /// state lock held.
    fn flush_events(&self) {
        let _dispatching = self.dispatching.lock();
        while let Ok(job) = self.outbox_rx.try_recv() {
            self.main.run_in_main(job);
        }
    }

    fn sync_modes(&self, st: &State) {
        let mut adj = self.adjustments.lock();
        adj.preview_active = st.preview.active;
        adj.stream_active = st.stream.active;
    }

    fn start_loop(&self, st: &State) {
        let geometry = st.opened.unwrap_or(st.preview.geometry);
        self.preview.start(geometry.width, geometry.height);
    }

    /// Moves the active modes onto `device`, or onto the fallback device if
    /// no backend accepts it.
    fn swap(&self, st: &mut State, device: &DeviceDescriptor) {
        let preview_only = st.preview_only();

        if preview_only {
            self.preview.stop();
        }
        if st.any_active() {
            st.close();
        }

        st.select(device);

        if preview_only {
            st.open(Mode::Preview);
            self.start_loop(st);
        }
        if st.stream.active {
            st.open(Mode::Stream);
        }
    }

    /// Reads one frame, falling back to the synthetic device once on failure.
    fn read_locked(&self, st: &mut State, buffer: &mut Vec<u8>) -> Option<FrameSize> {
        let mode = st.active_mode()?;

        let size = match st.read(buffer) {
            Ok(size) => size,
            Err(err) => {
                warn!(%err, device = %st.current_device, "Frame read failed, switching to fallback device");
                st.close();
                st.select_fallback();
                st.open(mode);

                match st.read(buffer) {
                    Ok(size) => size,
                    Err(err) => {
                        error!(%err, "Fallback device failed to deliver a frame");
                        blank_frame(buffer, st.open_geometry(mode))
                    }
                }
            }
        };

        self.flush_adjustments(st);
        Some(size)
    }

    /// Pushes pending adjustments of the exclusively active mode.
    fn flush_adjustments(&self, st: &mut State) {
        let Some(index) = st.manager else { return };

        let (mode, changes) = {
            let adj = self.adjustments.lock();
            let Some(mode) = adj.exclusive_mode() else { return };
            (mode, adj.pending(mode).diff(&st.mode(mode).settings))
        };

        for (kind, value) in changes {
            if let Err(err) = st.backends[index].set_adjustment(kind, value) {
                debug!(%err, ?kind, value, "Adjustment not applied");
            }
            st.mode_mut(mode).settings.set(kind, value);
        }
    }

    fn request_adjustment(&self, kind: Adjustment, value: u32) {
        let mut adj = self.adjustments.lock();
        match adj.exclusive_mode() {
            Some(mode) => adj.pending_mut(mode).request(kind, value),
            None => debug!(?kind, value, "No exclusive mode, adjustment dropped"),
        }
    }
}

impl FrameSource for Inner {
    fn pull_frame(&self, buffer: &mut Vec<u8>, cancel: &AtomicBool) -> Option<FrameSize> {
        let mut st = loop {
            if cancel.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(guard) = self.state.try_lock_for(PULL_LOCK_SLICE) {
                break guard;
            }
        };

        // The loop only feeds the display while nothing else owns the device
        let size = if st.preview_only() {
            self.read_locked(&mut st, buffer)
        } else {
            None
        };

        drop(st);
        // Observers never run on the preview thread
        if !self.outbox_rx.is_empty() {
            let _ = self.wake_tx.try_send(());
        }
        size
    }
}

/// Video input controller.
///
/// Share it as `Arc<VideoInputController>`; dropping it stops the preview
/// loop and closes any open device.
pub struct VideoInputController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for VideoInputController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoInputController")
            .field("mode", &self.mode())
            .field("current_device", &self.current_device())
            .finish()
    }
}

impl VideoInputController {
    pub fn builder(display: Arc<dyn DisplaySink>) -> ControllerBuilder {
        ControllerBuilder::new(display)
    }

    /// Runs `op` under the state lock, then dispatches whatever it queued.
    fn with_state<R>(&self, op: impl FnOnce(&Inner, &mut State) -> R) -> R {
        let result = {
            let mut st = self.inner.state.lock();
            op(&self.inner, &mut st)
        };
        self.inner.flush_events();
        result
    }

    pub fn subscribe(&self, observer: Arc<dyn VideoInputObserver>) {
        self.inner.subscribers.add(observer);
    }

    /// Registers a backend. Its signals are wired before it becomes usable.
    pub fn add_backend(&self, mut backend: Box<dyn Backend>) {
        let framework = backend.framework().to_owned();
        backend.attach(Arc::new(EventRelay {
            framework: framework.clone(),
            subscribers: self.inner.subscribers.clone(),
            outbox: self.inner.outbox_tx.clone(),
        }));

        self.with_state(|_, st| {
            st.backends.push(backend);
            info!(%framework, backends = st.backends.len(), "Backend registered");
        });
    }

    /// Devices offered by every backend, in registration order.
    pub fn enumerate_devices(&self) -> Vec<DeviceDescriptor> {
        self.with_state(|_, st| {
            let mut devices = Vec::new();
            for backend in st.backends.iter_mut() {
                match backend.devices() {
                    Ok(list) => devices.extend(list),
                    Err(err) => warn!(%err, framework = backend.framework(), "Enumeration failed"),
                }
            }
            devices
        })
    }

    /// Records the desired device and moves active modes onto it.
    ///
    /// While idle nothing is touched; the device is resolved at the next
    /// activation.
    pub fn set_device(&self, device: DeviceDescriptor, channel: u32, format: VideoFormat) {
        self.with_state(|inner, st| {
            st.desired_device = device.clone();
            st.channel = channel;
            st.format = format;

            if st.any_active() {
                info!(%device, channel, ?format, "Switching device");
                inner.swap(st, &device);
            } else {
                debug!(%device, "No active mode, device recorded");
            }
        });
    }

    /// Sets the preview geometry, reopening the device when preview alone
    /// owns it.
    pub fn set_preview_config(&self, width: u32, height: u32, fps: u32) {
        let geometry = Geometry::new(width, height, fps);
        self.with_state(|inner, st| {
            if st.preview_only() && st.preview.geometry != geometry {
                info!(width, height, fps, "Reopening preview");
                inner.preview.stop();
                st.close();
                st.preview.geometry = geometry;
                st.open(Mode::Preview);
                inner.start_loop(st);
            } else {
                st.preview.geometry = geometry;
            }
        });
    }

    /// Latches the stream geometry for the next [`start_stream`](Self::start_stream).
    pub fn set_stream_config(&self, width: u32, height: u32, fps: u32) {
        self.with_state(|_, st| {
            st.stream.geometry = Geometry::new(width, height, fps);
        });
    }

    pub fn start_preview(&self) {
        self.with_state(|inner, st| {
            if st.preview.active {
                debug!("Preview already active");
                return;
            }
            st.preview.active = true;

            if st.stream.active {
                debug!("Stream active, preview rides on it");
            } else {
                st.select_desired_if_needed();
                st.open(Mode::Preview);
                inner.start_loop(st);
            }
            inner.sync_modes(st);
        });
    }

    pub fn stop_preview(&self) {
        self.with_state(|inner, st| {
            if !st.preview.active {
                return;
            }
            st.preview.active = false;

            if !st.stream.active {
                inner.preview.stop();
                st.release();
            }
            inner.sync_modes(st);
        });
    }

    pub fn start_stream(&self) {
        self.with_state(|inner, st| {
            if st.stream.active {
                debug!("Stream already active");
                return;
            }
            st.live_stream = st.stream.geometry;
            let geometry = st.live_stream;

            if st.preview.active {
                inner.preview.stop();
                st.stream.active = true;
                if st.opened == Some(geometry) {
                    st.stream.settings = st.preview.settings;
                } else {
                    st.close();
                    st.open(Mode::Stream);
                }
            } else {
                st.stream.active = true;
                st.select_desired_if_needed();
                st.open(Mode::Stream);
            }
            inner.sync_modes(st);
        });
    }

    pub fn stop_stream(&self) {
        self.with_state(|inner, st| {
            if !st.stream.active {
                return;
            }
            st.stream.active = false;

            if st.preview.active {
                let geometry = st.preview.geometry;
                if st.opened == Some(geometry) {
                    st.preview.settings = st.stream.settings;
                } else {
                    st.close();
                    st.open(Mode::Preview);
                }
                inner.start_loop(st);
            } else {
                st.release();
            }
            inner.sync_modes(st);
        });
    }

    /// Reads the next I420 frame into `buffer`.
    ///
    /// Device failures are absorbed by switching to the fallback device;
    /// `None` only means no mode is active.
    pub fn get_frame_data(&self, buffer: &mut Vec<u8>) -> Option<FrameSize> {
        self.with_state(|inner, st| inner.read_locked(st, buffer))
    }

    pub fn set_colour(&self, value: u32) {
        self.inner.request_adjustment(Adjustment::Colour, value);
    }

    pub fn set_brightness(&self, value: u32) {
        self.inner.request_adjustment(Adjustment::Brightness, value);
    }

    pub fn set_whiteness(&self, value: u32) {
        self.inner.request_adjustment(Adjustment::Whiteness, value);
    }

    pub fn set_contrast(&self, value: u32) {
        self.inner.request_adjustment(Adjustment::Contrast, value);
    }

    /// Reaction to a hot-plugged device.
    ///
    /// A device matching the desired one replaces whatever active modes are
    /// running on.
    pub fn add_device(&self, framework: &str, name: &str, capabilities: VideoCapabilities, origin: &str) {
        self.with_state(|inner, st| {
            let found = resolve(st, framework, name, capabilities);
            if found.is_empty() {
                debug!(framework, name, origin, "Added device not recognised by any backend");
            }

            for device in found {
                let is_desired = device == st.desired_device;
                info!(%device, origin, is_desired, "Device added");

                let already_open = st.is_open() && st.current_device == device;
                if is_desired && st.any_active() && !already_open {
                    inner.swap(st, &device);
                }
                inner.post(notification(&inner.subscribers, move |o| {
                    o.device_added(&device, is_desired)
                }));
            }
        });
    }

    /// Reaction to an unplugged device. Losing the open device moves the
    /// active modes to the fallback device before anything can read.
    pub fn remove_device(&self, framework: &str, name: &str, capabilities: VideoCapabilities, origin: &str) {
        self.with_state(|inner, st| {
            for device in resolve(st, framework, name, capabilities) {
                let was_current = st.is_open() && st.current_device == device;
                info!(%device, origin, was_current, "Device removed");

                if was_current {
                    inner.swap(st, &DeviceDescriptor::fallback());
                }
                inner.post(notification(&inner.subscribers, move |o| {
                    o.device_removed(&device, was_current)
                }));
            }
        });
    }

    pub fn mode(&self) -> ModeState {
        let st = self.inner.state.lock();
        match st.active_mode() {
            None => ModeState::Idle,
            Some(Mode::Preview) => ModeState::PreviewOnly,
            Some(Mode::Stream) => ModeState::StreamOnly,
        }
    }

    /// Device actually serving frames, or the desired one while idle.
    pub fn current_device(&self) -> DeviceDescriptor {
        self.inner.state.lock().current_device.clone()
    }

    pub fn desired_device(&self) -> DeviceDescriptor {
        self.inner.state.lock().desired_device.clone()
    }

    pub fn preview_config(&self) -> ModeConfig {
        self.inner.state.lock().preview
    }

    pub fn stream_config(&self) -> ModeConfig {
        self.inner.state.lock().stream
    }

    pub fn is_preview_running(&self) -> bool {
        self.inner.preview.is_running()
    }
}

impl Drop for VideoInputController {
    fn drop(&mut self) {
        self.inner.preview.stop();
        self.with_state(|inner, st| {
            st.preview.active = false;
            st.stream.active = false;
            st.release();
            inner.sync_modes(st);
        });
        debug!("Video input controller shut down");
    }
}

impl HalListener for VideoInputController {
    fn device_added(&self, event: &HotplugEvent, origin: &str) {
        if event.class == DeviceClass::Video {
            self.add_device(&event.framework, &event.name, event.capabilities, origin);
        }
    }

    fn device_removed(&self, event: &HotplugEvent, origin: &str) {
        if event.class == DeviceClass::Video {
            self.remove_device(&event.framework, &event.name, event.capabilities, origin);
        }
    }
}

/// Dispatches notifications raised by preview pulls. Exits once the
/// controller is gone.
fn run_events(inner: Weak<Inner>, wake_rx: Receiver<()>) {
    while wake_rx.recv().is_ok() {
        match inner.upgrade() {
            Some(inner) => inner.flush_events(),
            None => break,
        }
    }
    debug!("Events thread exiting");
}

fn resolve(
    st: &State,
    framework: &str,
    name: &str,
    capabilities: VideoCapabilities,
) -> Vec<DeviceDescriptor> {
    st.backends
        .iter()
        .filter_map(|backend| backend.resolve_hotplug(framework, name, capabilities))
        .collect()
}

/// Black I420 frame at `geometry`.
fn blank_frame(buffer: &mut Vec<u8>, geometry: Geometry) -> FrameSize {
    let size = FrameSize::new(geometry.width, geometry.height);
    let luma = geometry.width as usize * geometry.height as usize;
    buffer.clear();
    buffer.resize(luma, 16);
    buffer.resize(size.yuv420p_len(), 128);
    size
}
