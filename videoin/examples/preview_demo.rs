// videoin/examples/preview_demo.rs
//
// Runs the local preview for a few seconds, printing frame rates, and reacts
// to cameras being plugged in or out while it runs.
//
//   RUST_LOG=videoin=debug cargo run --example preview_demo

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use videoin::prelude::*;

#[derive(Default)]
struct FpsCounter {
    frames: AtomicUsize,
}

impl DisplaySink for FpsCounter {
    fn push_frame(&self, _frame: Frame<'_>, _local: bool, _active_devices: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }
}

struct Printer;

impl VideoInputObserver for Printer {
    fn device_opened(&self, framework: &str, device: &DeviceDescriptor, config: &DeviceConfig) {
        let g = config.geometry;
        println!("opened {device} via {framework} at {}x{}@{}", g.width, g.height, g.fps);
    }

    fn device_closed(&self, _framework: &str, device: &DeviceDescriptor) {
        println!("closed {device}");
    }

    fn device_added(&self, device: &DeviceDescriptor, is_desired: bool) {
        println!("plugged {device} (desired: {is_desired})");
    }

    fn device_removed(&self, device: &DeviceDescriptor, was_current: bool) {
        println!("unplugged {device} (was in use: {was_current})");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let sink = Arc::new(FpsCounter::default());
    let queue = MainQueue::new();

    let mut builder = ControllerBuilder::new(sink.clone()).main_context(Arc::new(queue.clone()));
    for backend in platform_backends() {
        builder = builder.backend(backend);
    }
    let controller = Arc::new(builder.build()?);
    controller.subscribe(Arc::new(Printer));

    let devices = controller.enumerate_devices();
    for device in &devices {
        println!("found {device}");
    }

    // Prefer the first real camera
    if let Some(device) = devices.iter().find(|d| !d.is_fallback()) {
        controller.set_device(device.clone(), 0, VideoFormat::Auto);
    }

    let hal = Arc::new(HalCore::new("HAL-inotify"));
    hal.add_listener(controller.clone());
    #[cfg(all(target_os = "linux", feature = "linux-v4l2"))]
    let _watcher = {
        use videoin_backend_v4l2::{AlsaCards, DevWatcher};
        let monitor = Arc::new(HotplugMonitor::new(hal.clone(), Box::new(AlsaCards::new())));
        DevWatcher::spawn(monitor)?
    };

    controller.start_preview();

    let started = Instant::now();
    let mut tick = Instant::now();
    while started.elapsed() < Duration::from_secs(10) {
        // Notifications run here, on the main thread
        queue.run_one(Duration::from_millis(100));
        queue.run_pending();

        if tick.elapsed() >= Duration::from_secs(1) {
            let frames = sink.frames.swap(0, Ordering::Relaxed);
            let fps = frames as f64 / tick.elapsed().as_secs_f64();
            println!("{fps:.1} fps from {}", controller.current_device());
            tick = Instant::now();
        }
    }

    controller.stop_preview();
    queue.run_pending();
    Ok(())
}
