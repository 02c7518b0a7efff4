//! Local preview loop.
//!
//! One long-lived worker thread, reused across preview sessions. The loop only
//! pulls frames and forwards them to the display; device open/close decisions
//! belong to the controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use videoin_core::frame::{Frame, FrameSize};
use videoin_core::traits::DisplaySink;

/// Default pause between two pulls
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5);

/// Where the loop pulls frames from.
pub trait FrameSource: Send + Sync {
    /// Fills `buffer` with the next frame.
    ///
    /// Implementations waiting on a lock must give up once `cancel` is set,
    /// otherwise `PreviewLoop::stop` can deadlock against a caller holding it.
    fn pull_frame(&self, buffer: &mut Vec<u8>, cancel: &AtomicBool) -> Option<FrameSize>;
}

/// Commands: caller -> worker
enum Command {
    Attach(Weak<dyn FrameSource>),
    Start { width: u32, height: u32 },
    Stop,
    Quit,
}

pub struct PreviewLoop {
    cmd_tx: Sender<Command>,
    // worker -> caller, one ack per Stop
    ack_rx: Receiver<()>,
    cancel: Arc<AtomicBool>,
    running: Mutex<bool>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PreviewLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewLoop")
            .field("running", &*self.running.lock())
            .finish()
    }
}

impl PreviewLoop {
    /// Spawns the worker thread. It idles until [`attach`](Self::attach) and
    /// [`start`](Self::start).
    pub fn spawn(sink: Arc<dyn DisplaySink>, interval: Duration) -> std::io::Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded();
        let (ack_tx, ack_rx) = bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));

        let worker_cancel = cancel.clone();
        let worker = thread::Builder::new()
            .name("videoin-preview".into())
            .spawn(move || run(cmd_rx, ack_tx, worker_cancel, sink, interval))?;

        Ok(Self {
            cmd_tx,
            ack_rx,
            cancel,
            running: Mutex::new(false),
            worker: Some(worker),
        })
    }

    /// Sets the frame source. A dropped source makes the loop idle.
    pub fn attach(&self, source: Weak<dyn FrameSource>) {
        let _ = self.cmd_tx.send(Command::Attach(source));
    }

    /// Allocates a buffer for `width`x`height` and resumes pulling.
    pub fn start(&self, width: u32, height: u32) {
        let mut running = self.running.lock();
        if *running {
            debug!("Preview loop already running");
            return;
        }
        self.cancel.store(false, Ordering::SeqCst);
        if self.cmd_tx.send(Command::Start { width, height }).is_ok() {
            *running = true;
        }
    }

    /// Stops pulling and waits until the worker released its buffer.
    ///
    /// When this returns no frame read is in flight.
    pub fn stop(&self) {
        let mut running = self.running.lock();
        if !*running {
            return;
        }

        self.cancel.store(true, Ordering::SeqCst);
        if self.cmd_tx.send(Command::Stop).is_ok() && self.ack_rx.recv().is_err() {
            warn!("Preview worker exited without acknowledging stop");
        }
        self.cancel.store(false, Ordering::SeqCst);
        *running = false;
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }
}

impl Drop for PreviewLoop {
    fn drop(&mut self) {
        self.stop();
        let _ = self.cmd_tx.send(Command::Quit);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Preview worker panicked");
            }
        }
    }
}

fn run(
    cmd_rx: Receiver<Command>,
    ack_tx: Sender<()>,
    cancel: Arc<AtomicBool>,
    sink: Arc<dyn DisplaySink>,
    interval: Duration,
) {
    let mut source: Option<Weak<dyn FrameSource>> = None;

    // Idle: wait for commands
    while let Ok(cmd) = cmd_rx.recv() {
        let (width, height) = match cmd {
            Command::Attach(s) => {
                source = Some(s);
                continue;
            }
            Command::Start { width, height } => (width, height),
            Command::Stop => {
                let _ = ack_tx.send(());
                continue;
            }
            Command::Quit => break,
        };

        info!(width, height, "Preview loop started");
        let mut buffer = Vec::with_capacity(FrameSize::new(width, height).yuv420p_len());

        // Running: pull, push, sleep
        let quit = loop {
            if let Some(src) = source.as_ref().and_then(Weak::upgrade) {
                if let Some(size) = src.pull_frame(&mut buffer, &cancel) {
                    sink.push_frame(Frame::new(&buffer, size), true, 1);
                }
            }

            match cmd_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(Command::Attach(s)) => source = Some(s),
                Ok(Command::Start { .. }) => {}
                Ok(Command::Stop) => break false,
                Ok(Command::Quit) | Err(RecvTimeoutError::Disconnected) => break true,
            }
        };

        drop(buffer);
        info!("Preview loop stopped");
        let _ = ack_tx.send(());
        if quit {
            break;
        }
    }
    debug!("Preview worker exiting");
}
