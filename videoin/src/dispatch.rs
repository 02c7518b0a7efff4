//! Redispatching notifications onto the application's main context.
//!
//! Device events originate on hot-plug callback threads, the preview worker
//! or media threads. Subscribers that touch UI state expect to be called from
//! one thread only, so every notification goes through a [`MainContext`].

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Work item queued for the main context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait MainContext: Send + Sync {
    fn run_in_main(&self, job: Job);
}

/// Runs jobs inline on the calling thread.
///
/// For headless use where no thread owns UI state.
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

impl MainContext for Immediate {
    fn run_in_main(&self, job: Job) {
        job();
    }
}

/// Queue drained by whoever owns the main thread.
#[derive(Debug, Clone)]
pub struct MainQueue {
    tx: Sender<Job>,
    rx: Receiver<Job>,
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Runs every queued job, including ones queued by the jobs themselves.
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            count += 1;
        }
        count
    }

    /// Blocks until one job is available and runs it.
    pub fn run_one(&self, timeout: std::time::Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl MainContext for MainQueue {
    fn run_in_main(&self, job: Job) {
        // Both ends live in self, the channel cannot be disconnected
        let _ = self.tx.send(job);
    }
}
