//! Standard host services backed by Rust's `std` library.
//!
//! This crate provides a concrete [`RuntimeScheduler`] for `nanocomp-core`.
//! Hosts construct a [`StdRuntime`], hand its handle to their instances, and
//! drain a frame whenever [`StdRuntime::take_frame_request`] reports one, after
//! their own batch of tree mutations and before painting.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use nanocomp_core::{IdentityRegistry, Runtime, RuntimeHandle, RuntimeScheduler};

type FrameWaker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that records frame requests and optionally wakes a host loop.
pub struct StdScheduler {
    frame_requested: AtomicBool,
    frame_waker: RwLock<Option<FrameWaker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            frame_requested: AtomicBool::new(false),
            frame_waker: RwLock::new(None),
        }
    }

    /// Returns whether a frame has been requested since the last call.
    pub fn take_frame_request(&self) -> bool {
        self.frame_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker that will be invoked whenever a new frame is scheduled.
    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self
            .frame_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    /// Clears any registered frame waker.
    pub fn clear_frame_waker(&self) {
        *self
            .frame_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .frame_waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "frame_requested",
                &self.frame_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_frame(&self) {
        // Only the first request in a batch wakes the host.
        if !self.frame_requested.swap(true, Ordering::SeqCst) {
            self.wake();
        }
    }
}

/// Convenience container bundling the standard scheduler with a runtime.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    /// Creates a runtime backed by the process-wide identity registry.
    pub fn new() -> Self {
        Self::with_registry(IdentityRegistry::global())
    }

    pub fn with_registry(identities: Arc<IdentityRegistry>) -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::with_registry(scheduler.clone(), identities);
        Self { scheduler, runtime }
    }

    /// Returns the [`nanocomp_core::Runtime`] configured with the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    /// Returns a handle to the runtime.
    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    /// Returns the scheduler implementation.
    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Returns whether a frame was requested since the last poll.
    pub fn take_frame_request(&self) -> bool {
        self.scheduler.take_frame_request()
    }

    /// Registers a waker to be called when the runtime schedules a new frame.
    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_frame_waker(waker);
    }

    /// Clears any previously registered frame waker.
    pub fn clear_frame_waker(&self) {
        self.scheduler.clear_frame_waker();
    }

    /// Runs the callbacks queued for the current tick.
    pub fn drain_frame(&self) -> usize {
        self.runtime.drain_frame()
    }

    /// Drains frames for as long as they keep being requested, up to
    /// `max_frames`. Returns the number of frames drained.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.take_frame_request() {
            self.drain_frame();
            frames += 1;
        }
        if frames == max_frames && self.runtime.has_pending_ticks() {
            log::warn!("runtime still busy after {max_frames} frames");
        }
        frames
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("ticks", &self.runtime.tick_count())
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
