use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::identity::IdentityRegistry;
use crate::platform::RuntimeScheduler;

pub(crate) type TickCallback = Box<dyn FnOnce() + 'static>;

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    identities: Arc<IdentityRegistry>,
    needs_frame: Cell<bool>,
    tick_callbacks: RefCell<VecDeque<TickCallback>>, // FUTURE(no_std): migrate to ring buffer.
    ticks: Cell<u64>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>, identities: Arc<IdentityRegistry>) -> Self {
        Self {
            scheduler,
            identities,
            needs_frame: Cell::new(false),
            tick_callbacks: RefCell::new(VecDeque::new()),
            ticks: Cell::new(0),
        }
    }

    fn schedule(&self) {
        self.needs_frame.set(true);
        self.scheduler.schedule_frame();
    }

    fn enqueue_tick(&self, callback: TickCallback) {
        self.tick_callbacks.borrow_mut().push_back(callback);
        self.schedule();
    }

    fn has_tick_callbacks(&self) -> bool {
        !self.tick_callbacks.borrow().is_empty()
    }

    fn drain_frame(&self) -> usize {
        // Take the batch first: callbacks queued while it runs belong to the
        // next tick.
        let pending: Vec<TickCallback> = self.tick_callbacks.borrow_mut().drain(..).collect();
        self.ticks.set(self.ticks.get() + 1);
        let ran = pending.len();
        for callback in pending {
            callback();
        }
        if !self.has_tick_callbacks() {
            self.needs_frame.set(false);
        }
        ran
    }
}

/// Owns the paint-safe tick queue and the identity registry.
///
/// Everything here is single threaded; the runtime is cloned by reference
/// and handed out as weak [`RuntimeHandle`]s.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>, // FUTURE(no_std): replace Rc with arena-managed runtime storage.
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self::with_registry(scheduler, IdentityRegistry::global())
    }

    pub fn with_registry(
        scheduler: Arc<dyn RuntimeScheduler>,
        identities: Arc<IdentityRegistry>,
    ) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler, identities)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn needs_frame(&self) -> bool {
        self.inner.needs_frame.get()
    }

    pub fn has_pending_ticks(&self) -> bool {
        self.inner.has_tick_callbacks()
    }

    /// Number of frames drained so far.
    pub fn tick_count(&self) -> u64 {
        self.inner.ticks.get()
    }

    /// Runs every callback queued before this call. Returns how many ran.
    pub fn drain_frame(&self) -> usize {
        self.inner.drain_frame()
    }

    pub fn identities(&self) -> Arc<IdentityRegistry> {
        Arc::clone(&self.inner.identities)
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_frame(&self) {}
}

#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Queues `callback` for the next paint-safe tick. Callbacks run once, in
    /// queue order, and cannot be cancelled. Returns `false` when the runtime
    /// is gone, in which case the callback is dropped.
    pub fn next_tick(&self, callback: impl FnOnce() + 'static) -> bool {
        match self.0.upgrade() {
            Some(inner) => {
                inner.enqueue_tick(Box::new(callback));
                true
            }
            None => {
                log::warn!("tick requested on a dropped runtime; callback discarded");
                false
            }
        }
    }

    pub fn drain_frame(&self) -> usize {
        self.0
            .upgrade()
            .map(|inner| inner.drain_frame())
            .unwrap_or(0)
    }

    pub fn has_pending_ticks(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_tick_callbacks())
            .unwrap_or(false)
    }

    pub fn identities(&self) -> Arc<IdentityRegistry> {
        self.0
            .upgrade()
            .map(|inner| Arc::clone(&inner.identities))
            .unwrap_or_else(IdentityRegistry::global)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingScheduler {
        frames: AtomicUsize,
    }

    impl RuntimeScheduler for CountingScheduler {
        fn schedule_frame(&self) {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn callbacks_run_on_drain_in_order() {
        let scheduler = Arc::new(CountingScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        let handle = runtime.handle();
        let log = Rc::new(RefCell::new(Vec::new()));

        for label in ["a", "b"] {
            let log = log.clone();
            assert!(handle.next_tick(move || log.borrow_mut().push(label)));
        }

        assert!(log.borrow().is_empty());
        assert!(runtime.needs_frame());
        assert_eq!(scheduler.frames.load(Ordering::SeqCst), 2);

        assert_eq!(runtime.drain_frame(), 2);
        assert_eq!(*log.borrow(), ["a", "b"]);
        assert!(!runtime.needs_frame());
        assert_eq!(runtime.tick_count(), 1);
    }

    #[test]
    fn callbacks_queued_during_a_drain_wait_for_the_next_one() {
        let runtime = Runtime::new(Arc::new(DefaultScheduler));
        let handle = runtime.handle();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_log = log.clone();
        let inner_handle = handle.clone();
        handle.next_tick(move || {
            inner_log.borrow_mut().push("outer");
            let log = inner_log.clone();
            inner_handle.next_tick(move || log.borrow_mut().push("inner"));
        });

        runtime.drain_frame();
        assert_eq!(*log.borrow(), ["outer"]);
        assert!(runtime.needs_frame());

        runtime.drain_frame();
        assert_eq!(*log.borrow(), ["outer", "inner"]);
    }

    #[test]
    fn dropped_runtime_discards_callbacks() {
        let handle = Runtime::new(Arc::new(DefaultScheduler)).handle();
        assert!(!handle.is_alive());
        assert!(!handle.next_tick(|| panic!("must not run")));
        assert_eq!(handle.drain_frame(), 0);
    }

    #[test]
    fn injected_registry_is_used() {
        let registry = Arc::new(IdentityRegistry::with_prefix("rt"));
        let runtime = Runtime::with_registry(Arc::new(DefaultScheduler), registry);
        assert_eq!(runtime.handle().identities().allocate().to_string(), "rt-1");
    }
}
