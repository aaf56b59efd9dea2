//! Debounced attach/detach tracking.
//!
//! The attach detector reports raw signals, including the detach/attach pair a
//! tree produces when it moves a node while reordering siblings. Signals only
//! queue a settle on the next paint-safe tick; the settle looks at whether the
//! node is *currently* resolvable and fires `load`/`unload` from that alone,
//! so however many signals arrived, callbacks strictly alternate.

use std::cell::Cell;

use crate::runtime::RuntimeHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Unattached,
    AttachPending,
    Attached,
    DetachPending,
}

impl LifecycleState {
    /// Whether `load` has fired without a matching `unload` yet.
    pub fn is_attached(self) -> bool {
        matches!(self, LifecycleState::Attached | LifecycleState::DetachPending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Attached,
    Detached,
}

/// Callback a settle asks the owner to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Load,
    Unload,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct LifecycleController {
    state: Cell<LifecycleState>,
    settle_queued: Cell<bool>,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn is_settle_queued(&self) -> bool {
        self.settle_queued.get()
    }

    /// A render produced a fresh node and the detector was armed on it.
    /// Returns whether a settle is needed.
    pub fn arm(&self) -> bool {
        match self.state.get() {
            LifecycleState::Unattached => {
                self.transition(LifecycleState::AttachPending);
                false
            }
            LifecycleState::AttachPending => false,
            // The node we confirmed earlier is no longer resolvable, otherwise
            // no fresh render would have happened.
            LifecycleState::Attached => {
                self.transition(LifecycleState::DetachPending);
                true
            }
            LifecycleState::DetachPending => true,
        }
    }

    /// Records a raw detector signal. Returns whether a settle is needed.
    pub fn signal(&self, signal: Signal) -> bool {
        let state = self.state.get();
        match (signal, state) {
            (Signal::Attached, LifecycleState::Unattached) => {
                self.transition(LifecycleState::AttachPending);
                true
            }
            (Signal::Attached, LifecycleState::AttachPending) => true,
            (Signal::Attached, LifecycleState::Attached | LifecycleState::DetachPending) => false,
            (Signal::Detached, LifecycleState::Attached) => {
                self.transition(LifecycleState::DetachPending);
                true
            }
            (Signal::Detached, LifecycleState::AttachPending) => true,
            (Signal::Detached, LifecycleState::DetachPending | LifecycleState::Unattached) => false,
        }
    }

    /// Queues `settle` on the next tick unless one is already queued.
    pub fn request_settle(&self, runtime: &RuntimeHandle, settle: impl FnOnce() + 'static) {
        if self.settle_queued.replace(true) {
            return;
        }
        if !runtime.next_tick(settle) {
            self.settle_queued.set(false);
        }
    }

    /// Resolves pending state against the tree. Must be called from the
    /// queued settle; `resolvable` is whether the node can be found now.
    pub fn settle(&self, resolvable: bool) -> Transition {
        self.settle_queued.set(false);
        let (next, transition) = match (self.state.get(), resolvable) {
            (LifecycleState::Unattached | LifecycleState::AttachPending, true) => {
                (LifecycleState::Attached, Transition::Load)
            }
            (LifecycleState::Unattached, false) => (LifecycleState::Unattached, Transition::Unchanged),
            (LifecycleState::AttachPending, false) => {
                (LifecycleState::AttachPending, Transition::Unchanged)
            }
            (LifecycleState::Attached | LifecycleState::DetachPending, true) => {
                (LifecycleState::Attached, Transition::Unchanged)
            }
            (LifecycleState::Attached | LifecycleState::DetachPending, false) => {
                (LifecycleState::Unattached, Transition::Unload)
            }
        };
        self.transition(next);
        transition
    }

    /// A settle that could not run; it will be queued again by the caller.
    pub fn release_settle(&self) {
        self.settle_queued.set(false);
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.replace(next);
        if previous != next {
            log::debug!("lifecycle {previous:?} -> {next:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::runtime::{DefaultScheduler, Runtime};

    fn attached() -> LifecycleController {
        let controller = LifecycleController::new();
        controller.arm();
        controller.signal(Signal::Attached);
        assert_eq!(controller.settle(true), Transition::Load);
        controller
    }

    #[test]
    fn arming_waits_for_attach() {
        let controller = LifecycleController::new();
        assert!(!controller.arm());
        assert_eq!(controller.state(), LifecycleState::AttachPending);
        assert!(controller.signal(Signal::Attached));
        assert_eq!(controller.settle(true), Transition::Load);
        assert_eq!(controller.state(), LifecycleState::Attached);
    }

    #[test]
    fn attach_that_does_not_stick_never_loads() {
        let controller = LifecycleController::new();
        controller.arm();
        controller.signal(Signal::Attached);
        controller.signal(Signal::Detached);
        assert_eq!(controller.settle(false), Transition::Unchanged);
        assert_eq!(controller.state(), LifecycleState::AttachPending);
    }

    #[test]
    fn reorder_is_debounced() {
        let controller = attached();
        assert!(controller.signal(Signal::Detached));
        assert!(!controller.signal(Signal::Attached));
        assert_eq!(controller.state(), LifecycleState::DetachPending);
        assert_eq!(controller.settle(true), Transition::Unchanged);
        assert_eq!(controller.state(), LifecycleState::Attached);
    }

    #[test]
    fn confirmed_detach_unloads_once() {
        let controller = attached();
        controller.signal(Signal::Detached);
        assert!(!controller.signal(Signal::Detached));
        assert_eq!(controller.settle(false), Transition::Unload);
        assert_eq!(controller.settle(false), Transition::Unchanged);
        assert_eq!(controller.state(), LifecycleState::Unattached);
    }

    #[test]
    fn fresh_render_after_silent_removal_rechecks() {
        let controller = attached();
        assert!(controller.arm());
        assert_eq!(controller.state(), LifecycleState::DetachPending);
        assert_eq!(controller.settle(false), Transition::Unload);
    }

    #[test]
    fn callbacks_alternate_for_any_signal_sequence() {
        let controller = LifecycleController::new();
        controller.arm();
        let script = [
            (Signal::Attached, true),
            (Signal::Attached, true),
            (Signal::Detached, true),
            (Signal::Detached, false),
            (Signal::Detached, false),
            (Signal::Attached, true),
            (Signal::Detached, false),
        ];
        let mut fired = Vec::new();
        for (signal, resolvable) in script {
            controller.signal(signal);
            match controller.settle(resolvable) {
                Transition::Unchanged => {}
                transition => fired.push(transition),
            }
        }
        assert_eq!(
            fired,
            [
                Transition::Load,
                Transition::Unload,
                Transition::Load,
                Transition::Unload
            ]
        );
    }

    #[test]
    fn only_one_settle_is_queued_at_a_time() {
        let runtime = Runtime::new(Arc::new(DefaultScheduler));
        let handle = runtime.handle();
        let controller = LifecycleController::new();

        controller.request_settle(&handle, || {});
        controller.request_settle(&handle, || panic!("duplicate settle"));
        assert!(controller.is_settle_queued());
        assert_eq!(runtime.drain_frame(), 1);
    }
}
