//! The reconciliation driver.
//!
//! An [`Instance`] wraps one [`Component`] and decides, on every render,
//! whether to build a fresh node, patch the live one in place, or hand out a
//! proxy that the tree will treat as the node it already has.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use crate::cache::{RenderCache, Root};
use crate::component::Component;
use crate::config::BrandConfig;
use crate::error::{ContractViolation, RenderError};
use crate::identity::{self, Identity};
use crate::lifecycle::{LifecycleController, LifecycleState, Signal, Transition};
use crate::node::VNode;
use crate::runtime::RuntimeHandle;
use crate::tree::{AttachObserver, NodeId, SharedTree};
use crate::value::Inputs;

pub struct Instance<C: Component> {
    inner: Rc<InstanceInner<C>>,
}

struct InstanceInner<C: Component> {
    runtime: RuntimeHandle,
    tree: SharedTree,
    config: BrandConfig,
    component: RefCell<C>,
    cache: RefCell<RenderCache>,
    lifecycle: LifecycleController,
    this: Weak<InstanceInner<C>>,
}

impl<C: Component> Instance<C> {
    pub fn new(runtime: RuntimeHandle, tree: SharedTree, component: C) -> Self {
        Self::with_config(runtime, tree, component, BrandConfig::default())
    }

    pub fn with_config(
        runtime: RuntimeHandle,
        tree: SharedTree,
        component: C,
        config: BrandConfig,
    ) -> Self {
        let inner = Rc::new_cyclic(|this| InstanceInner {
            runtime,
            tree,
            config,
            component: RefCell::new(component),
            cache: RefCell::new(RenderCache::default()),
            lifecycle: LifecycleController::new(),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Renders with `inputs`.
    ///
    /// Returns the real node when there is no live node to reuse, and a proxy
    /// standing in for the live node otherwise. In the latter case the live
    /// node has already been patched if the update decision asked for it.
    ///
    /// Fails with [`ContractViolation::Busy`] when called from one of the
    /// component's own hooks.
    pub fn render(&self, inputs: Inputs) -> Result<VNode, RenderError> {
        let inner = &self.inner;
        if inner.is_busy() {
            return Err(ContractViolation::Busy.into());
        }
        match inner.resolve() {
            Some((live, root)) => inner.render_live(live, &root, inputs),
            None => inner.render_fresh(inputs),
        }
    }

    /// Re-renders with the last recorded inputs, patching unconditionally.
    /// Used after the component's own state changed.
    ///
    /// Called from one of the component's own hooks, the patch is queued for
    /// the next tick and the current proxy is returned.
    pub fn rerender(&self) -> Result<VNode, RenderError> {
        let inner = &self.inner;
        let (live, root) = inner.resolve().ok_or(ContractViolation::NotMounted)?;
        inner.cache.borrow_mut().request_force_render();
        if inner.is_busy() {
            log::debug!("rerender of `{}` requested from a hook; deferring", root.key);
            inner.queue_rerender();
            return Ok(inner.cache.borrow_mut().proxy(&root, &inner.config));
        }
        let inputs = inner.cache.borrow().last_inputs().clone();
        inner.render_live(live, &root, inputs)
    }

    /// The identity, once the first render succeeded.
    pub fn identity(&self) -> Option<Identity> {
        self.inner.cache.borrow().root().map(|root| root.identity)
    }

    /// The addressable key of the root node, once the first render succeeded.
    pub fn key(&self) -> Option<String> {
        self.inner.cache.borrow().root().map(|root| root.key.to_string())
    }

    /// The live node, if it can be resolved right now.
    pub fn element(&self) -> Option<NodeId> {
        self.inner.resolve().map(|(live, _)| live)
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    /// Debounced attachment: true between a `load` and the next `unload`.
    pub fn is_attached(&self) -> bool {
        self.lifecycle_state().is_attached()
    }

    pub fn last_inputs(&self) -> Inputs {
        self.inner.cache.borrow().last_inputs().clone()
    }

    pub fn config(&self) -> &BrandConfig {
        &self.inner.config
    }

    /// Borrows the component. Panics if called from one of its own hooks.
    pub fn component(&self) -> Ref<'_, C> {
        self.inner.component.borrow()
    }

    pub fn with_component<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.inner.component.borrow())
    }

    /// Mutates the component's own state, typically followed by
    /// [`rerender`](Self::rerender).
    pub fn with_component_mut<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.inner.component.borrow_mut())
    }
}

impl<C: Component> InstanceInner<C> {
    fn resolve(&self) -> Option<(NodeId, Root)> {
        let root = self.cache.borrow().root()?.clone();
        let tree = self.tree.borrow();
        let live = identity::resolve(&*tree, root.identity, &root.key, &self.config)?;
        Some((live, root))
    }

    fn component_mut(&self) -> Result<RefMut<'_, C>, ContractViolation> {
        self.component
            .try_borrow_mut()
            .map_err(|_| ContractViolation::Busy)
    }

    fn is_busy(&self) -> bool {
        self.component.try_borrow_mut().is_err()
    }

    fn render_fresh(&self, inputs: Inputs) -> Result<VNode, RenderError> {
        if self.lifecycle.state().is_attached() {
            log::debug!("live node vanished without a detach; rendering from scratch");
        }
        let mut node = self
            .component_mut()?
            .create_node(&inputs)
            .ok_or(ContractViolation::MissingCreateNode)?;

        let key = {
            let mut cache = self.cache.borrow_mut();
            cache.check_root_kind(node.kind())?;
            let (identity, key_hint) = match cache.root() {
                Some(root) => (root.identity, Some(root.key.clone())),
                None => (self.runtime.identities().allocate(), None),
            };
            let key = identity::brand(&mut node, identity, key_hint.as_deref(), &self.config)?;
            cache.record_root(identity, &key, node.kind());
            cache.record_inputs(inputs);
            key
        };

        let observer: Weak<dyn AttachObserver> = self.this.clone();
        self.tree.borrow_mut().observe(&key, observer);
        if self.lifecycle.arm() {
            self.queue_settle();
        }

        self.component_mut()?.before_render(&node);
        log::trace!("rendered fresh `{key}`");
        Ok(node)
    }

    fn render_live(&self, live: NodeId, root: &Root, inputs: Inputs) -> Result<VNode, RenderError> {
        let forced = self.cache.borrow_mut().take_force_render();
        let changed = forced || {
            let last = self.cache.borrow_mut().take_last_inputs();
            let verdict = self
                .component_mut()
                .map(|mut component| component.should_update(&inputs, &last));
            self.cache.borrow_mut().restore_last_inputs(last);
            verdict?.ok_or(ContractViolation::MissingShouldUpdate)?
        };

        if changed {
            self.patch_live(live, root, inputs)?;
        } else {
            log::trace!("`{}` unchanged; reusing proxy", root.key);
        }
        Ok(self.cache.borrow_mut().proxy(root, &self.config))
    }

    fn patch_live(&self, live: NodeId, root: &Root, inputs: Inputs) -> Result<(), RenderError> {
        let mut node = self
            .component_mut()?
            .create_node(&inputs)
            .ok_or(ContractViolation::MissingCreateNode)?;
        self.cache.borrow().check_root_kind(node.kind())?;
        identity::brand(&mut node, root.identity, Some(&root.key), &self.config)?;

        self.tree.borrow_mut().patch(live, &node)?;
        self.cache.borrow_mut().record_inputs(inputs);
        self.component_mut()?.after_update(live);
        log::trace!("patched `{}` in place", root.key);
        Ok(())
    }

    fn queue_settle(&self) {
        let this = self.this.clone();
        self.lifecycle.request_settle(&self.runtime, move || {
            if let Some(inner) = this.upgrade() {
                inner.settle();
            }
        });
    }

    fn queue_rerender(&self) {
        let this = self.this.clone();
        self.runtime.next_tick(move || {
            if let Some(inner) = this.upgrade() {
                inner.deferred_rerender();
            }
        });
    }

    fn deferred_rerender(&self) {
        if !self.cache.borrow().force_render_requested() {
            // a render in between already patched
            return;
        }
        if self.is_busy() {
            self.queue_rerender();
            return;
        }
        let Some((live, root)) = self.resolve() else {
            self.cache.borrow_mut().take_force_render();
            log::debug!("deferred rerender dropped; node no longer live");
            return;
        };
        let inputs = self.cache.borrow().last_inputs().clone();
        if let Err(err) = self.render_live(live, &root, inputs) {
            log::warn!("deferred rerender of `{}` failed: {err}", root.key);
        }
    }

    fn settle(&self) {
        let mut component = match self.component_mut() {
            Ok(component) if self.tree.try_borrow_mut().is_ok() => component,
            _ => {
                log::debug!("instance busy; settling on the next tick");
                self.lifecycle.release_settle();
                self.queue_settle();
                return;
            }
        };
        // Hooks run with the component borrowed; a rerender they request is
        // deferred by `Instance::rerender`.
        let live = self.resolve();
        match self.lifecycle.settle(live.is_some()) {
            Transition::Load => {
                if let Some((node, root)) = live {
                    log::debug!("load `{}`", root.key);
                    component.on_load(node);
                }
            }
            Transition::Unload => {
                let identity = {
                    let mut cache = self.cache.borrow_mut();
                    cache.reset_after_unload();
                    cache.root().map(|root| root.identity)
                };
                if let Some(identity) = identity {
                    log::debug!("unload {identity}");
                    component.on_unload(identity);
                }
            }
            Transition::Unchanged => {}
        }
    }
}

impl<C: Component> AttachObserver for InstanceInner<C> {
    fn attached(&self, key: &str) {
        log::trace!("attach signal for `{key}`");
        if self.lifecycle.signal(Signal::Attached) {
            self.queue_settle();
        }
    }

    fn detached(&self, key: &str) {
        log::trace!("detach signal for `{key}`");
        if self.lifecycle.signal(Signal::Detached) {
            self.queue_settle();
        }
    }
}
