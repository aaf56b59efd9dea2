use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nanocomp_core::{
    shallow_changed, Component, Identity, IdentityRegistry, Instance, MemoryTree, NodeId,
    Runtime, RuntimeHandle, RuntimeScheduler, SharedTree, Tree, TreeError, VNode, Value,
};

/// Upper bound on frames drained by [`TestHarness::pump_until_idle`].
const MAX_IDLE_FRAMES: usize = 64;

#[derive(Default)]
struct CountingScheduler {
    frames: AtomicUsize,
}

impl RuntimeScheduler for CountingScheduler {
    fn schedule_frame(&self) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

/// Headless harness for exercising instances in tests.
///
/// `TestHarness` owns a runtime with a private identity registry and an
/// in-memory tree. It plays the host: mounting and unmounting nodes, and
/// draining the tick queue when a test decides a frame has passed.
pub struct TestHarness {
    runtime: Runtime,
    scheduler: Arc<CountingScheduler>,
    tree: Rc<RefCell<MemoryTree>>,
}

impl TestHarness {
    /// Create a harness whose identities read `test-1`, `test-2`, ...
    pub fn new() -> Self {
        Self::with_prefix("test")
    }

    pub fn with_prefix(prefix: &'static str) -> Self {
        let scheduler = Arc::new(CountingScheduler::default());
        let runtime = Runtime::with_registry(
            scheduler.clone(),
            Arc::new(IdentityRegistry::with_prefix(prefix)),
        );
        Self {
            runtime,
            scheduler,
            tree: Rc::new(RefCell::new(MemoryTree::new())),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    /// The tree as instances see it.
    pub fn shared_tree(&self) -> SharedTree {
        self.tree.clone()
    }

    pub fn tree(&self) -> Ref<'_, MemoryTree> {
        self.tree.borrow()
    }

    pub fn tree_mut(&self) -> RefMut<'_, MemoryTree> {
        self.tree.borrow_mut()
    }

    /// Wraps `component` in an instance bound to this harness.
    pub fn instance<C: Component>(&self, component: C) -> Instance<C> {
        Instance::new(self.runtime_handle(), self.shared_tree(), component)
    }

    /// Appends `node` under the document root.
    pub fn mount(&self, node: &VNode) -> Result<NodeId, TreeError> {
        let mut tree = self.tree.borrow_mut();
        let root = tree.root();
        tree.append(root, node)
    }

    /// Appends `node` under `parent`.
    pub fn mount_under(&self, parent: NodeId, node: &VNode) -> Result<NodeId, TreeError> {
        self.tree.borrow_mut().append(parent, node)
    }

    /// Detaches `id` from wherever it is.
    pub fn unmount(&self, id: NodeId) -> Result<(), TreeError> {
        self.tree.borrow_mut().remove(id)
    }

    /// Moves `id` under `parent` at `index`.
    pub fn move_node(&self, id: NodeId, parent: NodeId, index: usize) -> Result<(), TreeError> {
        self.tree.borrow_mut().move_node(id, parent, index)
    }

    /// Lets one paint-safe tick pass. Returns how many callbacks ran.
    pub fn advance_frame(&self) -> usize {
        self.runtime.drain_frame()
    }

    /// Drains ticks until nothing is queued.
    pub fn pump_until_idle(&self) -> usize {
        let mut frames = 0;
        while self.runtime.has_pending_ticks() && frames < MAX_IDLE_FRAMES {
            self.runtime.drain_frame();
            frames += 1;
        }
        frames
    }

    /// How many times the runtime asked the host for a frame.
    pub fn frames_requested(&self) -> usize {
        self.scheduler.frames.load(Ordering::SeqCst)
    }

    /// Looks up an attached node by key.
    pub fn find(&self, key: &str) -> Option<NodeId> {
        self.tree.borrow().find_by_key(key)
    }

    /// Markup of everything attached to the root.
    pub fn html(&self) -> String {
        let tree = self.tree.borrow();
        tree.to_html(tree.root())
    }

    pub fn html_of(&self, id: NodeId) -> String {
        self.tree.borrow().to_html(id)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `TestHarness`.
pub fn run_test_harness<R>(f: impl FnOnce(&mut TestHarness) -> R) -> R {
    let mut harness = TestHarness::new();
    f(&mut harness)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Create,
    Update { changed: bool },
    BeforeRender,
    AfterUpdate(NodeId),
    Load(NodeId),
    Unload(Identity),
}

/// Per-callback totals, handy for asserting parity across a scenario.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleCounts {
    pub create: usize,
    pub update: usize,
    pub before_render: usize,
    pub after_update: usize,
    pub load: usize,
    pub unload: usize,
}

/// Shared view of everything a [`Recorder`] observed.
#[derive(Clone, Default)]
pub struct RecorderLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl RecorderLog {
    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn counts(&self) -> LifecycleCounts {
        let mut counts = LifecycleCounts::default();
        for event in self.events.borrow().iter() {
            match event {
                Event::Create => counts.create += 1,
                Event::Update { .. } => counts.update += 1,
                Event::BeforeRender => counts.before_render += 1,
                Event::AfterUpdate(_) => counts.after_update += 1,
                Event::Load(_) => counts.load += 1,
                Event::Unload(_) => counts.unload += 1,
            }
        }
        counts
    }

    /// Only the `load`/`unload` events, in order.
    pub fn lifecycle(&self) -> Vec<Event> {
        self.events
            .borrow()
            .iter()
            .copied()
            .filter(|event| matches!(event, Event::Load(_) | Event::Unload(_)))
            .collect()
    }
}

/// A component that renders through a closure, updates on shallow change
/// and records every callback it receives.
pub struct Recorder<F> {
    render: F,
    log: RecorderLog,
}

impl<F> Recorder<F>
where
    F: FnMut(&[Value]) -> VNode + 'static,
{
    pub fn new(render: F) -> Self {
        Self {
            render,
            log: RecorderLog::default(),
        }
    }

    pub fn log(&self) -> RecorderLog {
        self.log.clone()
    }
}

impl<F> Component for Recorder<F>
where
    F: FnMut(&[Value]) -> VNode + 'static,
{
    fn create_node(&mut self, inputs: &[Value]) -> Option<VNode> {
        self.log.push(Event::Create);
        Some((self.render)(inputs))
    }

    fn should_update(&mut self, inputs: &[Value], last: &[Value]) -> Option<bool> {
        let changed = shallow_changed(inputs, last);
        self.log.push(Event::Update { changed });
        Some(changed)
    }

    fn before_render(&mut self, _node: &VNode) {
        self.log.push(Event::BeforeRender);
    }

    fn after_update(&mut self, node: NodeId) {
        self.log.push(Event::AfterUpdate(node));
    }

    fn on_load(&mut self, node: NodeId) {
        self.log.push(Event::Load(node));
    }

    fn on_unload(&mut self, identity: Identity) {
        self.log.push(Event::Unload(identity));
    }
}

#[cfg(test)]
mod tests {
    use nanocomp_core::{inputs, Element};

    use super::*;

    fn greeting(inputs: &[Value]) -> VNode {
        Element::new("p").with_text(format!("hi {}", inputs[0])).into()
    }

    #[test]
    fn harness_mounts_and_loads_a_recorded_instance() {
        run_test_harness(|harness| {
            let recorder = Recorder::new(greeting);
            let log = recorder.log();
            let instance = harness.instance(recorder);

            let node = instance.render(inputs!["ada"]).expect("render");
            let id = harness.mount(&node).expect("mount");
            assert_eq!(harness.find("test-1"), Some(id));
            assert!(harness.frames_requested() >= 1);

            assert_eq!(harness.pump_until_idle(), 1);
            assert_eq!(log.lifecycle(), [Event::Load(id)]);
            assert_eq!(
                harness.html(),
                "<p id=\"test-1\" data-nanocomponent=\"test-1\">hi ada</p>"
            );

            harness.unmount(id).expect("unmount");
            harness.advance_frame();
            let identity = instance.identity().expect("identity");
            assert_eq!(log.lifecycle(), [Event::Load(id), Event::Unload(identity)]);
            assert_eq!(
                log.counts(),
                LifecycleCounts {
                    create: 1,
                    before_render: 1,
                    load: 1,
                    unload: 1,
                    ..LifecycleCounts::default()
                }
            );
        });
    }

    #[test]
    fn prefixes_are_isolated_per_harness() {
        let first = TestHarness::with_prefix("left");
        let second = TestHarness::with_prefix("right");
        let a = first.instance(Recorder::new(greeting));
        let b = second.instance(Recorder::new(greeting));
        a.render(inputs!["x"]).expect("render");
        b.render(inputs!["y"]).expect("render");
        assert_eq!(a.key().as_deref(), Some("left-1"));
        assert_eq!(b.key().as_deref(), Some("right-1"));
    }
}
