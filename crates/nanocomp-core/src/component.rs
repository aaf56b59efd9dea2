//! The capability set a component implements, plus closure based adapters.

use crate::compare::{Shallow, UpdatePolicy};
use crate::identity::Identity;
use crate::node::VNode;
use crate::tree::NodeId;
use crate::value::Value;

/// Operations an [`Instance`](crate::Instance) drives.
///
/// Every method is optional. The two that return `Option` report a missing
/// capability with `None`, which the instance turns into a
/// [`ContractViolation`](crate::ContractViolation) when it actually needs it.
pub trait Component: 'static {
    /// Builds the node for `inputs`. Every call must return the same kind
    /// of root node.
    fn create_node(&mut self, _inputs: &[Value]) -> Option<VNode> {
        None
    }

    /// Decides whether `inputs` warrant a new node, given the inputs of the
    /// last render that produced one.
    fn should_update(&mut self, _inputs: &[Value], _last: &[Value]) -> Option<bool> {
        None
    }

    /// Runs after a fresh node was created, before it is handed back.
    fn before_render(&mut self, _node: &VNode) {}

    /// Runs after the live node was patched in place.
    fn after_update(&mut self, _node: NodeId) {}

    /// Runs on the tick that confirms the node is attached.
    fn on_load(&mut self, _node: NodeId) {}

    /// Runs on the tick that confirms the node is gone.
    fn on_unload(&mut self, _identity: Identity) {}
}

/// Memoizes a plain render closure.
pub struct FnComponent<F, P = Shallow> {
    render: F,
    policy: P,
}

/// Wraps `render` with the shallow update policy.
pub fn component_fn<F>(render: F) -> FnComponent<F>
where
    F: FnMut(&[Value]) -> VNode + 'static,
{
    FnComponent {
        render,
        policy: Shallow,
    }
}

impl<F, P> FnComponent<F, P> {
    pub fn with_policy<Q: UpdatePolicy>(self, policy: Q) -> FnComponent<F, Q> {
        FnComponent {
            render: self.render,
            policy,
        }
    }
}

impl<F, P> Component for FnComponent<F, P>
where
    F: FnMut(&[Value]) -> VNode + 'static,
    P: UpdatePolicy + 'static,
{
    fn create_node(&mut self, inputs: &[Value]) -> Option<VNode> {
        Some((self.render)(inputs))
    }

    fn should_update(&mut self, inputs: &[Value], last: &[Value]) -> Option<bool> {
        Some(self.policy.should_update(inputs, last))
    }
}

type UpdateHandler = Box<dyn FnMut(&[Value]) + 'static>;

/// Registration point handed to a widget factory.
#[derive(Default)]
pub struct WidgetUpdates {
    handler: Option<UpdateHandler>,
}

impl WidgetUpdates {
    /// Every later render forwards its inputs to `handler` instead of
    /// building a new node.
    pub fn on_update(&mut self, handler: impl FnMut(&[Value]) + 'static) {
        self.handler = Some(Box::new(handler));
    }
}

/// A component whose node is built once per attachment and then driven
/// entirely by its update handler. Suited to nodes whose content is managed
/// by something else, such as a map or an editor.
///
/// A forced [`rerender`](crate::Instance::rerender) forwards the inputs and
/// hands back the node built for the current attachment; `create` only runs
/// again after an unload.
pub struct Widget<F> {
    create: F,
    handler: Option<UpdateHandler>,
    built: Option<VNode>,
}

pub fn widget<F>(create: F) -> Widget<F>
where
    F: FnMut(&mut WidgetUpdates) -> VNode + 'static,
{
    Widget {
        create,
        handler: None,
        built: None,
    }
}

impl<F> Widget<F> {
    fn forward(&mut self, inputs: &[Value]) {
        if let Some(handler) = self.handler.as_mut() {
            handler(inputs);
        }
    }
}

impl<F> Component for Widget<F>
where
    F: FnMut(&mut WidgetUpdates) -> VNode + 'static,
{
    fn create_node(&mut self, inputs: &[Value]) -> Option<VNode> {
        if let Some(node) = &self.built {
            let node = node.clone();
            self.forward(inputs);
            return Some(node);
        }
        let mut updates = WidgetUpdates::default();
        let node = (self.create)(&mut updates);
        self.handler = updates.handler;
        self.built = Some(node.clone());
        self.forward(inputs);
        Some(node)
    }

    fn should_update(&mut self, inputs: &[Value], _last: &[Value]) -> Option<bool> {
        self.forward(inputs);
        Some(false)
    }

    fn on_unload(&mut self, _identity: Identity) {
        self.handler = None;
        self.built = None;
    }
}
