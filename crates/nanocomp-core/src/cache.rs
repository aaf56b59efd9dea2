//! Per-instance render cache: the facts fixed by the first render, the
//! inputs of the last render that produced a node, and the lazily built
//! proxy handed out while nothing changes.

use std::rc::Rc;

use crate::config::BrandConfig;
use crate::error::ContractViolation;
use crate::identity::Identity;
use crate::node::{Element, VNode};
use crate::value::Inputs;

/// Facts fixed by the first successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Root {
    pub(crate) identity: Identity,
    pub(crate) key: Rc<str>,
    pub(crate) kind: Rc<str>,
}

#[derive(Debug, Default)]
pub(crate) struct RenderCache {
    root: Option<Root>,
    last_inputs: Inputs,
    proxy: Option<VNode>,
    force_render: bool,
}

impl RenderCache {
    pub(crate) fn root(&self) -> Option<&Root> {
        self.root.as_ref()
    }

    /// Fails if a root was recorded before with a different kind.
    pub(crate) fn check_root_kind(&self, kind: &str) -> Result<(), ContractViolation> {
        match &self.root {
            Some(root) if &*root.kind != kind => Err(ContractViolation::RootKindMismatch {
                expected: root.kind.to_string(),
                found: kind.to_owned(),
            }),
            _ => Ok(()),
        }
    }

    /// Records the root on first render. Later calls keep the first root.
    pub(crate) fn record_root(&mut self, identity: Identity, key: &str, kind: &str) -> &Root {
        self.root.get_or_insert_with(|| Root {
            identity,
            key: Rc::from(key),
            kind: Rc::from(kind),
        })
    }

    pub(crate) fn last_inputs(&self) -> &Inputs {
        &self.last_inputs
    }

    pub(crate) fn take_last_inputs(&mut self) -> Inputs {
        std::mem::take(&mut self.last_inputs)
    }

    /// Stores the inputs of a render that produced a node. The previous proxy
    /// may describe a stale target, so it is dropped.
    pub(crate) fn record_inputs(&mut self, inputs: Inputs) {
        self.last_inputs = inputs;
        self.proxy = None;
    }

    pub(crate) fn restore_last_inputs(&mut self, inputs: Inputs) {
        self.last_inputs = inputs;
    }

    pub(crate) fn request_force_render(&mut self) {
        self.force_render = true;
    }

    pub(crate) fn take_force_render(&mut self) -> bool {
        std::mem::take(&mut self.force_render)
    }

    pub(crate) fn force_render_requested(&self) -> bool {
        self.force_render
    }

    #[cfg(test)]
    pub(crate) fn has_proxy(&self) -> bool {
        self.proxy.is_some()
    }

    /// Returns the proxy for `root`, building it on first use.
    pub(crate) fn proxy(&mut self, root: &Root, config: &BrandConfig) -> VNode {
        self.proxy
            .get_or_insert_with(|| build_proxy(root, config))
            .clone()
    }

    /// Forgets everything tied to the node that just went away. The root
    /// facts survive so the next render keeps identity, key and kind.
    pub(crate) fn reset_after_unload(&mut self) {
        self.proxy = None;
        self.force_render = false;
    }
}

fn build_proxy(root: &Root, config: &BrandConfig) -> VNode {
    let mut proxy = Element::new(&*root.kind)
        .with_attribute(&config.key_attribute, &*root.key)
        .with_attribute(&config.brand_attribute, root.identity.to_string())
        .with_attribute(&config.proxy_attribute, "");
    proxy.declare_same_as(root.identity);
    proxy.into()
}
