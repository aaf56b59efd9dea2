//! Contract between the engine and the externally owned node tree.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::BrandConfig;
use crate::error::TreeError;
use crate::identity::is_brand_of;
use crate::node::VNode;

pub type NodeId = usize;

/// Tree handle shared between the host and every instance rendering into it.
pub type SharedTree = Rc<RefCell<dyn Tree>>;

/// Receives attach/detach notifications for one observed key.
///
/// Notifications are delivered while the tree is mid-mutation, so observers
/// must not touch the tree. Spurious detach/attach pairs are allowed.
pub trait AttachObserver {
    fn attached(&self, key: &str);
    fn detached(&self, key: &str);
}

pub trait Tree {
    /// Looks up an attached node by its addressable key.
    fn find_by_key(&self, key: &str) -> Option<NodeId>;

    fn attribute(&self, id: NodeId, name: &str) -> Option<&str>;

    fn kind(&self, id: NodeId) -> Option<&str>;

    /// Mutates `id` in place to match `next`, keeping the node itself and
    /// its key. Children that are proxies must be left untouched.
    fn patch(&mut self, id: NodeId, next: &VNode) -> Result<(), TreeError>;

    /// Arms the attach detector for nodes carrying `key`. A later call for the
    /// same key replaces the earlier observer, so keys must be unique among
    /// live instances.
    fn observe(&mut self, key: &str, observer: Weak<dyn AttachObserver>);
}

/// Tree-side identity comparison: is `candidate` the node `live` already is?
///
/// A proxy is the same node as any live node carrying its brand. A real
/// element is the same node only if it carries the same brand as well.
pub fn is_same_node(tree: &dyn Tree, config: &BrandConfig, candidate: &VNode, live: NodeId) -> bool {
    let Some(brand) = tree.attribute(live, &config.brand_attribute) else {
        return false;
    };
    match candidate.same_as() {
        Some(identity) => is_brand_of(brand, identity),
        None => candidate.attribute(&config.brand_attribute) == Some(brand),
    }
}
