//! In-memory [`Tree`] with keyed lookup, morph-style patching and an attach
//! detector. Hosts with a real node tree implement [`Tree`] themselves; this
//! one backs the tests, the benches and headless use.

use std::fmt::Write as _;
use std::rc::Weak;

use indexmap::IndexMap;

use crate::collections::map::{new_map, HashMap};
use crate::config::BrandConfig;
use crate::error::TreeError;
use crate::identity::{is_brand_of, Identity};
use crate::node::{write_open_tag, Element, VNode, TEXT_KIND};
use crate::tree::{AttachObserver, NodeId, Tree};

const ROOT_KIND: &str = "#root";

struct LiveNode {
    kind: String,
    attributes: IndexMap<String, String>,
    text: String,
    children: Vec<NodeId>, // FUTURE(no_std): store child ids in smallvec.
    parent: Option<NodeId>,
}

impl LiveNode {
    fn is_text(&self) -> bool {
        self.kind == TEXT_KIND
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Signal {
    Attached,
    Detached,
}

pub struct MemoryTree {
    nodes: Vec<Option<LiveNode>>, // FUTURE(no_std): migrate to arena-backed node storage.
    root: NodeId,
    keyed: HashMap<String, NodeId>,
    observers: HashMap<String, Weak<dyn AttachObserver>>,
    pending: Vec<(Signal, String)>,
    config: BrandConfig,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::with_config(BrandConfig::default())
    }

    pub fn with_config(config: BrandConfig) -> Self {
        let root = LiveNode {
            kind: ROOT_KIND.to_owned(),
            attributes: IndexMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
        };
        Self {
            nodes: vec![Some(root)],
            root: 0,
            keyed: new_map(),
            observers: new_map(),
            pending: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &BrandConfig {
        &self.config
    }

    /// The document root. Everything reachable from it is attached.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes alive in the arena, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a detached node from `vnode`. Proxies resolve to the live node
    /// they stand for instead of being materialized.
    pub fn create(&mut self, vnode: &VNode) -> Result<NodeId, TreeError> {
        self.materialize(vnode)
    }

    pub fn append(&mut self, parent: NodeId, vnode: &VNode) -> Result<NodeId, TreeError> {
        let index = self.node(parent)?.children.len();
        self.insert(parent, index, vnode)
    }

    pub fn insert(
        &mut self,
        parent: NodeId,
        index: usize,
        vnode: &VNode,
    ) -> Result<NodeId, TreeError> {
        let result = self
            .materialize(vnode)
            .and_then(|id| self.insert_node(parent, index, id).map(|_| id));
        self.flush_signals();
        result
    }

    /// Moves an existing node under `parent` at `index`. Moving an attached
    /// node reports a detach followed by an attach, as a real tree would.
    pub fn move_node(&mut self, id: NodeId, parent: NodeId, index: usize) -> Result<(), TreeError> {
        let result = self.insert_node(parent, index, id);
        self.flush_signals();
        result
    }

    /// Unlinks `id` from its parent. The node stays in the arena detached
    /// and can be inserted again.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        let result = self.unlink(id);
        self.flush_signals();
        result
    }

    /// Frees a detached subtree.
    pub fn dispose(&mut self, id: NodeId) -> Result<(), TreeError> {
        if id == self.root {
            return Ok(());
        }
        self.remove(id)?;
        self.free(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|node| node.parent)
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == self.root {
                return true;
            }
            current = self.parent(node_id);
        }
        false
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    /// First descendant of `id` (or `id` itself) whose attribute `name`
    /// equals `value`, in document order.
    pub fn find_by_attribute(&self, id: NodeId, name: &str, value: &str) -> Option<NodeId> {
        let node = self.node(id).ok()?;
        if node.attributes.get(name).map(String::as_str) == Some(value) {
            return Some(id);
        }
        node.children
            .iter()
            .find_map(|child| self.find_by_attribute(*child, name, value))
    }

    fn node(&self, id: NodeId) -> Result<&LiveNode, TreeError> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(TreeError::Missing { id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut LiveNode, TreeError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(TreeError::Missing { id })
    }

    fn key_of(&self, id: NodeId) -> Option<&str> {
        self.attribute(id, &self.config.key_attribute)
    }

    fn materialize(&mut self, vnode: &VNode) -> Result<NodeId, TreeError> {
        match vnode {
            VNode::Text(text) => Ok(self.push_node(LiveNode {
                kind: TEXT_KIND.to_owned(),
                attributes: IndexMap::new(),
                text: text.clone(),
                children: Vec::new(),
                parent: None,
            })),
            VNode::Element(element) => {
                if let Some(identity) = element.same_as() {
                    return self.resolve_proxy(element, identity);
                }
                let id = self.push_node(LiveNode {
                    kind: element.kind().to_owned(),
                    attributes: element.attribute_map().clone(),
                    text: String::new(),
                    children: Vec::new(),
                    parent: None,
                });
                for child in element.children() {
                    let child_id = self.materialize(child)?;
                    let index = self.node(id)?.children.len();
                    self.insert_node(id, index, child_id)?;
                }
                Ok(id)
            }
        }
    }

    fn push_node(&mut self, node: LiveNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(node));
        id
    }

    fn resolve_proxy(&self, proxy: &Element, identity: Identity) -> Result<NodeId, TreeError> {
        proxy
            .attribute(&self.config.key_attribute)
            .and_then(|key| self.find_by_key(key))
            .filter(|id| self.carries_brand(*id, identity))
            .ok_or(TreeError::DanglingProxy { identity })
    }

    fn carries_brand(&self, id: NodeId, identity: Identity) -> bool {
        self.attribute(id, &self.config.brand_attribute)
            .is_some_and(|brand| is_brand_of(brand, identity))
    }

    fn insert_node(&mut self, parent: NodeId, index: usize, id: NodeId) -> Result<(), TreeError> {
        if self.node(parent)?.is_text() {
            return Err(TreeError::NotAnElement { id: parent });
        }
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == id {
                return Err(TreeError::Cycle { id, parent });
            }
            ancestor = self.parent(current);
        }
        self.unlink(id)?;
        let parent_node = self.node_mut(parent)?;
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, id);
        self.node_mut(id)?.parent = Some(parent);
        if self.is_attached(parent) {
            self.visit_subtree(id, Signal::Attached)?;
        }
        Ok(())
    }

    fn unlink(&mut self, id: NodeId) -> Result<(), TreeError> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        let was_attached = self.is_attached(id);
        if was_attached {
            self.visit_subtree(id, Signal::Detached)?;
        }
        self.node_mut(parent)?.children.retain(|child| *child != id);
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Drops a detached subtree from the arena.
    fn free(&mut self, id: NodeId) -> Result<(), TreeError> {
        let children = std::mem::take(&mut self.node_mut(id)?.children);
        for child in children {
            self.free(child)?;
        }
        self.nodes[id] = None;
        Ok(())
    }

    /// Whether `id` or one of its descendants is a branded component root.
    fn holds_brand(&self, id: NodeId) -> bool {
        self.attribute(id, &self.config.brand_attribute).is_some()
            || self
                .children(id)
                .iter()
                .any(|child| self.holds_brand(*child))
    }

    fn visit_subtree(&mut self, id: NodeId, signal: Signal) -> Result<(), TreeError> {
        if let Some(key) = self.key_of(id).map(str::to_owned) {
            match signal {
                Signal::Attached => {
                    if let Some(previous) = self.keyed.insert(key.clone(), id) {
                        if previous != id {
                            log::debug!("key `{key}` moved from node {previous} to node {id}");
                        }
                    }
                }
                Signal::Detached => {
                    if self.keyed.get(&key) == Some(&id) {
                        self.keyed.remove(&key);
                    }
                }
            }
            if self.observers.contains_key(&key) {
                self.pending.push((signal, key));
            }
        }
        let children = self.node(id)?.children.clone();
        for child in children {
            self.visit_subtree(child, signal)?;
        }
        Ok(())
    }

    fn flush_signals(&mut self) {
        for (signal, key) in std::mem::take(&mut self.pending) {
            let Some(observer) = self.observers.get(&key).and_then(Weak::upgrade) else {
                self.observers.remove(&key);
                continue;
            };
            log::trace!("{signal:?} `{key}`");
            match signal {
                Signal::Attached => observer.attached(&key),
                Signal::Detached => observer.detached(&key),
            }
        }
    }

    fn morph(&mut self, id: NodeId, next: &VNode) -> Result<(), TreeError> {
        let found = next.kind();
        let node = self.node_mut(id)?;
        if node.kind != found {
            return Err(TreeError::KindMismatch {
                id,
                expected: node.kind.clone(),
                found: found.to_owned(),
            });
        }
        match next {
            VNode::Text(text) => {
                if node.text != *text {
                    node.text.clone_from(text);
                }
                Ok(())
            }
            VNode::Element(element) => {
                if element.same_as().is_some() {
                    return Ok(());
                }
                self.morph_attributes(id, element)?;
                self.morph_children(id, element.children())
            }
        }
    }

    fn morph_attributes(&mut self, id: NodeId, element: &Element) -> Result<(), TreeError> {
        let old_key = self.key_of(id).map(str::to_owned);
        self.node_mut(id)?.attributes = element.attribute_map().clone();
        let new_key = self.key_of(id).map(str::to_owned);
        if old_key != new_key && self.is_attached(id) {
            if let Some(old_key) = old_key {
                if self.keyed.get(&old_key) == Some(&id) {
                    self.keyed.remove(&old_key);
                }
            }
            if let Some(new_key) = new_key {
                self.keyed.insert(new_key, id);
            }
        }
        Ok(())
    }

    fn morph_children(&mut self, parent: NodeId, next: &[VNode]) -> Result<(), TreeError> {
        for (index, child) in next.iter().enumerate() {
            let current = self.node(parent)?.children.get(index).copied();

            if let Some(identity) = child.same_as() {
                if current.is_some_and(|id| self.carries_brand(id, identity)) {
                    continue;
                }
                let element = child.as_element().ok_or(TreeError::DanglingProxy { identity })?;
                let target = self.resolve_proxy(element, identity)?;
                self.insert_node(parent, index, target)?;
                continue;
            }

            match self.match_child(parent, index, child)? {
                Some(existing) => {
                    if current != Some(existing) {
                        self.insert_node(parent, index, existing)?;
                    }
                    self.morph(existing, child)?;
                }
                None => {
                    let fresh = self.materialize(child)?;
                    self.insert_node(parent, index, fresh)?;
                }
            }
        }

        while self.node(parent)?.children.len() > next.len() {
            let Some(&extra) = self.node(parent)?.children.last() else {
                break;
            };
            self.unlink(extra)?;
            // Component roots stay so their instances can still reach them.
            if !self.holds_brand(extra) {
                self.free(extra)?;
            }
        }
        Ok(())
    }

    /// Finds the existing child `next` should morph into: a later sibling
    /// with the same key, or the child at `index` when neither is keyed.
    fn match_child(
        &self,
        parent: NodeId,
        index: usize,
        next: &VNode,
    ) -> Result<Option<NodeId>, TreeError> {
        let siblings = &self.node(parent)?.children;
        let next_key = next.attribute(&self.config.key_attribute);
        let found = match next_key {
            Some(key) => siblings.iter().skip(index).copied().find(|id| {
                self.key_of(*id) == Some(key) && self.kind(*id) == Some(next.kind())
            }),
            None => siblings
                .get(index)
                .copied()
                .filter(|id| self.key_of(*id).is_none() && self.kind(*id) == Some(next.kind())),
        };
        Ok(found)
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Ok(node) = self.node(id) else {
            return;
        };
        if node.is_text() {
            out.push_str(&node.text);
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Ok(node) = self.node(id) else {
            return;
        };
        if node.is_text() {
            out.push_str(&node.text);
            return;
        }
        let is_root = id == self.root;
        if !is_root {
            let attributes = node
                .attributes
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()));
            let _ = write_open_tag(out, &node.kind, attributes);
        }
        for child in &node.children {
            self.write_html(*child, out);
        }
        if !is_root {
            let _ = write!(out, "</{}>", node.kind);
        }
    }
}

impl Tree for MemoryTree {
    fn find_by_key(&self, key: &str) -> Option<NodeId> {
        self.keyed.get(key).copied()
    }

    fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .ok()?
            .attributes
            .get(name)
            .map(String::as_str)
    }

    fn kind(&self, id: NodeId) -> Option<&str> {
        self.node(id).ok().map(|node| node.kind.as_str())
    }

    fn patch(&mut self, id: NodeId, next: &VNode) -> Result<(), TreeError> {
        let result = self.morph(id, next);
        self.flush_signals();
        result
    }

    fn observe(&mut self, key: &str, observer: Weak<dyn AttachObserver>) {
        let next = observer.as_ptr().cast::<()>();
        if let Some(previous) = self.observers.insert(key.to_owned(), observer) {
            if previous.strong_count() > 0 && previous.as_ptr().cast::<()>() != next {
                log::warn!("key `{key}` is already observed by another instance; replacing it");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        log: RefCell<Vec<String>>,
    }

    impl AttachObserver for Recorder {
        fn attached(&self, key: &str) {
            self.log.borrow_mut().push(format!("+{key}"));
        }

        fn detached(&self, key: &str) {
            self.log.borrow_mut().push(format!("-{key}"));
        }
    }

    fn observe(tree: &mut MemoryTree, key: &str) -> Rc<Recorder> {
        let recorder = Rc::new(Recorder::default());
        let weak: Weak<dyn AttachObserver> = Rc::downgrade(&(recorder.clone() as Rc<dyn AttachObserver>));
        tree.observe(key, weak);
        recorder
    }

    fn list(items: &[&str]) -> VNode {
        let mut ul = Element::new("ul");
        for item in items {
            ul.push_child(Element::new("li").with_attribute("id", *item).with_text(*item));
        }
        ul.into()
    }

    #[test]
    fn keyed_lookup_only_sees_attached_nodes() {
        let mut tree = MemoryTree::new();
        let detached = tree
            .create(&Element::new("div").with_attribute("id", "a").into())
            .unwrap();
        assert_eq!(tree.find_by_key("a"), None);

        let root = tree.root();
        tree.move_node(detached, root, 0).unwrap();
        assert_eq!(tree.find_by_key("a"), Some(detached));
        assert!(tree.is_attached(detached));

        tree.remove(detached).unwrap();
        assert_eq!(tree.find_by_key("a"), None);
        assert!(tree.exists(detached));
    }

    #[test]
    fn observers_hear_attach_detach_and_moves() {
        let mut tree = MemoryTree::new();
        let recorder = observe(&mut tree, "a");
        let root = tree.root();
        let left = tree.append(root, &Element::new("section").into()).unwrap();
        let right = tree.append(root, &Element::new("section").into()).unwrap();

        let node = tree
            .append(left, &Element::new("div").with_attribute("id", "a").into())
            .unwrap();
        tree.move_node(node, right, 0).unwrap();
        tree.remove(right).unwrap();

        assert_eq!(*recorder.log.borrow(), ["+a", "-a", "+a", "-a"]);
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let mut tree = MemoryTree::new();
        drop(observe(&mut tree, "a"));
        let root = tree.root();
        tree.append(root, &Element::new("div").with_attribute("id", "a").into())
            .unwrap();
        assert!(tree.observers.is_empty());
    }

    #[test]
    fn patch_updates_text_and_attributes_in_place() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let id = tree
            .append(root, &Element::new("p").with_attribute("class", "a").with_text("one").into())
            .unwrap();

        tree.patch(id, &Element::new("p").with_attribute("class", "b").with_text("two").into())
            .unwrap();

        assert_eq!(tree.to_html(id), "<p class=\"b\">two</p>");
        assert_eq!(tree.children(root), [id]);
    }

    #[test]
    fn patch_reorders_keyed_children() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let ul = tree.append(root, &list(&["a", "b", "c"])).unwrap();
        let before: Vec<_> = tree.children(ul).to_vec();

        tree.patch(ul, &list(&["c", "a"])).unwrap();

        assert_eq!(tree.children(ul), [before[2], before[0]]);
        assert_eq!(tree.text_content(ul), "ca");
        assert_eq!(tree.find_by_key("b"), None);
    }

    #[test]
    fn patch_rejects_kind_change_at_the_root() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let id = tree.append(root, &Element::new("p").into()).unwrap();
        let err = tree.patch(id, &Element::new("div").into()).unwrap_err();
        assert!(matches!(err, TreeError::KindMismatch { .. }));
    }

    #[test]
    fn unkeyed_children_of_another_kind_are_replaced() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let id = tree
            .append(root, &Element::new("div").with_child(Element::new("p").with_text("x")).into())
            .unwrap();
        let old_child = tree.children(id)[0];

        tree.patch(id, &Element::new("div").with_child(Element::new("span").with_text("y")).into())
            .unwrap();

        assert_ne!(tree.children(id)[0], old_child);
        assert_eq!(tree.to_html(id), "<div><span>y</span></div>");
    }

    #[test]
    fn dispose_frees_detached_subtrees() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let id = tree.append(root, &list(&["a", "b"])).unwrap();
        assert_eq!(tree.len(), 6);
        tree.dispose(id).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(!tree.exists(id));
    }

    #[test]
    fn moving_a_node_under_its_own_subtree_is_rejected() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let outer = tree
            .append(root, &Element::new("section").with_child(Element::new("div")).into())
            .unwrap();
        let inner = tree.children(outer)[0];

        let err = tree.move_node(outer, inner, 0).unwrap_err();
        assert_eq!(err, TreeError::Cycle { id: outer, parent: inner });
        assert_eq!(
            tree.move_node(outer, outer, 0).unwrap_err(),
            TreeError::Cycle { id: outer, parent: outer }
        );

        assert_eq!(tree.parent(outer), Some(root));
        assert_eq!(tree.children(outer), [inner]);
        assert!(tree.is_attached(inner));
    }

    #[test]
    fn a_second_observer_for_a_key_takes_over() {
        let mut tree = MemoryTree::new();
        let first = observe(&mut tree, "a");
        let second = observe(&mut tree, "a");
        let root = tree.root();
        tree.append(root, &Element::new("div").with_attribute("id", "a").into())
            .unwrap();

        assert!(first.log.borrow().is_empty());
        assert_eq!(*second.log.borrow(), ["+a"]);
    }

    #[test]
    fn patching_frees_dropped_children() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let id = tree.append(root, &list(&["a", "b", "c"])).unwrap();
        let settled = tree.len();

        for round in 0..10 {
            let next = Element::new("ul")
                .with_child(Element::new("li").with_text(format!("{round}")))
                .with_child(Element::new("p").with_text("tail"))
                .with_child(Element::new("li").with_attribute("id", "c").with_text("c"));
            tree.patch(id, &next.into()).unwrap();
        }

        assert_eq!(tree.len(), settled);
        assert_eq!(tree.text_content(id), "9tailc");
    }

    #[test]
    fn patching_keeps_dropped_component_roots() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let branded = Element::new("span")
            .with_attribute("id", "w-1")
            .with_attribute("data-nanocomponent", "w-1");
        let id = tree
            .append(root, &Element::new("div").with_child(branded).into())
            .unwrap();
        let component_root = tree.children(id)[0];

        tree.patch(id, &Element::new("div").into()).unwrap();

        assert!(tree.children(id).is_empty());
        assert!(tree.exists(component_root));
        assert_eq!(tree.parent(component_root), None);
    }

    #[test]
    fn text_nodes_cannot_have_children() {
        let mut tree = MemoryTree::new();
        let root = tree.root();
        let text = tree.append(root, &VNode::text("hi")).unwrap();
        let err = tree.append(text, &VNode::text("there")).unwrap_err();
        assert_eq!(err, TreeError::NotAnElement { id: text });
    }
}
