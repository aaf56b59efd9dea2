//! Detached node descriptions produced by render functions.
//!
//! A [`VNode`] is a value. It becomes part of the live tree only when a
//! [`Tree`](crate::tree::Tree) materializes it; from then on the tree owns the
//! node and the engine only refers to it by key.

use std::fmt;

use indexmap::IndexMap;

use crate::identity::Identity;

pub const TEXT_KIND: &str = "#text";

#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    kind: String,
    attributes: IndexMap<String, String>,
    children: Vec<VNode>,
    same_as: Option<Identity>,
}

impl Element {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub(crate) fn attribute_map(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.shift_remove(name)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn push_child(&mut self, child: impl Into<VNode>) {
        self.children.push(child.into());
    }

    pub fn with_child(mut self, child: impl Into<VNode>) -> Self {
        self.push_child(child);
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(VNode::Text(text.into()))
    }

    /// The instance this element stands in for, if it is a proxy.
    pub fn same_as(&self) -> Option<Identity> {
        self.same_as
    }

    pub(crate) fn declare_same_as(&mut self, identity: Identity) {
        self.same_as = Some(identity);
    }
}

impl VNode {
    pub fn text(text: impl Into<String>) -> Self {
        VNode::Text(text.into())
    }

    pub fn kind(&self) -> &str {
        match self {
            VNode::Text(_) => TEXT_KIND,
            VNode::Element(element) => element.kind(),
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            VNode::Element(element) => Some(element),
            VNode::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            VNode::Element(element) => Some(element),
            VNode::Text(_) => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.as_element().and_then(|element| element.attribute(name))
    }

    pub fn is_proxy(&self) -> bool {
        self.same_as().is_some()
    }

    pub fn same_as(&self) -> Option<Identity> {
        self.as_element().and_then(Element::same_as)
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            VNode::Text(text) => out.push_str(text),
            VNode::Element(element) => {
                for child in element.children() {
                    child.collect_text(out);
                }
            }
        }
    }
}

impl From<Element> for VNode {
    fn from(element: Element) -> Self {
        VNode::Element(element)
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        VNode::text(text)
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        VNode::Text(text)
    }
}

impl fmt::Display for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNode::Text(text) => f.write_str(text),
            VNode::Element(element) => {
                write_open_tag(f, element.kind(), element.attributes())?;
                for child in element.children() {
                    write!(f, "{child}")?;
                }
                write!(f, "</{}>", element.kind())
            }
        }
    }
}

pub(crate) fn write_open_tag<'a>(
    out: &mut impl fmt::Write,
    kind: &str,
    attributes: impl Iterator<Item = (&'a str, &'a str)>,
) -> fmt::Result {
    write!(out, "<{kind}")?;
    for (name, value) in attributes {
        if value.is_empty() {
            write!(out, " {name}")?;
        } else {
            write!(out, " {name}=\"{value}\"")?;
        }
    }
    out.write_char('>')
}
