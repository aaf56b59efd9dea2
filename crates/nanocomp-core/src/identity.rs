//! Identity tokens, node branding, and lookup of the node a token names.
//!
//! Live nodes are never held by the engine. An instance only remembers its
//! [`Identity`] and the addressable key it wrote onto its root; every access
//! goes back to the tree through [`resolve`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::BrandConfig;
use crate::error::ContractViolation;
use crate::node::VNode;
use crate::tree::{NodeId, Tree};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    prefix: &'static str,
    serial: u64,
}

impl Identity {
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.serial)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

/// Issues identity tokens that are unique for the life of the process.
///
/// Tokens are never reused. Two registries with different prefixes never
/// collide with each other either, which lets tests inject their own.
#[derive(Debug)]
pub struct IdentityRegistry {
    prefix: &'static str,
    next: AtomicU64,
}

static GLOBAL_REGISTRY: OnceLock<Arc<IdentityRegistry>> = OnceLock::new();

impl IdentityRegistry {
    pub const DEFAULT_PREFIX: &'static str = "nc";

    pub const fn with_prefix(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    /// The process-wide registry every runtime uses unless told otherwise.
    pub fn global() -> Arc<IdentityRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(IdentityRegistry::with_prefix(Self::DEFAULT_PREFIX)))
            .clone()
    }

    pub fn allocate(&self) -> Identity {
        Identity {
            prefix: self.prefix,
            serial: self.next.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }
}

/// Writes `identity` onto `node` and makes sure it has an addressable key.
///
/// An explicit `key` wins over whatever the node carries; otherwise a key the
/// caller already put on the node is kept, and failing that the identity
/// string becomes the key. Returns the key the node ended up with.
pub fn brand(
    node: &mut VNode,
    identity: Identity,
    key: Option<&str>,
    config: &BrandConfig,
) -> Result<String, ContractViolation> {
    let element = node
        .as_element_mut()
        .ok_or(ContractViolation::Unbrandable { identity })?;
    let key = match key {
        Some(key) => key.to_owned(),
        None => element
            .attribute(&config.key_attribute)
            .map(str::to_owned)
            .unwrap_or_else(|| identity.to_string()),
    };
    element.set_attribute(&config.key_attribute, key.clone());
    element.set_attribute(&config.brand_attribute, identity.to_string());
    Ok(key)
}

/// Returns the attached node carrying both `key` and the brand of `identity`.
pub fn resolve(
    tree: &dyn Tree,
    identity: Identity,
    key: &str,
    config: &BrandConfig,
) -> Option<NodeId> {
    let id = tree.find_by_key(key)?;
    let branded = tree
        .attribute(id, &config.brand_attribute)
        .is_some_and(|brand| is_brand_of(brand, identity));
    branded.then_some(id)
}

pub(crate) fn is_brand_of(brand: &str, identity: Identity) -> bool {
    brand
        .strip_prefix(identity.prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|serial| serial.parse::<u64>().ok())
        == Some(identity.serial)
}
