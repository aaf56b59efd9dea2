#![doc = r"Identity, render caching and lifecycle reconciliation for components rendered into mutable node trees."]

mod cache;
pub mod collections;
pub mod compare;
pub mod component;
pub mod config;
pub mod error;
pub mod identity;
pub mod instance;
pub mod lifecycle;
pub mod memory_tree;
pub mod node;
pub mod platform;
pub mod runtime;
pub mod tree;
pub mod value;

pub use compare::{shallow_changed, Shallow, UpdatePolicy};
pub use component::{component_fn, widget, Component, FnComponent, Widget, WidgetUpdates};
pub use config::BrandConfig;
pub use error::{ContractViolation, RenderError, TreeError};
pub use identity::{Identity, IdentityRegistry};
pub use instance::Instance;
pub use lifecycle::LifecycleState;
pub use memory_tree::MemoryTree;
pub use node::{Element, VNode, TEXT_KIND};
pub use platform::RuntimeScheduler;
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use tree::{is_same_node, AttachObserver, NodeId, SharedTree, Tree};
pub use value::{Inputs, Value};
