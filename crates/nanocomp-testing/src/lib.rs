//! Testing utilities and harness for nanocomp

pub mod testing;

// Re-export testing utilities
pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
    pub use nanocomp_core::{
        component_fn, inputs, widget, Component, Element, Instance, MemoryTree, NodeId,
        RenderError, Tree, VNode, Value,
    };
}
