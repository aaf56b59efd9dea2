use thiserror::Error;

use crate::identity::Identity;
use crate::tree::NodeId;

/// Caller bugs. These are reported, never retried or swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("create_node should be implemented")]
    MissingCreateNode,
    #[error("should_update should be implemented")]
    MissingShouldUpdate,
    #[error("root kind changed from `{expected}` to `{found}`")]
    RootKindMismatch { expected: String, found: String },
    #[error("cannot rerender an unmounted instance")]
    NotMounted,
    #[error("cannot brand {identity} onto a text node")]
    Unbrandable { identity: Identity },
    #[error("instance is busy running one of its own hooks")]
    Busy,
}

/// Failures reported by a [`Tree`](crate::tree::Tree) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {id} missing")]
    Missing { id: NodeId },
    #[error("node {id} is not an element")]
    NotAnElement { id: NodeId },
    #[error("node {id} is a `{expected}`, cannot patch it into a `{found}`")]
    KindMismatch {
        id: NodeId,
        expected: String,
        found: String,
    },
    #[error("cannot move node {id} under its own descendant {parent}")]
    Cycle { id: NodeId, parent: NodeId },
    #[error("proxy for {identity} does not resolve to a live node")]
    DanglingProxy { identity: Identity },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error("patch failed: {0}")]
    Tree(#[from] TreeError),
}

impl RenderError {
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, RenderError::Contract(_))
    }

    pub fn contract(&self) -> Option<&ContractViolation> {
        match self {
            RenderError::Contract(violation) => Some(violation),
            RenderError::Tree(_) => None,
        }
    }
}
