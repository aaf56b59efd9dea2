//! Update decision: does a render with new inputs need a new node?

use crate::value::Value;

/// Shallow positional comparison. Returns `true` when the inputs differ.
///
/// Lists of different length always differ; otherwise each position is
/// compared with [`Value::same`].
pub fn shallow_changed(next: &[Value], last: &[Value]) -> bool {
    if next.len() != last.len() {
        return true;
    }
    next.iter().zip(last).any(|(a, b)| !a.same(b))
}

/// Pluggable comparison strategy used by the closure based adapters.
///
/// Implementations must be pure: they are consulted exactly once per render
/// that finds a live node.
pub trait UpdatePolicy {
    fn should_update(&mut self, next: &[Value], last: &[Value]) -> bool;
}

/// The default policy, see [`shallow_changed`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Shallow;

impl UpdatePolicy for Shallow {
    fn should_update(&mut self, next: &[Value], last: &[Value]) -> bool {
        shallow_changed(next, last)
    }
}

impl<F> UpdatePolicy for F
where
    F: FnMut(&[Value], &[Value]) -> bool,
{
    fn should_update(&mut self, next: &[Value], last: &[Value]) -> bool {
        self(next, last)
    }
}
