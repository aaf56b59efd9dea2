//! Host abstraction for paint-safe scheduling.
//!
//! The runtime never runs deferred work on its own. It queues callbacks and
//! asks the host, through [`RuntimeScheduler`], to schedule a frame; the host
//! then calls [`Runtime::drain_frame`](crate::Runtime::drain_frame) after its
//! current batch of tree mutations and before painting.

/// Requests frames from the host.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host schedule a new frame. Called once per queued
    /// callback; hosts are expected to coalesce.
    fn schedule_frame(&self);
}
