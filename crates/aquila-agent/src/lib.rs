//! Agent runtime for the Aquila framework.
//!
//! Agents are external capabilities identified by id that expose an
//! asynchronous `process` operation. This crate defines the [`Agent`] trait,
//! the [`AgentDirectory`] lookup seam the scheduler depends on, and the
//! [`AgentRegistry`] that owns agent lifecycle and announces registrations
//! and removals on the event bus.

/// The `Agent` trait and a closure-backed implementation.
pub mod agent;
/// Agent registry and lifecycle events.
pub mod registry;

pub use agent::{Agent, AgentDirectory, FnAgent, RemovalObserver};
pub use registry::{AgentEvent, AgentRegistry};
