//! Core types shared across all Aquila crates.
//!
//! This crate provides the foundational pieces every other crate builds on:
//! the unified error type and the in-process event bus used to announce
//! scheduling and agent lifecycle milestones.
//!
//! # Main types
//!
//! - [`AquilaError`] — Unified error enum for all Aquila subsystems.
//! - [`AquilaResult`] — Convenience alias for `Result<T, AquilaError>`.
//! - [`EventBus`] — Publish/subscribe channel for system events.
//! - [`Event`] — A single published event (subject, payload, timestamp).

/// Error types.
pub mod error;
/// In-process publish/subscribe event bus.
pub mod event;

pub use error::{AquilaError, AquilaResult};
pub use event::{subjects, Event, EventBus, EventSubscription, Received};
