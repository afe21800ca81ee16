//! Core infrastructure shared by the resilience crates.
//!
//! This crate provides the pieces every other `relay-*` crate builds on:
//! - an event system for observability (event -> listeners, panic-safe)
//! - the unified [`error::ApiClientError`] taxonomy
//! - the narrow trait seams ([`identity`]) used to compose the call event

pub mod error;
pub mod events;
pub mod identity;

pub use error::{kind_label, ApiClientError};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use identity::{Embeddable, Execution, Identity, Invokable, Temporal};
