//! Bounded task queue, concurrency-limited executor, and rate-limited
//! executor composition.
//!
//! - [`queue::TaskQueue`] is a bounded FIFO queue with an explicit
//!   stop/start and empty-and-idle join lifecycle.
//! - [`executor::Executor`] runs work from a queue under a concurrency
//!   cap, or ad-hoc futures via `execute`/`map`.
//! - [`rate_limited::RateLimitedExecutor`] composes a queue and an
//!   executor with per-interval request and token budgets.

pub mod error;
pub mod events;
pub mod executor;
pub mod queue;
pub mod rate_limited;

pub use error::ExecutorError;
pub use events::ExecutorEvent;
pub use executor::{AlwaysPermit, Executor, PermissionGate};
pub use queue::TaskQueue;
pub use rate_limited::{RateLimitedExecutor, TokenCost};
