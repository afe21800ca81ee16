//! Narrow trait seams used to compose the call event in `relay-client`.
//!
//! The source system models a call event through multiple inheritance:
//! a base class contributes identity, another contributes timing and
//! response bookkeeping, another makes the type invokable. Rust has no
//! multiple inheritance, so each concern becomes its own trait and the
//! call event embeds the state each trait needs and implements all of
//! them. This mirrors how a struct can implement several small traits
//! instead of extending several base classes.

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// A value with a stable identity and a frozen creation time.
pub trait Identity {
    /// Unique id, assigned once at construction and never changed.
    fn id(&self) -> Uuid;

    /// When the value was constructed. Frozen after construction.
    fn created_at(&self) -> DateTime<Utc>;
}

/// A value with a mutable "last touched" timestamp.
pub trait Temporal {
    /// When the value was last mutated.
    fn updated_at(&self) -> DateTime<Utc>;

    /// Marks the value as touched now.
    fn touch(&mut self);
}

/// Bookkeeping for one execution attempt: how long it took, what came
/// back, and what went wrong, if anything.
pub trait Execution {
    /// Wall-clock time the operation took, once it has finished.
    fn duration(&self) -> Option<Duration>;

    /// The raw response payload, once the operation has completed
    /// successfully.
    fn response(&self) -> Option<&serde_json::Value>;

    /// A human-readable description of the failure, if the operation
    /// failed.
    fn error(&self) -> Option<&str>;
}

/// A value that can run its own operation.
#[async_trait::async_trait]
pub trait Invokable {
    /// The error type surfaced to the caller when invocation fails.
    type Error;

    /// Runs the operation this value represents, recording its own
    /// outcome as a side effect rather than returning it. Implementors
    /// must never unwind past this call except to propagate
    /// cancellation: any other failure is recorded internally and
    /// observed later through [`Execution`].
    async fn invoke(&mut self) -> Result<(), Self::Error>;

    /// Called by an executor when this invocation is cancelled before
    /// `invoke` ran to completion. The default does nothing; a type that
    /// tracks terminal status (a call event transitioning to `FAILED`)
    /// should override this to record the cancellation.
    fn mark_cancelled(&mut self) {}
}

/// A value that can lazily compute and hold a vector embedding of its
/// own content.
#[async_trait::async_trait]
pub trait Embeddable {
    /// The error type surfaced when embedding generation fails.
    type Error;

    /// The text this value's embedding should represent.
    fn content(&self) -> &str;

    /// The embedding vector, if one has been generated.
    fn embedding(&self) -> Option<&[f32]>;

    /// Generates and stores an embedding for [`Self::content`].
    async fn generate_embedding(&mut self) -> Result<(), Self::Error>;
}
