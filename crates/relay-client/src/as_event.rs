//! A generic event-instrumentation wrapper for ad-hoc async operations
//! that do not go through an [`crate::ApiClient`].
//!
//! Grounded on `khive/protocols/event.py`'s `as_event` decorator factory,
//! which wraps an arbitrary callable so every invocation is recorded as
//! an [`crate::event::Event`]-shaped record and optionally embedded and
//! forwarded to a sink. Rust has no decorators or runtime attribute
//! mutation, so this is a plain higher-order function instead: call it
//! with the operation, an optional embedding step, and an optional sink,
//! and it returns the finished [`GenericEvent`].

use crate::event::EventStatus;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A boxed, type-erased future, used so `as_event`'s three callbacks can
/// be ordinary `FnOnce` closures instead of requiring a generic async
/// trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The record produced by [`as_event`] for one wrapped operation.
#[derive(Debug, Clone)]
pub struct GenericEvent<T> {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: EventStatus,
    pub duration: Option<Duration>,
    pub response: Option<T>,
    pub error: Option<String>,
}

impl<T> GenericEvent<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, EventStatus::Completed | EventStatus::Failed)
    }
}

/// Runs `op`, recording its outcome into a [`GenericEvent`]. On success,
/// if `embed` is provided it runs against the result before the event is
/// marked `COMPLETED`. If `sink` is provided, the finished event is
/// forwarded to it before `as_event` returns it to the caller.
pub async fn as_event<T, Op, Embed, Sink>(
    op: Op,
    embed: Option<Embed>,
    sink: Option<Sink>,
) -> GenericEvent<T>
where
    T: Send + 'static,
    Op: FnOnce() -> BoxFuture<'static, Result<T, String>>,
    Embed: FnOnce(&T) -> BoxFuture<'static, ()>,
    Sink: FnOnce(&GenericEvent<T>) -> BoxFuture<'static, ()>,
{
    let now = Utc::now();
    let mut event = GenericEvent {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        status: EventStatus::Processing,
        duration: None,
        response: None,
        error: None,
    };

    let start = Instant::now();
    match op().await {
        Ok(value) => {
            if let Some(embed) = embed {
                embed(&value).await;
            }
            event.response = Some(value);
            event.status = EventStatus::Completed;
        }
        Err(err) => {
            event.error = Some(err);
            event.status = EventStatus::Failed;
        }
    }
    event.duration = Some(start.elapsed());
    event.updated_at = Utc::now();

    if let Some(sink) = sink {
        sink(&event).await;
    }

    event
}
