//! Composes a [`TaskQueue`] and an [`Executor`] with per-interval request
//! and token budgets.
//!
//! Two independent gauges are maintained: `available_request` (a count of
//! events) and `available_token` (a sum of each event's
//! [`TokenCost::required_tokens`]). Either, both, or neither may be
//! configured. A background replenisher resets both every `interval`:
//! `available_request := limit_requests - queue.len()` (budget tracks
//! resident work, not a simple counter) and `available_token :=
//! limit_tokens` (a full refill).
//!
//! `available_request` is decremented as soon as the request check passes,
//! even if the token check that follows ends up denying the event. This
//! reproduces a double-accounting quirk documented as an open ambiguity;
//! see `DESIGN.md`.

use crate::events::ExecutorEvent;
use crate::executor::{Executor, PermissionGate};
use crate::queue::TaskQueue;
use async_trait::async_trait;
use relay_core::events::EventListeners;
use relay_core::identity::{Identity, Invokable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// An event with an optional non-negative token cost consumed from the
/// per-interval token budget.
pub trait TokenCost {
    /// The cost of this event, if any. `None` skips token accounting for
    /// this event even when `limit_tokens` is set.
    fn required_tokens(&self) -> Option<u64>;
}

struct GateState {
    available_request: Option<i64>,
    available_token: Option<f64>,
}

struct RateGate {
    limit_requests: Option<u64>,
    limit_tokens: Option<u64>,
    state: Mutex<GateState>,
}

#[async_trait]
impl<T> PermissionGate<T> for RateGate
where
    T: TokenCost + Send + Sync,
{
    async fn request_permission(&self, item: &T) -> bool {
        if self.limit_requests.is_none() && self.limit_tokens.is_none() {
            return true;
        }

        let mut state = self.state.lock().await;

        if self.limit_requests.is_some() {
            match state.available_request {
                Some(remaining) if remaining > 0 => {
                    state.available_request = Some(remaining - 1);
                }
                _ => return false,
            }
        }

        if self.limit_tokens.is_some() {
            if let Some(cost) = item.required_tokens() {
                match state.available_token {
                    Some(remaining) if remaining >= cost as f64 => {
                        state.available_token = Some(remaining - cost as f64);
                    }
                    _ => return false,
                }
            }
        }

        true
    }
}

/// A rate-limited executor: a [`TaskQueue`] plus an [`Executor`], gated by
/// per-interval request/token budgets that a background task replenishes.
///
/// Construct with [`RateLimitedExecutor::new`], then [`RateLimitedExecutor::enter`]
/// to start the queue and replenisher before submitting work, and
/// [`RateLimitedExecutor::exit`] to tear both down. Re-entry after exit
/// requires a fresh instance, matching the "re-entry requires
/// re-construction of the queue" rule this component documents.
pub struct RateLimitedExecutor<T> {
    queue: Arc<TaskQueue<Uuid>>,
    executor: Executor<T>,
    gate: Arc<RateGate>,
    interval: Duration,
    replenisher: StdMutex<Option<JoinHandle<()>>>,
    entered: AtomicBool,
    name: String,
    event_listeners: EventListeners<ExecutorEvent>,
}

impl<T> RateLimitedExecutor<T>
where
    T: Invokable + Identity + TokenCost + Send + Sync + 'static,
{
    /// Builds a rate-limited executor. `interval` defaults to
    /// `queue_capacity_refresh_time` when not overridden with
    /// [`RateLimitedExecutor::with_interval`].
    pub fn new(
        max_concurrency: Option<usize>,
        queue_capacity: usize,
        queue_capacity_refresh_time: Duration,
        limit_requests: Option<u64>,
        limit_tokens: Option<u64>,
    ) -> Self {
        let queue = Arc::new(TaskQueue::new(
            queue_capacity,
            queue_capacity_refresh_time,
            max_concurrency,
        ));
        let gate = Arc::new(RateGate {
            limit_requests,
            limit_tokens,
            state: Mutex::new(GateState {
                available_request: limit_requests.map(|n| n as i64),
                available_token: limit_tokens.map(|n| n as f64),
            }),
        });
        let executor = Executor::with_queue_and_gate(max_concurrency, Arc::clone(&queue), gate.clone() as Arc<dyn PermissionGate<T>>);
        Self {
            queue,
            executor,
            gate,
            interval: queue_capacity_refresh_time,
            replenisher: StdMutex::new(None),
            entered: AtomicBool::new(false),
            name: "rate_limited_executor".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Overrides the replenishment interval (defaults to the queue's
    /// `capacity_refresh_time`).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Assigns a name used in emitted events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The underlying executor, for direct `append`/`forward`/`pop` use.
    pub fn executor(&self) -> &Executor<T> {
        &self.executor
    }

    /// Starts the queue and the background replenisher. Idempotent: a
    /// second call while already entered is a no-op.
    pub fn enter(&self) {
        if self.entered.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.start();

        let gate = Arc::clone(&self.gate);
        let queue = Arc::clone(&self.queue);
        let interval = self.interval;
        let name = self.name.clone();
        let listeners = self.event_listeners.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let resident = queue.len().await as i64;
                let mut state = gate.state.lock().await;
                if let Some(limit_requests) = gate.limit_requests {
                    state.available_request = Some(limit_requests as i64 - resident);
                }
                if let Some(limit_tokens) = gate.limit_tokens {
                    state.available_token = Some(limit_tokens as f64);
                }
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    executor = %name,
                    available_request = ?state.available_request,
                    available_token = ?state.available_token,
                    "rate-limited executor budgets replenished"
                );
                listeners.emit(&ExecutorEvent::CapacityRefreshed {
                    pattern_name: name.clone(),
                    timestamp: Instant::now(),
                    available_request: state.available_request,
                    available_token: state.available_token,
                });
            }
        });

        *self.replenisher.lock().unwrap() = Some(handle);
    }

    /// Stops the replenisher, then stops and joins the queue. Idempotent.
    pub async fn exit(&self) {
        if !self.entered.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.replenisher.lock().unwrap().take() {
            handle.abort();
        }
        self.queue.stop();
        self.queue.join().await;
    }

    /// Appends `event` and immediately attempts to forward it into the
    /// queue and start it if budgets allow.
    pub async fn append(&self, event: T) -> Uuid {
        let id = self.executor.append(event).await;
        self.executor.forward().await;
        id
    }

    /// Removes and returns a finished event.
    pub async fn pop(&self, id: Uuid) -> Option<T> {
        self.executor.pop(id).await
    }
}

impl<T> Drop for RateLimitedExecutor<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.replenisher.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Clone)]
    struct CountedEvent {
        id: Uuid,
        cost: Option<u64>,
    }

    impl Identity for CountedEvent {
        fn id(&self) -> Uuid {
            self.id
        }
        fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
            chrono::Utc::now()
        }
    }

    #[async_trait::async_trait]
    impl Invokable for CountedEvent {
        type Error = std::convert::Infallible;
        async fn invoke(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    impl TokenCost for CountedEvent {
        fn required_tokens(&self) -> Option<u64> {
            self.cost
        }
    }

    #[tokio::test]
    async fn denies_events_over_token_budget() {
        let rle: RateLimitedExecutor<CountedEvent> =
            RateLimitedExecutor::new(Some(4), 16, Duration::from_millis(20), None, Some(100));
        rle.enter();

        let expensive = Uuid::new_v4();
        rle.executor()
            .append(CountedEvent {
                id: expensive,
                cost: Some(150),
            })
            .await;
        rle.executor().forward().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rle.executor().pop(expensive).await.is_none());

        let cheap = Uuid::new_v4();
        rle.executor()
            .append(CountedEvent {
                id: cheap,
                cost: Some(50),
            })
            .await;
        rle.executor().forward().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rle.executor().pop(cheap).await.is_some());

        rle.exit().await;
    }

    #[tokio::test]
    async fn request_budget_caps_dequeued_events_per_interval() {
        let rle: RateLimitedExecutor<CountedEvent> =
            RateLimitedExecutor::new(Some(8), 16, Duration::from_millis(30), Some(2), None);
        rle.enter();

        for _ in 0..5 {
            rle.executor()
                .append(CountedEvent {
                    id: Uuid::new_v4(),
                    cost: None,
                })
                .await;
        }
        rle.executor().forward().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(rle.executor().active_count().await <= 2);
        rle.exit().await;
    }
}
