//! A bounded, FIFO queue of pending work with an explicit stop/start and
//! join lifecycle.
//!
//! Capacity is enforced only against items resident in the queue; once an
//! item is dequeued for execution it no longer counts against
//! `queue_capacity`. In-flight work is tracked separately via
//! [`TaskQueue::task_started`]/[`TaskQueue::task_finished`] so that
//! [`TaskQueue::join`] can resolve only once the queue is both empty and
//! nothing dequeued from it is still running.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// A bounded FIFO queue with explicit stop/start and a combined
/// empty-and-idle join condition.
pub struct TaskQueue<T> {
    capacity: usize,
    concurrency_limit: Option<usize>,
    capacity_refresh_time: Duration,
    items: Mutex<VecDeque<T>>,
    not_empty: Notify,
    not_full: Notify,
    idle: Notify,
    stopped: AtomicBool,
    in_flight: AtomicUsize,
}

impl<T> TaskQueue<T> {
    /// Creates a queue holding at most `capacity` resident items.
    /// `concurrency_limit` is a hint consumed by an executor, not enforced
    /// by the queue itself. `capacity_refresh_time` is the cadence an
    /// executor should use for its own scheduling loop and for
    /// requeue-after-denial backoff.
    pub fn new(
        capacity: usize,
        capacity_refresh_time: Duration,
        concurrency_limit: Option<usize>,
    ) -> Self {
        Self {
            capacity: capacity.max(1),
            concurrency_limit,
            capacity_refresh_time,
            items: Mutex::new(VecDeque::new()),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            idle: Notify::new(),
            stopped: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// The configured resident capacity.
    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }

    /// The concurrency hint, if the caller set one.
    pub fn concurrency_limit(&self) -> Option<usize> {
        self.concurrency_limit
    }

    /// Cadence an executor should poll or back off on.
    pub fn capacity_refresh_time(&self) -> Duration {
        self.capacity_refresh_time
    }

    /// Remaining resident capacity.
    pub async fn available_capacity(&self) -> usize {
        let items = self.items.lock().await;
        self.capacity.saturating_sub(items.len())
    }

    /// Number of items currently resident in the queue (excludes in-flight work).
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Whether the queue holds no resident items.
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Whether `stop` has been called more recently than `start`.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Signals a consuming executor to stop dequeuing. Does not drain or
    /// drop resident items.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Clears the stopped flag.
    pub fn start(&self) {
        self.stopped.store(false, Ordering::Release);
    }

    /// Appends `item` to the back of the queue, suspending while the
    /// queue is at capacity.
    pub async fn enqueue(&self, item: T) {
        loop {
            {
                let mut items = self.items.lock().await;
                if items.len() < self.capacity {
                    items.push_back(item);
                    self.not_empty.notify_one();
                    return;
                }
            }
            self.not_full.notified().await;
        }
    }

    /// Removes and returns the item at the front of the queue, suspending
    /// until one is available. This is a cancellation point.
    pub async fn dequeue(&self) -> T {
        loop {
            {
                let mut items = self.items.lock().await;
                if let Some(item) = items.pop_front() {
                    self.not_full.notify_one();
                    if items.is_empty() {
                        self.idle.notify_waiters();
                    }
                    return item;
                }
            }
            self.not_empty.notified().await;
        }
    }

    /// Marks one unit of work as having entered execution. Call once per
    /// task, immediately before running it.
    pub fn task_started(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// Marks one unit of in-flight work as complete, waking any pending
    /// [`TaskQueue::join`].
    pub fn task_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.idle.notify_waiters();
    }

    /// Current in-flight count, as tracked by `task_started`/`task_finished`.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once the queue is empty AND no work dequeued from it is
    /// still in flight.
    pub async fn join(&self) {
        loop {
            if self.is_empty().await && self.in_flight() == 0 {
                return;
            }
            tokio::select! {
                _ = self.idle.notified() => {}
                _ = self.not_full.notified() => {}
                _ = tokio::time::sleep(self.capacity_refresh_time) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fifo_ordering_is_preserved() {
        let queue: TaskQueue<u32> = TaskQueue::new(10, Duration::from_millis(10), None);
        for i in 0..5 {
            queue.enqueue(i).await;
        }
        for i in 0..5 {
            assert_eq!(queue.dequeue().await, i);
        }
    }

    #[tokio::test]
    async fn enqueue_blocks_at_capacity() {
        let queue = Arc::new(TaskQueue::<u32>::new(1, Duration::from_millis(5), None));
        queue.enqueue(1).await;
        assert_eq!(queue.available_capacity().await, 0);

        let q2 = Arc::clone(&queue);
        let blocked = tokio::spawn(async move {
            q2.enqueue(2).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        assert_eq!(queue.dequeue().await, 1);
        blocked.await.unwrap();
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn join_waits_for_in_flight_work() {
        let queue = Arc::new(TaskQueue::<u32>::new(10, Duration::from_millis(5), None));
        queue.enqueue(1).await;
        let item = queue.dequeue().await;
        queue.task_started();
        assert_eq!(item, 1);

        let q2 = Arc::clone(&queue);
        let joined = tokio::spawn(async move {
            q2.join().await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!joined.is_finished());

        queue.task_finished();
        tokio::time::timeout(Duration::from_millis(100), joined)
            .await
            .expect("join should resolve once in-flight work finishes")
            .unwrap();
    }

    #[tokio::test]
    async fn stop_does_not_drain_resident_items() {
        let queue: TaskQueue<u32> = TaskQueue::new(10, Duration::from_millis(5), None);
        queue.enqueue(42).await;
        queue.stop();
        assert!(queue.is_stopped());
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.dequeue().await, 42);
    }
}
