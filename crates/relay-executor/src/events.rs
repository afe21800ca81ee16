//! Observability events emitted by the queue, executor, and rate-limited
//! executor.

use relay_core::ResilienceEvent;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Events emitted while tasks move through the executor.
#[derive(Debug, Clone)]
pub enum ExecutorEvent {
    /// A task was dequeued, permitted, and started.
    TaskStarted {
        /// Name of the executor instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Id of the started task.
        task_id: Uuid,
        /// Number of tasks in flight immediately after this one started.
        in_flight: usize,
    },
    /// A task ran to completion (success or application-level failure).
    TaskFinished {
        /// Name of the executor instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Id of the finished task.
        task_id: Uuid,
        /// How long the task ran.
        duration: Duration,
    },
    /// A task was cancelled before it finished.
    TaskCancelled {
        /// Name of the executor instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Id of the cancelled task.
        task_id: Uuid,
    },
    /// A dequeued task was denied permission and was requeued.
    PermissionDenied {
        /// Name of the executor instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Id of the denied task.
        task_id: Uuid,
    },
    /// The rate-limited executor's gauges were replenished.
    CapacityRefreshed {
        /// Name of the executor instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Remaining request budget after refresh, if request limiting is enabled.
        available_request: Option<i64>,
        /// Remaining token budget after refresh, if token limiting is enabled.
        available_token: Option<f64>,
    },
}

impl ResilienceEvent for ExecutorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::TaskStarted { .. } => "task_started",
            Self::TaskFinished { .. } => "task_finished",
            Self::TaskCancelled { .. } => "task_cancelled",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::CapacityRefreshed { .. } => "capacity_refreshed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::TaskStarted { timestamp, .. }
            | Self::TaskFinished { timestamp, .. }
            | Self::TaskCancelled { timestamp, .. }
            | Self::PermissionDenied { timestamp, .. }
            | Self::CapacityRefreshed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::TaskStarted { pattern_name, .. }
            | Self::TaskFinished { pattern_name, .. }
            | Self::TaskCancelled { pattern_name, .. }
            | Self::PermissionDenied { pattern_name, .. }
            | Self::CapacityRefreshed { pattern_name, .. } => pattern_name,
        }
    }
}
