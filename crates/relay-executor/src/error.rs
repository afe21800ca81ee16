//! Error types for the bounded queue and executor.

use std::time::Duration;

/// Errors raised by [`crate::queue::TaskQueue`] and [`crate::executor::Executor`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    /// `join` did not observe an idle queue within the given timeout.
    #[error("join timed out after {0:?}")]
    JoinTimeout(Duration),

    /// The task was cancelled before it completed.
    #[error("task cancelled")]
    Cancelled,
}
