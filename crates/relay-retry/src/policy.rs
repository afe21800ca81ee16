//! Which errors should be retried, and how many times.

use std::sync::Arc;

/// Decides whether a given error should be retried.
///
/// `exclude` is checked before `retry_on`: an error matching `exclude`
/// never retries even if it would also match `retry_on`.
#[derive(Clone)]
pub struct RetryPolicy<E> {
    pub(crate) max_retries: u32,
    pub(crate) retry_on: Option<Arc<dyn Fn(&E) -> bool + Send + Sync>>,
    pub(crate) exclude: Option<Arc<dyn Fn(&E) -> bool + Send + Sync>>,
}

impl<E> RetryPolicy<E> {
    /// A policy that retries every error up to `max_retries` times.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retry_on: None,
            exclude: None,
        }
    }

    /// Restricts retries to errors matching `predicate`.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Some(Arc::new(predicate));
        self
    }

    /// Never retries errors matching `predicate`, even if `retry_on` would
    /// otherwise match them.
    pub fn exclude<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.exclude = Some(Arc::new(predicate));
        self
    }

    pub(crate) fn should_retry(&self, err: &E) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude(err) {
                return false;
            }
        }
        match &self.retry_on {
            Some(retry_on) => retry_on(err),
            None => true,
        }
    }
}
