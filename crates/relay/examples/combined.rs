//! Example demonstrating the circuit breaker and retry-with-backoff
//! components composed together around a flaky operation.
//!
//! The breaker wraps the retry loop: if retries keep exhausting, the
//! breaker eventually trips and starts rejecting calls immediately
//! without even attempting the retried operation.
//!
//! Run with: cargo run --example combined -p relay --features circuitbreaker,retry

use relay::circuitbreaker::{CircuitBreaker, CircuitBreakerError};
use relay::retry::{Retry, RetryPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct UpstreamError;

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream error")
    }
}

#[tokio::main]
async fn main() {
    let calls = Arc::new(AtomicUsize::new(0));
    let breaker = CircuitBreaker::new(3, Duration::from_millis(300)).with_name("demo-upstream");
    let retry: Retry<UpstreamError> = Retry::new(
        RetryPolicy::new(2),
        Duration::from_millis(20),
        Duration::from_millis(200),
        2.0,
        false,
    );

    println!("Sending 12 requests through retry(2 attempts) -> circuit breaker(threshold 3)\n");

    for i in 1..=12 {
        let calls = Arc::clone(&calls);
        let result = breaker
            .execute(|| {
                let calls = Arc::clone(&calls);
                retry.execute(move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        // The upstream fails every call until attempt 9 onward.
                        if n < 9 {
                            Err(UpstreamError)
                        } else {
                            Ok(n)
                        }
                    }
                })
            })
            .await;

        match result {
            Ok(n) => println!("request {i}: succeeded on attempt {n}"),
            Err(CircuitBreakerError::Open { retry_after }) => {
                println!("request {i}: breaker open, would retry after {retry_after:?}");
            }
            Err(CircuitBreakerError::Inner(err)) => {
                println!("request {i}: retries exhausted, upstream error: {err}");
            }
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    println!(
        "\ntotal attempts that reached the upstream operation: {}",
        calls.load(Ordering::SeqCst)
    );
}
