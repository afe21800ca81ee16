//! Example wiring every component together: an [`Endpoint`] behind a
//! stubbed SDK transport, driven by an [`ApiClient`] that rate-limits,
//! queues, and polls calls to completion, plus a standalone circuit
//! breaker + retry composition for contrast with the facade's own
//! internal retry loop.
//!
//! Run with: cargo run --example full_stack -p relay --features full

use relay::circuitbreaker::CircuitBreaker;
use relay::client::{ApiClient, ApiClientOptions, InvokeOptions};
use relay::endpoint::credential::StaticCredentialProvider;
use relay::endpoint::{Endpoint, EndpointConfig, TransportKind};
use relay::retry::{Retry, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("=== Full stack: ApiClient over a rate-limited, cached endpoint ===\n");
    facade_demo().await;

    println!("\n=== Standalone circuit breaker + retry, for contrast ===\n");
    standalone_demo().await;
}

async fn facade_demo() {
    let config = EndpointConfig::builder("chat", "openai", "https://api.openai.com/v1", "/chat/completions")
        .transport(TransportKind::Sdk)
        .build();
    let credentials = Arc::new(StaticCredentialProvider::new().with("openai", "sk-demo-key"));
    let endpoint = Arc::new(Endpoint::new(config, credentials));

    let client = ApiClient::new(
        endpoint,
        ApiClientOptions {
            name: Some("demo-client".to_string()),
            max_concurrency: Some(4),
            queue_capacity: 64,
            limit_interval: Duration::from_secs(60),
            request_limit: Some(10),
            token_limit: Some(5_000),
        },
    )
    .await
    .expect("endpoint scope enters cleanly");

    for i in 1..=5 {
        let event = client
            .invoke(
                serde_json::json!({"model": "gpt-4", "messages": [{"role": "user", "content": format!("request {i}")}]}),
                InvokeOptions {
                    cache_control: i % 2 == 0,
                    required_tokens: Some(120),
                    ..Default::default()
                },
            )
            .await;

        match event {
            Ok(event) => println!(
                "call {i}: status={:?} duration={:?}",
                event.status(),
                event.duration()
            ),
            Err(err) => println!("call {i}: facade error: {err}"),
        }
    }

    client.shutdown().await;
}

async fn standalone_demo() {
    #[derive(Debug)]
    struct FlakyError;

    impl std::fmt::Display for FlakyError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky upstream error")
        }
    }

    let breaker = CircuitBreaker::new(2, Duration::from_millis(200)).with_name("standalone-demo");
    let retry: Retry<FlakyError> = Retry::with_defaults()
        .with_name("standalone-demo");

    let attempt = std::sync::atomic::AtomicUsize::new(0);
    let result = breaker
        .execute(|| {
            retry.execute(|| {
                let attempt = &attempt;
                async move {
                    let n = attempt.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                    if n < 2 {
                        Err(FlakyError)
                    } else {
                        Ok(n)
                    }
                }
            })
        })
        .await;

    println!("standalone composition result: {result:?}");
}
