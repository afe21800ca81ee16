//! Token bucket demo.
//!
//! Run with: cargo run --example ratelimiter_example -p relay-ratelimiter

use relay_ratelimiter::TokenBucket;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let bucket = TokenBucket::new(5.0, Duration::from_secs(1), None).with_name("demo");

    println!("Sending 8 requests against a 5-per-second bucket...");
    for i in 1..=8 {
        let wait = bucket.acquire(1.0).await;
        if wait > Duration::ZERO {
            println!("request {i}: would need to wait {wait:?}, sleeping");
            tokio::time::sleep(wait).await;
        } else {
            println!("request {i}: granted immediately");
        }
    }
}
