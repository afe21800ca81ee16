//! A continuous-refill token bucket rate limiter.
//!
//! Unlike a fixed-window limiter, tokens accumulate continuously between
//! calls: `tokens = min(max_tokens, tokens + elapsed * rate / period)`.
//! [`TokenBucket::acquire`] never sleeps — it reports the wait a caller
//! would need — and [`TokenBucket::execute`] does the acquire-then-sleep
//! dance around an arbitrary future.
//!
//! # Example
//!
//! ```
//! use relay_ratelimiter::TokenBucket;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let bucket = TokenBucket::new(10.0, Duration::from_secs(1), None);
//! let wait = bucket.acquire(1.0).await;
//! assert_eq!(wait, Duration::ZERO);
//! # }
//! ```

mod bucket;
mod events;

pub use bucket::TokenBucket;
pub use events::RateLimiterEvent;
