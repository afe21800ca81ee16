//! Exponential backoff with optional jitter.

use std::time::Duration;

/// Computes the delay to sleep before a given retry attempt.
///
/// `attempt` is zero-based (the first retry is attempt `0`). The delay
/// grows as `base_delay * backoff_factor.powi(attempt)`, capped at
/// `max_delay`. When `jitter` is set, the capped delay is scaled by a
/// uniform random factor in `[0.8, 1.2]` *before* the cap is applied,
/// matching the reference behavior where jitter can occasionally push a
/// delay back under the cap rather than always being clamped after.
pub fn compute_delay(
    attempt: u32,
    base_delay: Duration,
    backoff_factor: f64,
    max_delay: Duration,
    jitter: bool,
) -> Duration {
    let raw = base_delay.as_secs_f64() * backoff_factor.powi(attempt as i32);
    let delay = if jitter {
        let factor = rand::Rng::gen_range(&mut rand::thread_rng(), 0.8..=1.2);
        raw * factor
    } else {
        raw
    };
    Duration::from_secs_f64(delay.min(max_delay.as_secs_f64()).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_without_jitter() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(60);
        assert_eq!(compute_delay(0, base, 2.0, max, false), Duration::from_millis(100));
        assert_eq!(compute_delay(1, base, 2.0, max, false), Duration::from_millis(200));
        assert_eq!(compute_delay(2, base, 2.0, max, false), Duration::from_millis(400));
        assert_eq!(compute_delay(3, base, 2.0, max, false), Duration::from_millis(800));
    }

    #[test]
    fn respects_max_delay() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(500);
        assert_eq!(compute_delay(10, base, 2.0, max, false), max);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(60);
        for attempt in 0..5 {
            let d = compute_delay(attempt, base, 2.0, max, true);
            let raw = base.as_secs_f64() * 2f64.powi(attempt as i32);
            assert!(d.as_secs_f64() >= raw * 0.8 - 1e-9);
            assert!(d.as_secs_f64() <= raw * 1.2 + 1e-9);
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Without jitter the delay is exactly the geometric series, capped
        // at max_delay — no randomness to bound, so this checks the exact
        // value rather than a range.
        #[test]
        fn no_jitter_matches_geometric_series_capped(
            attempt in 0u32..12,
            base_ms in 1u64..2_000,
            factor in 1.0f64..4.0,
            max_ms in 1u64..120_000,
        ) {
            let base = Duration::from_millis(base_ms);
            let max = Duration::from_millis(max_ms);
            let raw = base.as_secs_f64() * factor.powi(attempt as i32);
            let expected = Duration::from_secs_f64(raw.min(max.as_secs_f64()).max(0.0));

            let got = compute_delay(attempt, base, factor, max, false);
            prop_assert!((got.as_secs_f64() - expected.as_secs_f64()).abs() < 1e-9);
            prop_assert!(got <= max);
        }

        // With jitter the delay is scaled by a factor in [0.8, 1.2] before
        // the cap is applied, so the result is bounded by the jittered
        // range but never exceeds max_delay and never goes negative.
        #[test]
        fn jitter_bounded_and_capped(
            attempt in 0u32..12,
            base_ms in 1u64..2_000,
            factor in 1.0f64..4.0,
            max_ms in 1u64..120_000,
        ) {
            let base = Duration::from_millis(base_ms);
            let max = Duration::from_millis(max_ms);
            let raw = base.as_secs_f64() * factor.powi(attempt as i32);

            let got = compute_delay(attempt, base, factor, max, true).as_secs_f64();
            prop_assert!(got >= 0.0);
            prop_assert!(got >= (raw * 0.8).min(max.as_secs_f64()) - 1e-9);
            prop_assert!(got <= (raw * 1.2).min(max.as_secs_f64()) + 1e-9);
            prop_assert!(got <= max.as_secs_f64() + 1e-9);
        }
    }
}
