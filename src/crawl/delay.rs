//! Delay policy evaluation
//!
//! The policy is evaluated between every two network fetches, archive or
//! detail, drawing a fresh value each time. The first fetch of a category
//! is never delayed.

use crate::config::DelayPolicy;
use rand::Rng;
use std::time::Duration;

pub struct Throttle {
    policy: DelayPolicy,
    primed: bool,
}

impl Throttle {
    pub fn new(policy: DelayPolicy) -> Self {
        Self {
            policy,
            primed: false,
        }
    }

    /// Sleeps per the policy; instant on the first call.
    pub async fn pause(&mut self) {
        if !self.primed {
            self.primed = true;
            return;
        }
        let secs = sample(self.policy);
        if secs > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        }
    }
}

fn sample(policy: DelayPolicy) -> f64 {
    match policy {
        DelayPolicy::Fixed(secs) => secs.max(0.0),
        DelayPolicy::Range(min, max) => {
            if max > min {
                rand::thread_rng().gen_range(min..=max)
            } else {
                min.max(0.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_samples_exactly() {
        assert_eq!(sample(DelayPolicy::Fixed(1.5)), 1.5);
        assert_eq!(sample(DelayPolicy::Fixed(0.0)), 0.0);
    }

    #[test]
    fn range_policy_samples_within_bounds() {
        for _ in 0..50 {
            let secs = sample(DelayPolicy::Range(0.5, 1.5));
            assert!((0.5..=1.5).contains(&secs));
        }
    }

    #[test]
    fn degenerate_range_is_its_lower_bound() {
        assert_eq!(sample(DelayPolicy::Range(2.0, 2.0)), 2.0);
    }

    #[tokio::test]
    async fn first_pause_is_instant() {
        let mut throttle = Throttle::new(DelayPolicy::Fixed(30.0));
        let start = std::time::Instant::now();
        throttle.pause().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
