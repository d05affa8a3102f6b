use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

/// Key of the bucket shared by every action.
pub const GLOBAL_BUCKET: &str = "global";

/// Bucket key for one action type.
pub fn action_bucket(action: &str) -> String {
    format!("action:{action}")
}

/// Capacity and refill interval of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSpec {
    /// Tokens available per interval.
    pub capacity: u32,
    pub interval: Duration,
}

impl BucketSpec {
    fn nanos_per_token(&self) -> u128 {
        self.interval.as_nanos().max(1)
    }

    fn full_units(&self) -> u128 {
        u128::from(self.capacity) * self.nanos_per_token()
    }
}

/// Token bucket with exact integer refill.
///
/// One token is `interval` nanoseconds worth of units; every elapsed
/// nanosecond adds `capacity` units. A drained bucket is full again exactly
/// one interval later.
#[derive(Debug)]
struct TokenBucket {
    spec: BucketSpec,
    units: u128,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(spec: BucketSpec, now: Instant) -> Self {
        Self {
            spec,
            units: spec.full_units(),
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_nanos();
        if elapsed == 0 {
            return;
        }
        let added = elapsed.saturating_mul(u128::from(self.spec.capacity));
        self.units = self
            .units
            .saturating_add(added)
            .min(self.spec.full_units());
        self.last_refill = now;
    }

    /// Switch to a new capacity, keeping the tokens already earned.
    fn respec(&mut self, spec: BucketSpec, now: Instant) {
        self.refill(now);
        self.spec = spec;
        self.units = self.units.min(spec.full_units());
    }

    fn has_token(&self) -> bool {
        self.units >= self.spec.nanos_per_token()
    }

    fn take(&mut self) {
        self.units -= self.spec.nanos_per_token();
    }

    fn tokens(&self) -> u32 {
        u32::try_from(self.units / self.spec.nanos_per_token()).unwrap_or(u32::MAX)
    }
}

/// Global and per-action token buckets.
///
/// Buckets are created full on first use. A request must find a token in
/// both the global bucket and its action's bucket; tokens are spent from
/// both or from neither.
#[derive(Debug)]
pub struct RateLimiter {
    default_spec: BucketSpec,
    overrides: RwLock<HashMap<String, BucketSpec>>,
    buckets: DashMap<String, Arc<Mutex<TokenBucket>>>,
}

impl RateLimiter {
    pub fn new(capacity: u32, interval: Duration) -> Self {
        Self {
            default_spec: BucketSpec { capacity, interval },
            overrides: RwLock::new(HashMap::new()),
            buckets: DashMap::new(),
        }
    }

    /// Give one action's bucket its own capacity (same interval).
    #[must_use]
    pub fn with_action_capacity(self, action: &str, capacity: u32) -> Self {
        let spec = self.action_spec(capacity);
        self.overrides.write().insert(action_bucket(action), spec);
        self
    }

    fn action_spec(&self, capacity: u32) -> BucketSpec {
        BucketSpec {
            capacity,
            interval: self.default_spec.interval,
        }
    }

    fn spec_for(&self, key: &str) -> BucketSpec {
        self.overrides
            .read()
            .get(key)
            .copied()
            .unwrap_or(self.default_spec)
    }

    /// Replace every per-action capacity. Actions left out fall back to the
    /// global capacity. Live buckets keep their tokens, capped at the new
    /// capacity. Returns the number of live buckets whose capacity changed.
    pub fn set_action_capacities<'a>(
        &self,
        capacities: impl IntoIterator<Item = (&'a str, u32)>,
    ) -> usize {
        let next: HashMap<String, BucketSpec> = capacities
            .into_iter()
            .map(|(action, capacity)| (action_bucket(action), self.action_spec(capacity)))
            .collect();
        *self.overrides.write() = next;

        let now = Instant::now();
        let mut changed = 0;
        for entry in &self.buckets {
            if entry.key() == GLOBAL_BUCKET {
                continue;
            }
            let spec = self.spec_for(entry.key());
            let mut bucket = entry.value().lock();
            if bucket.spec != spec {
                bucket.respec(spec, now);
                changed += 1;
            }
        }
        changed
    }

    pub fn spec(&self) -> BucketSpec {
        self.default_spec
    }

    fn bucket(&self, key: &str, now: Instant) -> Arc<Mutex<TokenBucket>> {
        if let Some(existing) = self.buckets.get(key) {
            return Arc::clone(existing.value());
        }
        let spec = self.spec_for(key);
        Arc::clone(
            self.buckets
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(spec, now))))
                .value(),
        )
    }

    /// Spend one token from `key` if one is available.
    pub fn try_consume(&self, key: &str, now: Instant) -> bool {
        let bucket = self.bucket(key, now);
        let mut bucket = bucket.lock();
        bucket.refill(now);
        if bucket.has_token() {
            bucket.take();
            true
        } else {
            false
        }
    }

    /// Spend one token from the global bucket and one from the action's
    /// bucket, or none at all. Locks are taken global first.
    pub fn try_admit_action(&self, action: &str, now: Instant) -> bool {
        let global = self.bucket(GLOBAL_BUCKET, now);
        let per_action = self.bucket(&action_bucket(action), now);

        let mut global = global.lock();
        let mut per_action = per_action.lock();
        global.refill(now);
        per_action.refill(now);

        if global.has_token() && per_action.has_token() {
            global.take();
            per_action.take();
            true
        } else {
            false
        }
    }

    /// Whether [`try_admit_action`](Self::try_admit_action) would succeed,
    /// without spending tokens or creating buckets.
    pub fn peek_action(&self, action: &str, now: Instant) -> bool {
        self.available(GLOBAL_BUCKET, now) >= 1 && self.available(&action_bucket(action), now) >= 1
    }

    /// Whole tokens currently available in `key`.
    pub fn available(&self, key: &str, now: Instant) -> u32 {
        match self.buckets.get(key) {
            Some(bucket) => {
                let mut bucket = bucket.lock();
                bucket.refill(now);
                bucket.tokens()
            }
            None => self.spec_for(key).capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_capacity_per_interval() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.try_consume("k", now));
        }
        assert!(!limiter.try_consume("k", now));
        assert_eq!(limiter.available("k", now), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refills_at_exact_rate() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.try_consume("k", start));
        }
        // One token every 20 seconds.
        assert!(!limiter.try_consume("k", start + Duration::from_millis(19_999)));
        assert!(limiter.try_consume("k", start + Duration::from_secs(20)));
        let drained = start + Duration::from_secs(20);
        assert!(!limiter.try_consume("k", drained));

        // Full again exactly one interval after the last drain.
        let full = drained + Duration::from_secs(60);
        assert_eq!(limiter.available("k", full - Duration::from_nanos(1)), 2);
        assert_eq!(limiter.available("k", full), 3);
        // Never above capacity.
        assert_eq!(limiter.available("k", full + Duration::from_secs(600)), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn global_and_action_are_spent_together() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60)).with_action_capacity("restart_pod", 1);
        let now = Instant::now();

        assert!(limiter.try_admit_action("restart_pod", now));
        // Action bucket empty: the global token must not be spent.
        assert!(!limiter.try_admit_action("restart_pod", now));
        assert_eq!(limiter.available(GLOBAL_BUCKET, now), 1);

        assert!(limiter.try_admit_action("scale_up_deployment", now));
        // Global bucket empty now.
        assert!(!limiter.try_admit_action("rollback_deployment", now));
        assert_eq!(limiter.available(&action_bucket("rollback_deployment"), now), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn new_capacities_apply_to_live_buckets() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60)).with_action_capacity("restart_pod", 4);
        let now = Instant::now();
        assert!(limiter.try_consume(&action_bucket("restart_pod"), now));
        assert!(limiter.try_consume(&action_bucket("scale_up_deployment"), now));

        let changed = limiter.set_action_capacities([("scale_up_deployment", 2)]);
        assert_eq!(changed, 2);
        // restart_pod falls back to the global capacity and keeps its 3 tokens.
        assert_eq!(limiter.available(&action_bucket("restart_pod"), now), 3);
        // scale_up_deployment had 4 left, capped at the new capacity.
        assert_eq!(limiter.available(&action_bucket("scale_up_deployment"), now), 2);
        assert_eq!(limiter.available(&action_bucket("rollback_deployment"), now), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn peek_does_not_spend() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.peek_action("a", now));
        assert!(limiter.peek_action("a", now));
        assert!(limiter.try_admit_action("a", now));
        assert!(!limiter.peek_action("a", now));
    }
}
