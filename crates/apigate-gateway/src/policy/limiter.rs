//! Rolling-window flow quotas with duplicate suppression.
//!
//! State is sharded by (user, client, action) in a `DashMap`. The admit path
//! holds the entry's shard lock across check and record, so two concurrent
//! calls for the same key can never both slip under the cap.
//!
//! State lives in process memory; several gateway instances each enforce
//! their own quotas.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use apigate_core::{ActionName, Decision, DenyReason};
use dashmap::DashMap;

use crate::config::schema::QuotaScope;

/// Length of the rolling window for the daily cap.
pub const DAILY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Wall clock source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut g) = self.now.lock() {
            *g += by;
        }
    }

    /// Move the clock backwards (simulates skew).
    pub fn rewind(&self, by: Duration) {
        if let Ok(mut g) = self.now.lock() {
            *g = g.checked_sub(by).unwrap_or(SystemTime::UNIX_EPOCH);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        self.now.lock().map(|g| *g).unwrap_or(SystemTime::UNIX_EPOCH)
    }
}

/// Identity of a rate-limited invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub user: String,
    pub client_id: String,
    pub action: ActionName,
    pub argument_fingerprint: String,
}

/// Limits applied to one admit call. Zero values mean "unlimited".
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotaLimits {
    pub max_daily: u32,
    pub min_interval: Duration,
    pub scope: QuotaScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    user: String,
    client_id: String,
    action: ActionName,
}

#[derive(Debug)]
struct Entry {
    at: SystemTime,
    fingerprint: String,
}

/// Recorded invocations for one (user, client, action), in record order.
#[derive(Debug, Default)]
struct Bucket {
    entries: VecDeque<Entry>,
}

impl Bucket {
    fn prune(&mut self, now: SystemTime) {
        self.entries.retain(|e| elapsed(now, e.at) <= DAILY_WINDOW);
    }

    fn daily_count(&self, fingerprint: Option<&str>) -> usize {
        self.entries
            .iter()
            .filter(|e| fingerprint.map_or(true, |f| e.fingerprint == f))
            .count()
    }

    fn last_with(&self, fingerprint: &str) -> Option<SystemTime> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.fingerprint == fingerprint)
            .map(|e| e.at)
    }
}

/// `now - then`, clamped to zero when the clock went backwards.
fn elapsed(now: SystemTime, then: SystemTime) -> Duration {
    match now.duration_since(then) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(
                skew_ms = e.duration().as_millis() as u64,
                "clock skew in rate limiter state; clamping to zero"
            );
            Duration::ZERO
        }
    }
}

pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    buckets: DashMap<BucketKey, Bucket>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            buckets: DashMap::new(),
        }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Check both constraints against the injected clock and record on success.
    pub fn admit_and_record(&self, key: &RateLimitKey, limits: QuotaLimits) -> Decision {
        self.admit_and_record_at(key, self.clock.now(), limits)
    }

    pub fn admit_and_record_at(
        &self,
        key: &RateLimitKey,
        now: SystemTime,
        limits: QuotaLimits,
    ) -> Decision {
        let bucket_key = BucketKey {
            user: key.user.clone(),
            client_id: key.client_id.clone(),
            action: key.action,
        };

        // Shard write lock held until `bucket` drops: check + record is atomic.
        let mut bucket = self.buckets.entry(bucket_key).or_default();
        bucket.prune(now);

        if limits.max_daily > 0 {
            let scoped = match limits.scope {
                QuotaScope::PerArguments => Some(key.argument_fingerprint.as_str()),
                QuotaScope::PerAction => None,
            };
            if bucket.daily_count(scoped) >= limits.max_daily as usize {
                tracing::info!(
                    user = %key.user,
                    client = %key.client_id,
                    action = %key.action,
                    max_daily = limits.max_daily,
                    "daily flow quota exceeded"
                );
                return Decision::Deny(DenyReason::DailyQuotaExceeded);
            }
        }

        if !limits.min_interval.is_zero() {
            if let Some(last) = bucket.last_with(&key.argument_fingerprint) {
                if elapsed(now, last) < limits.min_interval {
                    tracing::info!(
                        user = %key.user,
                        client = %key.client_id,
                        action = %key.action,
                        "duplicate flow requested too soon"
                    );
                    return Decision::Deny(DenyReason::DuplicateTooSoon);
                }
            }
        }

        bucket.entries.push_back(Entry {
            at: now,
            fingerprint: key.argument_fingerprint.clone(),
        });
        Decision::Allow
    }

    /// Drop entries older than the daily window and empty buckets.
    /// Returns the number of buckets removed.
    pub fn prune(&self) -> usize {
        let now = self.clock.now();
        let before = self.buckets.len();
        self.buckets.retain(|_, b| {
            b.prune(now);
            !b.entries.is_empty()
        });
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.buckets.len(), "rate limiter state pruned");
        }
        removed
    }

    /// Number of tracked (user, client, action) buckets.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}
