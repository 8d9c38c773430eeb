//! Fixed-window, per-client rate limiting.
//!
//! Each `(client, route class)` pair owns a bucket holding a signed counter
//! and the instant its window closes. Admission is a single atomic
//! decrement; a bucket is swapped for a fresh one (never reset in place) once
//! its window has passed. The map is sharded, so contention is limited to
//! clients that hash to the same shard.
//!
//! The number of per-client buckets is capped. When the cap is reached and a
//! sweep (run at most once per window) frees nothing, unseen clients share
//! one overflow bucket per route class, so rotating client keys can neither
//! grow the map nor make every request pay for a full scan.
//!
//! Fixed windows allow a burst of up to twice the quota across a window
//! boundary. That is accepted in exchange for O(1) state per key.

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::clock::{duration_millis, Clock};

/// Length of every rate-limit window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Default cap on per-client buckets.
pub const DEFAULT_MAX_BUCKETS: usize = 100_000;

/// Requests under this prefix count against the authentication quota.
pub const AUTH_ROUTE_PREFIX: &str = "/api/auth";

/// Coarse endpoint category, each with its own quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Auth,
    General,
}

impl RouteClass {
    /// Classifies a request path. Only whole path segments match, so
    /// `/api/authors` is `General`.
    pub fn classify(path: &str) -> Self {
        match path.strip_prefix(AUTH_ROUTE_PREFIX) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => RouteClass::Auth,
            _ => RouteClass::General,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::Auth => "auth",
            RouteClass::General => "general",
        }
    }
}

/// Requests allowed per window, by route class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quotas {
    pub auth: u32,
    pub general: u32,
}

impl Quotas {
    pub fn for_class(&self, class: RouteClass) -> u32 {
        match class {
            RouteClass::Auth => self.auth,
            RouteClass::General => self.general,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Rejected; the current window closes after `retry_after`.
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

#[derive(Debug)]
struct Bucket {
    /// Goes negative once exhausted; never clamped.
    remaining: AtomicI64,
    expires_at: u64,
}

impl Bucket {
    fn fresh(quota: u32, now: u64, window: Duration) -> Self {
        Self {
            remaining: AtomicI64::new(i64::from(quota)),
            expires_at: now.saturating_add(duration_millis(window)),
        }
    }

    fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    fn try_consume(&self) -> bool {
        self.remaining.fetch_sub(1, Ordering::AcqRel) > 0
    }
}

type BucketKey = (String, RouteClass);

/// Concurrent fixed-window limiter keyed by client and route class.
///
/// At most `max_buckets` per-client buckets exist at once. Once that many
/// are live, clients without a bucket share one overflow bucket per route
/// class until a sweep frees room.
pub struct RateLimiter {
    buckets: DashMap<BucketKey, Arc<Bucket>>,
    /// Buckets reserved in `buckets`; only changed under an entry lock or
    /// by a sweep.
    reserved: AtomicUsize,
    overflow: DashMap<RouteClass, Arc<Bucket>>,
    /// When the last capacity-driven sweep ran, in clock millis.
    last_sweep: AtomicU64,
    quotas: Quotas,
    window: Duration,
    max_buckets: usize,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(quotas: Quotas, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            reserved: AtomicUsize::new(0),
            overflow: DashMap::new(),
            last_sweep: AtomicU64::new(0),
            quotas,
            window: WINDOW,
            max_buckets: DEFAULT_MAX_BUCKETS,
            clock,
        }
    }

    /// Sets the maximum number of per-client buckets.
    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets.max(1);
        self
    }

    pub fn quotas(&self) -> Quotas {
        self.quotas
    }

    /// Decides whether one more request from `client_key` in `class` fits
    /// in the current window.
    pub fn admit(&self, client_key: &str, class: RouteClass) -> Admission {
        let now = self.clock.now_millis();
        let bucket = self.current_bucket(client_key, class, now);

        if bucket.try_consume() {
            Admission::Allowed
        } else {
            Admission::Denied {
                retry_after: Duration::from_millis(bucket.expires_at.saturating_sub(now)),
            }
        }
    }

    /// Returns the live bucket for the key, installing a fresh one if none
    /// exists or the existing one has expired.
    fn current_bucket(&self, client_key: &str, class: RouteClass, now: u64) -> Arc<Bucket> {
        let key = (client_key.to_owned(), class);

        if let Some(bucket) = self.buckets.get(&key) {
            if !bucket.is_expired(now) {
                return Arc::clone(&bucket);
            }
        }

        if self.reserved.load(Ordering::Acquire) >= self.max_buckets {
            self.sweep_if_due(now);
        }

        let quota = self.quotas.for_class(class);
        let window = self.window;

        // The entry guard holds the shard write lock, so exactly one caller
        // installs the replacement and the rest observe it.
        match self.buckets.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(now) {
                    entry.insert(Arc::new(Bucket::fresh(quota, now, window)));
                }
                Arc::clone(entry.get())
            }
            Entry::Vacant(slot) => {
                if self.try_reserve() {
                    Arc::clone(slot.insert(Arc::new(Bucket::fresh(quota, now, window))).value())
                } else {
                    drop(slot);
                    tracing::debug!(class = class.as_str(), "bucket cap reached; using overflow bucket");
                    self.overflow_bucket(class, quota, now)
                }
            }
        }
    }

    fn try_reserve(&self) -> bool {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_buckets).then_some(n + 1)
            })
            .is_ok()
    }

    fn overflow_bucket(&self, class: RouteClass, quota: u32, now: u64) -> Arc<Bucket> {
        let mut entry = self
            .overflow
            .entry(class)
            .or_insert_with(|| Arc::new(Bucket::fresh(quota, now, self.window)));
        if entry.is_expired(now) {
            *entry = Arc::new(Bucket::fresh(quota, now, self.window));
        }
        Arc::clone(&entry)
    }

    /// Runs a capacity-driven sweep at most once per window, so a flood of
    /// new clients cannot turn every miss into a full scan.
    fn sweep_if_due(&self, now: u64) {
        let last = self.last_sweep.load(Ordering::Acquire);
        if now.saturating_sub(last) < duration_millis(self.window) {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.sweep_expired();
        }
    }

    /// Drops every bucket whose window has closed. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut removed = 0usize;
        self.buckets.retain(|_, bucket| {
            let keep = !bucket.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            self.reserved.fetch_sub(removed, Ordering::AcqRel);
            tracing::debug!(removed, remaining = self.buckets.len(), "swept expired rate-limit buckets");
        }
        removed
    }

    /// Number of per-client buckets currently held.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("quotas", &self.quotas)
            .field("window", &self.window)
            .field("buckets", &self.buckets.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const START: u64 = 1_700_000_000_000;

    fn limiter(auth: u32, general: u32) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let limiter = RateLimiter::new(Quotas { auth, general }, clock.clone());
        (limiter, clock)
    }

    #[test]
    fn quota_plus_one_is_denied() {
        let (limiter, _) = limiter(5, 100);
        for _ in 0..5 {
            assert!(limiter.admit("10.0.0.1", RouteClass::Auth).is_allowed());
        }
        assert!(!limiter.admit("10.0.0.1", RouteClass::Auth).is_allowed());
    }

    #[test]
    fn denial_reports_time_left_in_window() {
        let (limiter, clock) = limiter(1, 100);
        assert!(limiter.admit("c", RouteClass::Auth).is_allowed());

        clock.advance(Duration::from_secs(15));
        assert_eq!(
            limiter.admit("c", RouteClass::Auth),
            Admission::Denied {
                retry_after: Duration::from_secs(45)
            }
        );
    }

    #[test]
    fn window_rollover_restores_full_quota() {
        let (limiter, clock) = limiter(3, 100);
        for _ in 0..3 {
            assert!(limiter.admit("c", RouteClass::Auth).is_allowed());
        }
        // Drive the counter well below zero.
        for _ in 0..50 {
            assert!(!limiter.admit("c", RouteClass::Auth).is_allowed());
        }

        clock.advance(WINDOW);
        for _ in 0..3 {
            assert!(limiter.admit("c", RouteClass::Auth).is_allowed());
        }
        assert!(!limiter.admit("c", RouteClass::Auth).is_allowed());
    }

    #[test]
    fn still_denied_just_before_window_closes() {
        let (limiter, clock) = limiter(1, 100);
        assert!(limiter.admit("c", RouteClass::Auth).is_allowed());
        clock.advance(WINDOW - Duration::from_millis(1));
        assert!(!limiter.admit("c", RouteClass::Auth).is_allowed());
    }

    #[test]
    fn clients_do_not_interfere() {
        let (limiter, _) = limiter(2, 100);
        for _ in 0..10 {
            limiter.admit("attacker", RouteClass::Auth);
        }
        assert!(limiter.admit("victim", RouteClass::Auth).is_allowed());
    }

    #[test]
    fn route_classes_do_not_interfere() {
        let (limiter, _) = limiter(1, 1);
        assert!(limiter.admit("c", RouteClass::Auth).is_allowed());
        assert!(!limiter.admit("c", RouteClass::Auth).is_allowed());
        assert!(limiter.admit("c", RouteClass::General).is_allowed());
    }

    #[test]
    fn zero_quota_denies_everything() {
        let (limiter, _) = limiter(0, 0);
        assert!(!limiter.admit("c", RouteClass::General).is_allowed());
    }

    #[test]
    fn concurrent_callers_never_exceed_quota() {
        let (limiter, _) = limiter(5, 50);
        let allowed = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for _ in 0..100 {
                        if limiter.admit("shared", RouteClass::General).is_allowed() {
                            allowed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(allowed.load(Ordering::Relaxed), 50);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn concurrent_rollover_installs_one_bucket() {
        let (limiter, clock) = limiter(5, 20);
        for _ in 0..40 {
            limiter.admit("shared", RouteClass::General);
        }
        clock.advance(WINDOW + Duration::from_secs(1));

        let allowed = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..10 {
                        if limiter.admit("shared", RouteClass::General).is_allowed() {
                            allowed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(allowed.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn sweep_drops_only_expired_buckets() {
        let (limiter, clock) = limiter(5, 5);
        limiter.admit("old", RouteClass::General);
        clock.advance(Duration::from_secs(30));
        limiter.admit("new", RouteClass::General);
        clock.advance(Duration::from_secs(30));

        assert_eq!(limiter.sweep_expired(), 1);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn cap_triggers_inline_sweep() {
        let (limiter, clock) = limiter(5, 5);
        let limiter = limiter.with_max_buckets(3);
        for client in ["a", "b", "c"] {
            limiter.admit(client, RouteClass::General);
        }
        clock.advance(WINDOW);

        limiter.admit("d", RouteClass::General);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn cap_holds_with_every_bucket_live() {
        let (limiter, _) = limiter(5, 5);
        let limiter = limiter.with_max_buckets(3);
        for i in 0..10 {
            limiter.admit(&format!("client-{i}"), RouteClass::General);
            assert!(limiter.bucket_count() <= 3);
        }
        assert_eq!(limiter.bucket_count(), 3);
    }

    #[test]
    fn clients_past_the_cap_share_an_overflow_quota() {
        let (limiter, _) = limiter(5, 2);
        let limiter = limiter.with_max_buckets(1);
        assert!(limiter.admit("known", RouteClass::General).is_allowed());

        assert!(limiter.admit("x", RouteClass::General).is_allowed());
        assert!(limiter.admit("y", RouteClass::General).is_allowed());
        assert!(!limiter.admit("z", RouteClass::General).is_allowed());

        // The client that got a bucket keeps its own quota.
        assert!(limiter.admit("known", RouteClass::General).is_allowed());
        // Overflow is per route class.
        assert!(limiter.admit("z", RouteClass::Auth).is_allowed());
    }

    #[test]
    fn capacity_sweep_runs_at_most_once_per_window() {
        let (limiter, clock) = limiter(5, 5);
        let limiter = limiter.with_max_buckets(3);
        for client in ["a", "b", "c"] {
            limiter.admit(client, RouteClass::General);
        }

        // Cap reached with live buckets: this sweep frees nothing.
        clock.advance(Duration::from_secs(30));
        limiter.admit("d", RouteClass::General);
        assert_eq!(limiter.bucket_count(), 3);

        // a, b and c have expired, but the last sweep was too recent.
        clock.advance(Duration::from_secs(30));
        limiter.admit("e", RouteClass::General);
        assert_eq!(limiter.bucket_count(), 3);

        clock.advance(Duration::from_secs(30));
        limiter.admit("f", RouteClass::General);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn periodic_sweep_frees_room_for_new_clients() {
        let (limiter, clock) = limiter(5, 1);
        let limiter = limiter.with_max_buckets(2);
        limiter.admit("a", RouteClass::General);
        limiter.admit("b", RouteClass::General);
        clock.advance(WINDOW);

        assert_eq!(limiter.sweep_expired(), 2);
        assert!(limiter.admit("c", RouteClass::General).is_allowed());
        assert!(!limiter.admit("c", RouteClass::General).is_allowed());
        assert!(limiter.admit("d", RouteClass::General).is_allowed());
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[test]
    fn concurrent_new_clients_respect_cap() {
        let (limiter, _) = limiter(5, 5);
        let limiter = limiter.with_max_buckets(64);

        std::thread::scope(|s| {
            for t in 0..8 {
                let limiter = &limiter;
                s.spawn(move || {
                    for i in 0..100 {
                        limiter.admit(&format!("{t}-{i}"), RouteClass::General);
                    }
                });
            }
        });

        assert_eq!(limiter.bucket_count(), 64);
    }

    #[test]
    fn classify_auth_prefix() {
        assert_eq!(RouteClass::classify("/api/auth/login"), RouteClass::Auth);
        assert_eq!(RouteClass::classify("/api/auth"), RouteClass::Auth);
        assert_eq!(RouteClass::classify("/api/authors"), RouteClass::General);
        assert_eq!(RouteClass::classify("/api/applications"), RouteClass::General);
        assert_eq!(RouteClass::classify("/health"), RouteClass::General);
    }

    #[test]
    fn quotas_by_class() {
        let quotas = Quotas { auth: 5, general: 100 };
        assert_eq!(quotas.for_class(RouteClass::Auth), 5);
        assert_eq!(quotas.for_class(RouteClass::General), 100);
        assert_eq!(RouteClass::Auth.as_str(), "auth");
    }
}
