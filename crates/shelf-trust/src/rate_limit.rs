//! Per-key fixed-window request counter.
//!
//! Each [`RateKey`] owns one window. The first call opens it with a count of
//! one; calls inside the window increment until `max_requests`; after that
//! callers are refused with the window's unchanged `reset_at`. A client can
//! therefore burst up to twice the limit across a window boundary. That is
//! the admission contract clients observe, and it is kept.
//!
//! The counter map is an explicit value owned by whoever builds the pipeline.
//! Entries are evicted by [`RateLimiter::spawn_sweeper`] once their window has
//! passed.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use shelf_core::admission::{RateDecision, RateKey, RateLimitPolicy};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::jobs::Shutdown;

/// Counter state for one key. Only mutated through [`RateLimiter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindowState {
  pub count:           u32,
  pub window_reset_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
  windows: DashMap<RateKey, RateWindowState>,
}

impl RateLimiter {
  pub fn new() -> Self { Self::default() }

  /// Admit or refuse one request for `key` at the current time.
  pub fn admit(&self, key: &RateKey, max_requests: u32, window_seconds: u32) -> RateDecision {
    self.admit_at(key, max_requests, window_seconds, Utc::now())
  }

  /// Admit using the limits of `policy` for `client_identity`.
  pub fn admit_policy(&self, policy: &RateLimitPolicy, client_identity: &str) -> RateDecision {
    let key = RateKey::new(policy.scope.as_str(), client_identity);
    self.admit(&key, policy.max_requests, policy.window_seconds)
  }

  /// [`admit`](Self::admit) with an explicit clock. Zero limits are treated
  /// as one.
  ///
  /// The read-check-write runs under the entry's shard lock, so two
  /// concurrent callers for one key can never both take the last slot.
  pub fn admit_at(
    &self,
    key: &RateKey,
    max_requests: u32,
    window_seconds: u32,
    now: DateTime<Utc>,
  ) -> RateDecision {
    let max_requests = max_requests.max(1);
    let fresh = RateWindowState {
      count:           1,
      window_reset_at: now + TimeDelta::seconds(i64::from(window_seconds.max(1))),
    };

    match self.windows.entry(key.clone()) {
      Entry::Vacant(slot) => {
        slot.insert(fresh);
        RateDecision { admitted: true, reset_at: fresh.window_reset_at }
      }
      Entry::Occupied(mut slot) => {
        let state = slot.get_mut();
        if now >= state.window_reset_at {
          *state = fresh;
          RateDecision { admitted: true, reset_at: fresh.window_reset_at }
        } else if state.count < max_requests {
          state.count += 1;
          RateDecision { admitted: true, reset_at: state.window_reset_at }
        } else {
          RateDecision { admitted: false, reset_at: state.window_reset_at }
        }
      }
    }
  }

  /// Current state for `key`, if any.
  pub fn window(&self, key: &RateKey) -> Option<RateWindowState> {
    self.windows.get(key).map(|s| *s)
  }

  /// Evict every window that closed before `now`. Returns how many were
  /// removed.
  ///
  /// `retain` takes each shard's write lock, the same lock `admit_at` holds
  /// while it decides, so an entry being admitted is never evicted under it.
  pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
    let mut evicted = 0;
    self.windows.retain(|_, state| {
      let keep = now <= state.window_reset_at;
      if !keep {
        evicted += 1;
      }
      keep
    });
    evicted
  }

  pub fn len(&self) -> usize { self.windows.len() }

  pub fn is_empty(&self) -> bool { self.windows.is_empty() }

  /// Run [`sweep_at`](Self::sweep_at) every `every` until `shutdown` fires.
  pub fn spawn_sweeper(self: &Arc<Self>, every: Duration, mut shutdown: Shutdown) -> JoinHandle<()> {
    let limiter = Arc::clone(self);
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        tokio::select! {
          _ = shutdown.wait() => break,
          _ = ticker.tick() => {
            let evicted = limiter.sweep_at(Utc::now());
            if evicted > 0 {
              tracing::debug!(evicted, remaining = limiter.len(), "rate-limit sweep");
            }
          }
        }
      }
      tracing::debug!("rate-limit sweeper stopped");
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jobs::shutdown_channel;

  fn key() -> RateKey { RateKey::new("moderation-report", "ip:203.0.113.9") }

  fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z").unwrap().with_timezone(&Utc)
  }

  #[test]
  fn five_admitted_then_refused_with_first_reset() {
    let limiter = RateLimiter::new();
    let first = limiter.admit_at(&key(), 5, 60, t0());
    assert!(first.admitted);
    assert_eq!(first.reset_at, t0() + TimeDelta::seconds(60));

    for i in 1..5 {
      let d = limiter.admit_at(&key(), 5, 60, t0() + TimeDelta::seconds(i));
      assert!(d.admitted, "call {} should pass", i + 1);
      assert_eq!(d.reset_at, first.reset_at);
    }

    let sixth = limiter.admit_at(&key(), 5, 60, t0() + TimeDelta::seconds(10));
    assert!(!sixth.admitted);
    assert_eq!(sixth.reset_at, first.reset_at);
    assert_eq!(limiter.window(&key()).unwrap().count, 5);
  }

  #[test]
  fn window_reopens_after_reset() {
    let limiter = RateLimiter::new();
    for _ in 0..6 {
      limiter.admit_at(&key(), 5, 60, t0());
    }
    let later = t0() + TimeDelta::seconds(61);
    let d = limiter.admit_at(&key(), 5, 60, later);
    assert!(d.admitted);
    assert_eq!(d.reset_at, later + TimeDelta::seconds(60));
    assert_eq!(limiter.window(&key()).unwrap().count, 1);
  }

  #[test]
  fn burst_across_boundary_is_allowed() {
    let limiter = RateLimiter::new();
    let edge = t0() + TimeDelta::seconds(59);
    for _ in 0..5 {
      assert!(limiter.admit_at(&key(), 5, 60, edge).admitted);
    }
    assert!(!limiter.admit_at(&key(), 5, 60, edge + TimeDelta::seconds(59)).admitted);

    // The first window closes at `edge + 60s`; a full second burst fits there,
    // so ten calls land within one second.
    let next = edge + TimeDelta::seconds(60);
    for _ in 0..5 {
      assert!(limiter.admit_at(&key(), 5, 60, next).admitted);
    }
    assert_eq!(limiter.window(&key()).unwrap().window_reset_at, next + TimeDelta::seconds(60));
  }

  #[test]
  fn scopes_and_identities_are_independent() {
    let limiter = RateLimiter::new();
    let a = RateKey::new("moderation-report", "user:1");
    let b = RateKey::new("generic", "user:1");
    let c = RateKey::new("moderation-report", "user:2");
    assert!(limiter.admit_at(&a, 1, 60, t0()).admitted);
    assert!(!limiter.admit_at(&a, 1, 60, t0()).admitted);
    assert!(limiter.admit_at(&b, 1, 60, t0()).admitted);
    assert!(limiter.admit_at(&c, 1, 60, t0()).admitted);
  }

  #[test]
  fn concurrent_admits_never_overshoot() {
    let limiter = Arc::new(RateLimiter::new());
    let admitted = std::sync::atomic::AtomicU32::new(0);
    std::thread::scope(|scope| {
      for _ in 0..16 {
        scope.spawn(|| {
          for _ in 0..10 {
            if limiter.admit_at(&key(), 25, 60, t0()).admitted {
              admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
          }
        });
      }
    });
    assert_eq!(admitted.into_inner(), 25);
  }

  #[test]
  fn sweep_evicts_only_expired_windows() {
    let limiter = RateLimiter::new();
    let old = RateKey::new("generic", "ip:1");
    let live = RateKey::new("generic", "ip:2");
    limiter.admit_at(&old, 5, 60, t0());
    limiter.admit_at(&live, 5, 60, t0() + TimeDelta::seconds(30));

    // Exactly at the reset instant the window is not yet "passed".
    assert_eq!(limiter.sweep_at(t0() + TimeDelta::seconds(60)), 0);
    assert_eq!(limiter.sweep_at(t0() + TimeDelta::seconds(61)), 1);
    assert!(limiter.window(&old).is_none());
    assert!(limiter.window(&live).is_some());
    assert_eq!(limiter.len(), 1);
  }

  #[tokio::test]
  async fn sweeper_stops_on_shutdown() {
    let limiter = Arc::new(RateLimiter::new());
    let (trigger, shutdown) = shutdown_channel();
    let handle = limiter.spawn_sweeper(Duration::from_millis(10), shutdown);
    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
      .await
      .expect("sweeper exits")
      .unwrap();
  }
}
