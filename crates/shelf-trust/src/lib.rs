//! The trust-and-admission pipeline.
//!
//! Admission (IP guard, then rate limiter) is synchronous and in-memory.
//! Everything else runs against any [`shelf_core::store::TrustStore`]:
//! moderation reports, the audit trail, privilege claims, and the two batch
//! jobs (trending decay and series linking).

pub mod audit;
pub mod claims;
pub mod ip_guard;
pub mod jobs;
pub mod moderation;
pub mod rate_limit;
pub mod series;
pub mod trending;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use shelf_core::{admission::IpRule, store::TrustStore};

pub use audit::AuditLog;
pub use claims::ClaimRegistry;
pub use ip_guard::IpGuard;
pub use jobs::{JobGuard, JobLocks, Shutdown, ShutdownTrigger};
pub use moderation::ModerationQueue;
pub use rate_limit::RateLimiter;
pub use series::SeriesLinker;
pub use trending::TrendingDecay;

/// Every pipeline component, wired to one store and one set of job locks.
pub struct TrustPipeline<S> {
  pub limiter:    Arc<RateLimiter>,
  pub ip_guard:   Arc<IpGuard>,
  pub audit:      AuditLog<S>,
  pub claims:     ClaimRegistry<S>,
  pub moderation: ModerationQueue<S>,
  pub decay:      TrendingDecay<S>,
  pub linker:     SeriesLinker<S>,
}

impl<S: TrustStore> TrustPipeline<S> {
  pub fn new(store: Arc<S>, ip_rules: Vec<IpRule>) -> Self {
    let locks = JobLocks::default();
    Self {
      limiter:    Arc::new(RateLimiter::new()),
      ip_guard:   Arc::new(IpGuard::new(ip_rules)),
      audit:      AuditLog::new(Arc::clone(&store)),
      claims:     ClaimRegistry::new(Arc::clone(&store)),
      moderation: ModerationQueue::new(Arc::clone(&store)),
      decay:      TrendingDecay::new(Arc::clone(&store), locks.clone()),
      linker:     SeriesLinker::new(store, locks),
    }
  }
}
