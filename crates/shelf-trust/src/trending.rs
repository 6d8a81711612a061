//! Exponential decay of trending scores.
//!
//! Each cycle selects a bounded batch of eligible entities, multiplies their
//! scores by the decay rate, and commits the whole batch in one store write.
//! A cycle either applies its batch or applies nothing.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use shelf_core::{Error, Result, store::TrustStore, trending::ScoreUpdate};
use tokio::time::{Instant, MissedTickBehavior};

use crate::jobs::{JobLocks, Shutdown};

/// Run-lock name shared by the scheduler and manual triggers.
pub const DECAY_JOB: &str = "trending-decay";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayParams {
  /// Multiplier in the open interval `(0, 1)`.
  pub decay_rate:    f64,
  /// Entities at or below this score are left alone.
  pub min_threshold: f64,
  pub batch_size:    usize,
}

impl Default for DecayParams {
  fn default() -> Self {
    Self { decay_rate: 0.9, min_threshold: 0.5, batch_size: 400 }
  }
}

impl DecayParams {
  pub fn validate(&self) -> Result<()> {
    if !(self.decay_rate > 0.0 && self.decay_rate < 1.0) {
      return Err(Error::Validation("decay_rate must be in (0, 1)".into()));
    }
    if !(self.min_threshold.is_finite() && self.min_threshold >= 0.0) {
      return Err(Error::Validation("min_threshold must be a finite value >= 0".into()));
    }
    if self.batch_size == 0 {
      return Err(Error::Validation("batch_size must be positive".into()));
    }
    Ok(())
  }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecayReport {
  /// Updates actually applied.
  pub decayed_count:  usize,
  /// Entities read this cycle. Those bumped between read and commit are not
  /// counted in `decayed_count`.
  pub selected_count: usize,
  /// Set when the store failed and the batch was left for the next cycle.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub deferred:       Option<String>,
}

impl DecayReport {
  fn deferred(selected_count: usize, reason: String) -> Self {
    Self { decayed_count: 0, selected_count, deferred: Some(reason) }
  }
}

pub struct TrendingDecay<S> {
  store: Arc<S>,
  locks: JobLocks,
}

impl<S> Clone for TrendingDecay<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), locks: self.locks.clone() }
  }
}

impl<S: TrustStore> TrendingDecay<S> {
  pub fn new(store: Arc<S>, locks: JobLocks) -> Self { Self { store, locks } }

  /// Run one decay cycle.
  ///
  /// Fails with `Validation` for bad parameters and `Conflict` when another
  /// cycle holds the run-lock. Store failures do not fail the call: they are
  /// logged and reported through [`DecayReport::deferred`].
  pub async fn run_decay_cycle(&self, params: DecayParams) -> Result<DecayReport> {
    params.validate()?;
    let Some(_guard) = self.locks.try_acquire(DECAY_JOB) else {
      return Err(Error::Conflict(format!("{DECAY_JOB} is already running")));
    };

    let selected = match self
      .store
      .select_trending_above(params.min_threshold, params.batch_size)
      .await
    {
      Ok(selected) => selected,
      Err(e) => {
        tracing::error!(error = %e, job = DECAY_JOB, "decay selection failed, deferring");
        return Ok(DecayReport::deferred(0, format!("selection failed: {e}")));
      }
    };
    let selected_count = selected.len();
    if selected.is_empty() {
      tracing::debug!(job = DECAY_JOB, "nothing above threshold");
      return Ok(DecayReport { decayed_count: 0, selected_count, deferred: None });
    }

    let updates = selected
      .into_iter()
      .map(|e| ScoreUpdate {
        new_score:      (e.trending_score * params.decay_rate).max(0.0),
        expected_score: e.trending_score,
        entity_id:      e.entity_id,
      })
      .collect();

    match self.store.commit_trending_batch(updates).await {
      Ok(decayed_count) => {
        tracing::info!(
          job = DECAY_JOB,
          decayed_count,
          skipped = selected_count - decayed_count,
          decay_rate = params.decay_rate,
          "decay cycle committed"
        );
        Ok(DecayReport { decayed_count, selected_count, deferred: None })
      }
      Err(e) => {
        tracing::error!(error = %e, job = DECAY_JOB, selected_count, "decay commit failed, deferring");
        Ok(DecayReport::deferred(selected_count, format!("commit failed: {e}")))
      }
    }
  }

  /// Run a cycle every `every` until `shutdown` fires. The first cycle starts
  /// one interval after the call. Shutdown is observed between cycles; a
  /// cycle that has started always runs to completion.
  pub async fn run_scheduled(&self, params: DecayParams, every: Duration, mut shutdown: Shutdown) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
      tokio::select! {
        _ = shutdown.wait() => break,
        _ = ticker.tick() => {}
      }
      if shutdown.is_triggered() {
        break;
      }
      match self.run_decay_cycle(params).await {
        Ok(_) => {}
        Err(Error::Conflict(_)) => {
          tracing::debug!(job = DECAY_JOB, "previous cycle still running, skipping tick");
        }
        Err(e) => {
          tracing::error!(error = %e, job = DECAY_JOB, "scheduled decay cycle failed");
        }
      }
    }
    tracing::info!(job = DECAY_JOB, "decay scheduler stopped");
  }
}
