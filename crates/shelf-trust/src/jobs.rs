//! Run-locks and the shutdown signal shared by batch jobs.
//!
//! A batch job holds a [`JobGuard`] for as long as it runs; a second trigger
//! for the same job name fails to acquire and backs off instead of running
//! concurrently. Dropping the guard releases the lock.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::watch;

// ─── Run-locks ───────────────────────────────────────────────────────────────

/// Process-wide set of currently running job names.
#[derive(Debug, Clone, Default)]
pub struct JobLocks {
  held: Arc<Mutex<HashSet<String>>>,
}

impl JobLocks {
  /// Acquire the lock for `name`, or `None` if a run is already in flight.
  pub fn try_acquire(&self, name: impl Into<String>) -> Option<JobGuard> {
    let name = name.into();
    let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
    if !held.insert(name.clone()) {
      return None;
    }
    Some(JobGuard { name, held: Arc::clone(&self.held) })
  }

  pub fn is_held(&self, name: &str) -> bool {
    self
      .held
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .contains(name)
  }
}

/// Proof that a job run holds its lock. Released on drop.
#[derive(Debug)]
pub struct JobGuard {
  name: String,
  held: Arc<Mutex<HashSet<String>>>,
}

impl Drop for JobGuard {
  fn drop(&mut self) {
    self
      .held
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&self.name);
  }
}

// ─── Shutdown ────────────────────────────────────────────────────────────────

/// Create a linked trigger/listener pair.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
  let (tx, rx) = watch::channel(false);
  (ShutdownTrigger { tx }, Shutdown { rx })
}

/// The sending half; owned by whoever decides the process is stopping.
#[derive(Debug)]
pub struct ShutdownTrigger {
  tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
  pub fn trigger(&self) { self.tx.send_replace(true); }

  pub fn subscribe(&self) -> Shutdown { Shutdown { rx: self.tx.subscribe() } }

  /// Trigger once `signal` fires. A signal that fails to install never
  /// triggers; the process then runs until killed.
  pub async fn trigger_on<F>(self, signal: F)
  where
    F: Future<Output = std::io::Result<()>>,
  {
    if let Err(e) = signal.await {
      tracing::error!(error = %e, "failed to install shutdown signal, running until killed");
      std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
    self.trigger();
  }
}

/// The listening half. Cheap to clone; one per task.
#[derive(Debug, Clone)]
pub struct Shutdown {
  rx: watch::Receiver<bool>,
}

impl Shutdown {
  pub fn is_triggered(&self) -> bool { *self.rx.borrow() }

  /// Resolve once shutdown has been triggered or the trigger was dropped.
  pub async fn wait(&mut self) {
    let _ = self.rx.wait_for(|stopping| *stopping).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn second_acquire_fails_until_guard_dropped() {
    let locks = JobLocks::default();
    let guard = locks.try_acquire("trending-decay").unwrap();
    assert!(locks.is_held("trending-decay"));
    assert!(locks.try_acquire("trending-decay").is_none());
    assert!(locks.try_acquire("series-relink:s1").is_some());

    drop(guard);
    assert!(!locks.is_held("trending-decay"));
    assert!(locks.try_acquire("trending-decay").is_some());
  }

  #[tokio::test]
  async fn shutdown_wakes_waiters() {
    let (trigger, mut shutdown) = shutdown_channel();
    let mut late = trigger.subscribe();
    assert!(!shutdown.is_triggered());

    let waiter = tokio::spawn(async move {
      shutdown.wait().await;
      shutdown.is_triggered()
    });
    trigger.trigger();
    assert!(waiter.await.unwrap());

    late.wait().await;
    assert!(late.is_triggered());
  }

  #[tokio::test]
  async fn signal_triggers_shutdown() {
    let (trigger, shutdown) = shutdown_channel();
    trigger.trigger_on(async { Ok(()) }).await;
    assert!(shutdown.is_triggered());
  }

  #[tokio::test]
  async fn failed_signal_keeps_running() {
    let (trigger, shutdown) = shutdown_channel();
    let task = tokio::spawn(trigger.trigger_on(async { Err(std::io::Error::other("no handler")) }));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!shutdown.is_triggered());
    assert!(!task.is_finished());
    task.abort();
  }
}
