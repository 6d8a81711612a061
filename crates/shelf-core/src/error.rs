//! The error taxonomy shared by every layer of the pipeline.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed caller input.
  #[error("validation failed: {0}")]
  Validation(String),

  /// Missing or invalid credential.
  #[error("authentication required")]
  Auth,

  /// Valid credential, insufficient privilege.
  #[error("forbidden")]
  Forbidden,

  #[error("rate limited until {reset_at}")]
  RateLimited { reset_at: DateTime<Utc> },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// The persistent store (or another collaborator) failed.
  #[error("downstream failure: {0}")]
  Downstream(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a collaborator error.
  pub fn downstream<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Downstream(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
