//! Principals, claims, and the actor performing an operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims attached to a subject. Absent rows mean "no elevated privilege".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub subject_id: String,
  pub elevated:   bool,
  pub updated_at: Option<DateTime<Utc>>,
}

impl Claims {
  pub fn unprivileged(subject_id: impl Into<String>) -> Self {
    Self { subject_id: subject_id.into(), elevated: false, updated_at: None }
  }
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub subject_id: String,
  pub elevated:   bool,
}

impl From<Claims> for Principal {
  fn from(c: Claims) -> Self {
    Self { subject_id: c.subject_id, elevated: c.elevated }
  }
}

/// Who is performing a privileged operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
  /// The process itself: the scheduler, startup bootstrap, maintenance jobs.
  System,
  Principal(Principal),
}

impl Actor {
  /// System actors are always elevated.
  pub fn is_elevated(&self) -> bool {
    match self {
      Self::System => true,
      Self::Principal(p) => p.elevated,
    }
  }

  /// The subject id recorded in audit entries; `None` for the system.
  pub fn subject_id(&self) -> Option<&str> {
    match self {
      Self::System => None,
      Self::Principal(p) => Some(&p.subject_id),
    }
  }

  /// Fail with [`Error::Forbidden`](crate::Error::Forbidden) unless elevated.
  pub fn require_elevated(&self) -> crate::Result<()> {
    if self.is_elevated() { Ok(()) } else { Err(crate::Error::Forbidden) }
  }
}

impl From<Principal> for Actor {
  fn from(p: Principal) -> Self { Self::Principal(p) }
}
