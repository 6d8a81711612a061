//! Value types for request admission: rate-limit keys and decisions, and the
//! static IP rules consulted before any rate-limit budget is spent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Rate limiting ───────────────────────────────────────────────────────────

/// Identifies one independent limiter bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateKey {
  /// Which family of operations this bucket guards, e.g. `"moderation-report"`.
  pub scope:           String,
  /// Derived from the calling principal: `user:<id>` or `ip:<addr>`.
  pub client_identity: String,
}

impl RateKey {
  pub fn new(scope: impl Into<String>, client_identity: impl Into<String>) -> Self {
    Self { scope: scope.into(), client_identity: client_identity.into() }
  }
}

/// The outcome of a single rate-limiter admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
  pub admitted: bool,
  /// When the current window closes. Unchanged across refusals.
  pub reset_at: DateTime<Utc>,
}

/// Limits applied to one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
  pub scope:          String,
  pub max_requests:   u32,
  pub window_seconds: u32,
}

// ─── IP rules ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVerdict {
  Allow,
  Deny,
}

/// A static rule loaded from configuration; read-only at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRule {
  pub ip:      String,
  pub verdict: IpVerdict,
  #[serde(default)]
  pub reason:  String,
}

/// The outcome of an IP guard check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpAdmission {
  pub admitted: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason:   Option<String>,
}

impl IpAdmission {
  pub fn admit(reason: Option<&str>) -> Self {
    Self { admitted: true, reason: reason.map(str::to_owned) }
  }

  pub fn refuse(reason: &str) -> Self {
    Self { admitted: false, reason: Some(reason.to_owned()) }
  }
}
