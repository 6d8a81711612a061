//! Runtime configuration, deserialised from `config.toml` layered with
//! `SHELF_`-prefixed environment variables.

use std::path::PathBuf;

use serde::Deserialize;
use shelf_core::admission::{IpRule, RateLimitPolicy};
use shelf_trust::trending::DecayParams;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// Admit loopback callers without consulting IP rules.
  pub local_bypass:        bool,
  /// Take the client address from `X-Forwarded-For` / `X-Real-IP`. Only
  /// enable behind a proxy that overwrites those headers.
  pub trust_proxy_headers: bool,
  pub ip_rules:            Vec<IpRule>,
  pub credentials:         Vec<Credential>,
  /// Subjects granted the elevated claim at startup.
  pub bootstrap_admins:    Vec<String>,
  pub rate_limits:         RateLimits,
  pub sweep_interval_secs: u64,
  pub decay:               DecayConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".into(),
      port:                8080,
      store_path:          PathBuf::from("shelf.db"),
      local_bypass:        false,
      trust_proxy_headers: false,
      ip_rules:            Vec::new(),
      credentials:         Vec::new(),
      bootstrap_admins:    Vec::new(),
      rate_limits:         RateLimits::default(),
      sweep_interval_secs: 60,
      decay:               DecayConfig::default(),
    }
  }
}

/// A bearer credential. Only the SHA-256 digest of the token is configured.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
  pub subject_id:   String,
  /// Lowercase hex.
  pub token_sha256: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimits {
  /// Applied to `POST /reports`.
  pub report:  RateLimitPolicy,
  /// Applied to every other route.
  pub generic: RateLimitPolicy,
}

impl Default for RateLimits {
  fn default() -> Self {
    Self {
      report:  RateLimitPolicy {
        scope:          "moderation-report".into(),
        max_requests:   5,
        window_seconds: 60,
      },
      generic: RateLimitPolicy {
        scope:          "generic".into(),
        max_requests:   120,
        window_seconds: 60,
      },
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
  pub enabled:       bool,
  pub interval_secs: u64,
  pub decay_rate:    f64,
  pub min_threshold: f64,
  pub batch_size:    usize,
}

impl Default for DecayConfig {
  fn default() -> Self {
    let params = DecayParams::default();
    Self {
      enabled:       true,
      interval_secs: 3600,
      decay_rate:    params.decay_rate,
      min_threshold: params.min_threshold,
      batch_size:    params.batch_size,
    }
  }
}

impl DecayConfig {
  pub fn params(&self) -> DecayParams {
    DecayParams {
      decay_rate:    self.decay_rate,
      min_threshold: self.min_threshold,
      batch_size:    self.batch_size,
    }
  }
}

/// Environment source: `SHELF_PORT`, `SHELF_DECAY__ENABLED`, and so on.
pub fn environment() -> config::Environment {
  config::Environment::with_prefix("SHELF")
    .prefix_separator("_")
    .separator("__")
}
