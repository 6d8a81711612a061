//! Trending scores owned by the ranking subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingEntity {
  pub entity_id:      String,
  pub trending_score: f64,
  /// Last time a decay cycle touched this entity.
  pub decayed_at:     Option<DateTime<Utc>>,
}

/// One pending write in a decay batch. The store applies it only while the
/// entity's score still equals `expected_score`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
  pub entity_id:      String,
  pub expected_score: f64,
  pub new_score:      f64,
}
