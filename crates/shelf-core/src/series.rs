//! Series membership and the derived forward-link mapping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A member of a series as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMember {
  pub entity_id: String,
  /// Reading order; fractional values (e.g. novellas at `2.5`) are allowed.
  pub index:     f64,
}

/// `entity → next entity` for every member; the last member maps to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMapping {
  pub series_id:   String,
  pub next_of:     BTreeMap<String, Option<String>>,
  pub computed_at: DateTime<Utc>,
}
