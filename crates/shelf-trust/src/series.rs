//! Forward "next in series" links.

use std::{cmp::Ordering, collections::HashSet, sync::Arc};

use shelf_core::{
  Error, Result,
  principal::Actor,
  series::{SeriesMapping, SeriesMember},
  store::TrustStore,
};

use crate::jobs::JobLocks;

/// Order members by `index` (stable for ties) and link each to the next.
/// The last member links to `None`.
pub fn derive_links(members: &[SeriesMember]) -> Vec<(String, Option<String>)> {
  let mut ordered: Vec<&SeriesMember> = members.iter().collect();
  ordered.sort_by(|a, b| a.index.partial_cmp(&b.index).unwrap_or(Ordering::Equal));

  let mut links = Vec::with_capacity(ordered.len());
  let mut iter = ordered.into_iter().peekable();
  while let Some(member) = iter.next() {
    let next = iter.peek().map(|n| n.entity_id.clone());
    links.push((member.entity_id.clone(), next));
  }
  links
}

fn validate(series_id: &str, members: &[SeriesMember]) -> Result<()> {
  if series_id.trim().is_empty() {
    return Err(Error::Validation("series_id must not be empty".into()));
  }
  let mut seen = HashSet::with_capacity(members.len());
  for m in members {
    if m.entity_id.trim().is_empty() {
      return Err(Error::Validation("entity_id must not be empty".into()));
    }
    if !m.index.is_finite() {
      return Err(Error::Validation(format!("index of {} must be finite", m.entity_id)));
    }
    if !seen.insert(m.entity_id.as_str()) {
      return Err(Error::Validation(format!("{} appears more than once", m.entity_id)));
    }
  }
  Ok(())
}

pub struct SeriesLinker<S> {
  store: Arc<S>,
  locks: JobLocks,
}

impl<S> Clone for SeriesLinker<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), locks: self.locks.clone() }
  }
}

impl<S: TrustStore> SeriesLinker<S> {
  pub fn new(store: Arc<S>, locks: JobLocks) -> Self { Self { store, locks } }

  /// Recompute and store the mapping for `series_id`, replacing whatever was
  /// there before.
  pub async fn relink(
    &self,
    series_id: &str,
    members: Vec<SeriesMember>,
    actor: &Actor,
  ) -> Result<SeriesMapping> {
    actor.require_elevated()?;
    validate(series_id, &members)?;

    let job = format!("series-relink:{series_id}");
    let Some(_guard) = self.locks.try_acquire(job.as_str()) else {
      return Err(Error::Conflict(format!("{job} is already running")));
    };

    let links = derive_links(&members);
    let mapping = self
      .store
      .replace_series_mapping(series_id.to_owned(), links)
      .await
      .map_err(|e| {
        tracing::error!(error = %e, series_id, "series relink failed");
        Error::downstream(e)
      })?;

    tracing::info!(series_id, members = members.len(), "series relinked");
    Ok(mapping)
  }

  pub async fn mapping(&self, series_id: &str) -> Result<SeriesMapping> {
    self
      .store
      .get_series_mapping(series_id)
      .await
      .map_err(Error::downstream)?
      .ok_or_else(|| Error::NotFound(format!("series {series_id}")))
  }
}
