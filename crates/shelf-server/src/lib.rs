//! HTTP surface for the Shelf trust pipeline.
//!
//! Exposes an axum [`Router`] backed by any [`TrustStore`]. Every route passes
//! through [`admission::admit`] (IP guard, then rate limiter) before its
//! handler runs.

pub mod admission;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;

pub use crate::config::ServerConfig;
pub use error::ApiError;

use std::sync::Arc;

use axum::{
  Router,
  middleware,
  routing::{get, post, put},
};
use shelf_core::store::TrustStore;
use shelf_trust::TrustPipeline;
use tower_http::trace::TraceLayer;

use auth::TokenVerifier;
use handlers::{audit, claims, jobs, reports, series};

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub config:   Arc<ServerConfig>,
  pub pipeline: Arc<TrustPipeline<S>>,
  pub verifier: Arc<TokenVerifier>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      config:   Arc::clone(&self.config),
      pipeline: Arc::clone(&self.pipeline),
      verifier: Arc::clone(&self.verifier),
    }
  }
}

impl<S: TrustStore> AppState<S> {
  pub fn new(store: Arc<S>, config: ServerConfig) -> Self {
    let pipeline = TrustPipeline::new(store, config.ip_rules.clone());
    let verifier = TokenVerifier::new(&config.credentials);
    Self {
      config:   Arc::new(config),
      pipeline: Arc::new(pipeline),
      verifier: Arc::new(verifier),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full router for `state`.
pub fn router<S: TrustStore + 'static>(state: AppState<S>) -> Router {
  Router::new()
    // Moderation
    .route("/reports", post(reports::create::<S>).get(reports::list::<S>))
    .route("/reports/{id}/resolve", post(reports::resolve::<S>))
    .route("/reports/{id}/target", get(reports::target::<S>))
    // Claims and audit
    .route("/claims/{subject_id}", put(claims::set::<S>))
    .route("/audit", get(audit::query::<S>))
    // Jobs
    .route("/jobs/trending-decay", post(jobs::trending_decay::<S>))
    .route("/series/{id}/links", put(series::relink::<S>).get(series::get::<S>))
    .layer(middleware::from_fn_with_state(state.clone(), admission::admit::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
