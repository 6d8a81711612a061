//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use thiserror::Error;

/// An error returned by a handler or by the admission layer.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Trust(#[from] shelf_core::Error),

  /// Refused by the IP guard.
  #[error("blocked_ip")]
  BlockedIp,

  #[error("bad request: {0}")]
  BadRequest(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    use shelf_core::Error as E;
    match self {
      Self::BlockedIp => StatusCode::FORBIDDEN,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Trust(e) => match e {
        E::Validation(_) => StatusCode::BAD_REQUEST,
        E::Auth => StatusCode::UNAUTHORIZED,
        E::Forbidden => StatusCode::FORBIDDEN,
        E::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        E::NotFound(_) => StatusCode::NOT_FOUND,
        E::Conflict(_) => StatusCode::CONFLICT,
        E::Downstream(_) => StatusCode::BAD_GATEWAY,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    use shelf_core::Error as E;
    let status = self.status();
    match self {
      Self::Trust(E::RateLimited { reset_at }) => rate_limited(reset_at),
      Self::Trust(E::Auth) => {
        let mut res = (status, Json(json!({ "error": "authentication required" }))).into_response();
        res.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        res
      }
      Self::Trust(E::Downstream(e)) => {
        // The source is logged where it happened; clients get a fixed message.
        tracing::debug!(error = %e, "downstream failure surfaced to client");
        (status, Json(json!({ "error": "downstream failure" }))).into_response()
      }
      other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
    }
  }
}

fn rate_limited(reset_at: DateTime<Utc>) -> Response {
  let wait = (reset_at - Utc::now()).num_milliseconds().max(0);
  let retry_after = ((wait + 999) / 1000).max(1);
  let body = json!({
    "error": "rate_limited",
    "reset_at": reset_at.to_rfc3339_opts(SecondsFormat::Secs, true),
  });
  let mut res = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
  if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
    res.headers_mut().insert(header::RETRY_AFTER, v);
  }
  res
}
