//! Admission middleware: IP guard, then rate limiter, then the handler.

use std::net::SocketAddr;

use axum::{
  extract::{ConnectInfo, Request, State},
  http::{HeaderMap, Method},
  middleware::Next,
  response::{IntoResponse, Response},
};
use shelf_core::{Error, admission::RateLimitPolicy, store::TrustStore};
use shelf_trust::IpGuard;

use crate::{AppState, config::ServerConfig, error::ApiError};

pub async fn admit<S: TrustStore + 'static>(
  State(state): State<AppState<S>>,
  req: Request,
  next: Next,
) -> Response {
  let peer = req
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|ConnectInfo(addr)| addr.ip());
  let ip = client_ip(req.headers(), peer, state.config.trust_proxy_headers);

  let verdict = state.pipeline.ip_guard.admit(&ip, state.config.local_bypass);
  if !verdict.admitted {
    return ApiError::BlockedIp.into_response();
  }

  // A bad token still spends budget under the caller's address; the handler
  // rejects it afterwards.
  let identity = match state.verifier.subject_from_headers(req.headers()) {
    Ok(Some(subject)) => format!("user:{subject}"),
    _ => format!("ip:{ip}"),
  };
  let policy = policy_for(req.method(), req.uri().path(), &state.config);
  let decision = state.pipeline.limiter.admit_policy(policy, &identity);
  if !decision.admitted {
    tracing::warn!(scope = %policy.scope, %identity, reset_at = %decision.reset_at, "rate limited");
    return ApiError::from(Error::RateLimited { reset_at: decision.reset_at }).into_response();
  }

  next.run(req).await
}

fn client_ip(headers: &HeaderMap, peer: Option<std::net::IpAddr>, trust_proxy: bool) -> String {
  if !trust_proxy {
    return IpGuard::client_ip(None, None, peer);
  }
  let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
  IpGuard::client_ip(header("x-forwarded-for"), header("x-real-ip"), peer)
}

fn policy_for<'a>(method: &Method, path: &str, config: &'a ServerConfig) -> &'a RateLimitPolicy {
  if method == Method::POST && path.trim_end_matches('/') == "/reports" {
    &config.rate_limits.report
  } else {
    &config.rate_limits.generic
  }
}
