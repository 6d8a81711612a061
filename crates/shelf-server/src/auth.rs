//! Bearer-token principal verifier and the extractors built on it.

use std::collections::HashMap;

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use shelf_core::{
  Error,
  principal::{Actor, Principal},
  store::TrustStore,
};

use crate::{AppState, config::Credential, error::ApiError};

/// Maps token digests to the subjects they authenticate.
#[derive(Debug, Default)]
pub struct TokenVerifier {
  by_digest: HashMap<String, String>,
}

impl TokenVerifier {
  pub fn new(credentials: &[Credential]) -> Self {
    let by_digest = credentials
      .iter()
      .map(|c| (c.token_sha256.trim().to_ascii_lowercase(), c.subject_id.clone()))
      .collect();
    Self { by_digest }
  }

  /// The subject a raw token belongs to, if any.
  pub fn verify(&self, token: &str) -> Option<&str> {
    self.by_digest.get(&digest(token)).map(String::as_str)
  }

  /// Read the `Authorization` header. `Ok(None)` when it is absent; `Auth`
  /// when it is present but not a known bearer token.
  pub fn subject_from_headers(&self, headers: &HeaderMap) -> Result<Option<&str>, Error> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
      return Ok(None);
    };
    let token = value
      .to_str()
      .ok()
      .and_then(|v| v.strip_prefix("Bearer "))
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or(Error::Auth)?;
    self.verify(token).map(Some).ok_or(Error::Auth)
  }
}

/// Lowercase hex SHA-256 of `token`.
pub fn digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

/// Generate a fresh random token. Returns `(token, digest)`.
pub fn issue_token() -> (String, String) {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  let token = B64.encode(bytes);
  let digest = digest(&token);
  (token, digest)
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// The caller, if they presented a credential. A bad credential is still
/// rejected.
pub struct MaybePrincipal(pub Option<Principal>);

/// A caller that presented a valid credential. Privilege is checked by the
/// operation, not here.
pub struct Authenticated(pub Principal);

impl Authenticated {
  pub fn actor(self) -> Actor { Actor::Principal(self.0) }
}

async fn resolve<S: TrustStore>(
  headers: &HeaderMap,
  state: &AppState<S>,
) -> Result<Option<Principal>, ApiError> {
  let Some(subject) = state.verifier.subject_from_headers(headers)? else {
    return Ok(None);
  };
  Ok(Some(state.pipeline.claims.principal(subject).await?))
}

impl<S: TrustStore + 'static> FromRequestParts<AppState<S>> for MaybePrincipal {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(Self(resolve(&parts.headers, state).await?))
  }
}

impl<S: TrustStore + 'static> FromRequestParts<AppState<S>> for Authenticated {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    resolve(&parts.headers, state)
      .await?
      .map(Self)
      .ok_or(ApiError::Trust(Error::Auth))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn verifier(token: &str) -> TokenVerifier {
    TokenVerifier::new(&[Credential {
      subject_id:   "mod-1".into(),
      token_sha256: digest(token).to_ascii_uppercase(),
    }])
  }

  fn headers(auth: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
    h
  }

  #[test]
  fn issued_token_verifies() {
    let (token, digest_hex) = issue_token();
    assert_eq!(digest_hex.len(), 64);
    assert_eq!(verifier(&token).verify(&token), Some("mod-1"));
    assert_ne!(issue_token().0, token);
  }

  #[test]
  fn missing_header_is_anonymous() {
    assert_eq!(verifier("t").subject_from_headers(&HeaderMap::new()).unwrap(), None);
  }

  #[test]
  fn bearer_header_resolves_subject() {
    let v = verifier("s3cret");
    assert_eq!(v.subject_from_headers(&headers("Bearer s3cret")).unwrap(), Some("mod-1"));
  }

  #[test]
  fn wrong_scheme_or_token_is_rejected() {
    let v = verifier("s3cret");
    for bad in ["Bearer nope", "Basic czNjcmV0", "Bearer ", "s3cret"] {
      assert!(matches!(v.subject_from_headers(&headers(bad)), Err(Error::Auth)), "{bad}");
    }
  }
}
