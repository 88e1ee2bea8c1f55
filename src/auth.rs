//! Request authentication: bearer tokens resolved to an explicit context.
//!
//! Handlers never assume a logged-in user. Every request resolves to an
//! [`AuthContext`] value that must be matched: authenticated, anonymous, or
//! still loading. The validator behind it is injected at the composition
//! root (`AppState`), so deployments and tests can swap implementations.

use std::collections::HashMap;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::warn;

use crate::domain::User;
use crate::error::ApiError;

/// Authentication state of one request.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthContext {
  /// Credentials checked out; the request acts on behalf of this user.
  Authenticated(User),
  /// No usable credentials were presented, or the token is unknown.
  Anonymous,
  /// The validator cannot decide yet (credential store still warming up).
  Loading,
}

impl AuthContext {
  pub fn user(&self) -> Option<&User> {
    match self {
      AuthContext::Authenticated(u) => Some(u),
      _ => None,
    }
  }
}

/// Validates bearer tokens. Implementations must be cheap and non-blocking:
/// this runs on every request to a protected endpoint.
pub trait CredentialValidator: Send + Sync {
  fn validate(&self, token: &str) -> AuthContext;
}

/// Resolve the request's `Authorization: Bearer <token>` header.
/// Missing, malformed, or non-bearer headers resolve to `Anonymous`; only a
/// present token is handed to the validator.
pub fn resolve_bearer(validator: &dyn CredentialValidator, headers: &HeaderMap) -> AuthContext {
  let value = match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
    Some(v) => v,
    None => return AuthContext::Anonymous,
  };
  match value.strip_prefix("Bearer ") {
    Some(token) if !token.trim().is_empty() => validator.validate(token.trim()),
    _ => AuthContext::Anonymous,
  }
}

/// Gate for owner-only operations: 401 when anonymous, 503 while the
/// validator is warming up.
pub fn require_user(ctx: AuthContext) -> Result<User, ApiError> {
  match ctx {
    AuthContext::Authenticated(user) => Ok(user),
    AuthContext::Anonymous => Err(ApiError::Unauthorized("missing or invalid bearer token".into())),
    AuthContext::Loading => Err(ApiError::ServiceUnavailable("credential check not ready; retry shortly".into())),
  }
}

/// Static token table sourced from TOML config.
pub struct TokenValidator {
  tokens: HashMap<String, User>,
}

impl TokenValidator {
  pub fn new(credentials: Vec<(String, User)>) -> Self {
    TokenValidator { tokens: credentials.into_iter().collect() }
  }

  /// Used when no credentials are configured: mint a random token for a
  /// development user and log it once, so a fresh checkout is usable
  /// without baking an always-on account into the binary.
  pub fn with_dev_credential() -> Self {
    let token = crate::util::random_token(24);
    let user = User {
      id: "dev-user".into(),
      name: "Development User".into(),
      email: "dev@formlet.local".into(),
      is_pro: true,
    };
    warn!(target: "formlet_backend", %token, "No credentials configured; minted a development token with full access");
    TokenValidator { tokens: HashMap::from([(token, user)]) }
  }

  #[cfg(test)]
  pub fn single(token: &str, user: User) -> Self {
    TokenValidator::new(vec![(token.to_string(), user)])
  }
}

impl CredentialValidator for TokenValidator {
  fn validate(&self, token: &str) -> AuthContext {
    match self.tokens.get(token) {
      Some(user) => AuthContext::Authenticated(user.clone()),
      None => AuthContext::Anonymous,
    }
  }
}
