//! Bearer-token gate for the chat path.

use std::future::Future;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
  pub user_id: String,
}

/// The verifier rejected the token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid token")]
pub struct InvalidToken;

/// Resolves bearer tokens to principals.
pub trait IdentityVerifier: Send + Sync {
  fn verify<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Principal, InvalidToken>> + Send + 'a;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
  #[error("missing Authorization header")]
  MissingHeader,

  #[error("Authorization header must be `Bearer <token>`")]
  MalformedHeader,

  #[error("invalid token")]
  InvalidToken,
}

impl From<InvalidToken> for AuthError {
  fn from(_: InvalidToken) -> Self { Self::InvalidToken }
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
  let header = header.ok_or(AuthError::MissingHeader)?;
  let token = header
    .strip_prefix("Bearer ")
    .map(str::trim)
    .ok_or(AuthError::MalformedHeader)?;
  if token.is_empty() || token.contains(char::is_whitespace) {
    return Err(AuthError::MalformedHeader);
  }
  Ok(token)
}

pub struct AuthGate<V> {
  verifier: V,
}

impl<V: IdentityVerifier> AuthGate<V> {
  pub fn new(verifier: V) -> Self { Self { verifier } }

  pub async fn authorize(&self, header: Option<&str>) -> Result<Principal, AuthError> {
    let token = bearer_token(header)?;
    let principal = self.verifier.verify(token).await?;
    debug!(user = %principal.user_id, "authorized");
    Ok(principal)
  }
}
