//! Bearer-token verification against argon2 hashes from the config file.

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use pawlog_engine::{IdentityVerifier, InvalidToken, Principal};
use rand_core::OsRng;
use serde::Deserialize;
use thiserror::Error;

/// One issued token, as listed under `[[tokens]]` in `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
  pub user_id:    String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub token_hash: String,
}

#[derive(Debug, Error)]
#[error("token hash for user {user_id:?} is not a valid PHC string")]
pub struct InvalidTokenHash {
  pub user_id: String,
}

/// Checks presented tokens against every configured hash.
///
/// Hashing runs on the blocking pool; one rejected token costs a full
/// argon2 pass per configured entry.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
  entries: Arc<[TokenEntry]>,
}

impl TokenVerifier {
  /// Fails on the first entry whose hash cannot be parsed, so a typo in the
  /// config is caught at startup rather than on every request.
  pub fn new(entries: Vec<TokenEntry>) -> Result<Self, InvalidTokenHash> {
    for entry in &entries {
      PasswordHash::new(&entry.token_hash)
        .map_err(|_| InvalidTokenHash { user_id: entry.user_id.clone() })?;
    }
    Ok(Self { entries: entries.into() })
  }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl IdentityVerifier for TokenVerifier {
  async fn verify(&self, token: &str) -> Result<Principal, InvalidToken> {
    let entries = Arc::clone(&self.entries);
    let token = token.to_owned();
    tokio::task::spawn_blocking(move || match_token(&entries, &token))
      .await
      .map_err(|_| InvalidToken)?
  }
}

fn match_token(entries: &[TokenEntry], token: &str) -> Result<Principal, InvalidToken> {
  let argon2 = Argon2::default();
  entries
    .iter()
    .find(|entry| {
      PasswordHash::new(&entry.token_hash)
        .is_ok_and(|hash| argon2.verify_password(token.as_bytes(), &hash).is_ok())
    })
    .map(|entry| Principal { user_id: entry.user_id.clone() })
    .ok_or(InvalidToken)
}

/// Hash `token` for the `token_hash` config field.
pub fn hash_token(token: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(token.as_bytes(), &salt)?.to_string())
}
