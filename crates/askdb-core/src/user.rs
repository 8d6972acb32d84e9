//! User identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user. The password hash is not carried here; it only
/// travels between the store and the credential check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id:         i64,
  pub username:   String,
  pub email:      String,
  pub created_at: DateTime<Utc>,
}

/// Input to [`UserStore::create_user`](crate::store::UserStore::create_user).
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub email:         String,
  /// argon2 PHC string, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}
