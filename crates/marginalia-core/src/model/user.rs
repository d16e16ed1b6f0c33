use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account.
///
/// Credential verification (password hashing, session tokens) is owned by
/// the application layer; this type only carries the persisted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,

    /// Password hash as produced by the application layer.
    #[serde(skip_serializing, default)]
    pub password: String,

    pub created_at: DateTime<Utc>,
}
