use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::dto::{LockCreateResponse, LockResponse};

/// One app-lock row per user. The PIN is argon2-hashed at rest and is
/// never serialized back to clients.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AppLock {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_enabled: bool,
    pub use_biometric: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppLock> for LockResponse {
    fn from(l: AppLock) -> Self {
        Self {
            lock_id: l.id,
            is_enabled: l.is_enabled,
            use_biometric: l.use_biometric,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

impl From<AppLock> for LockCreateResponse {
    fn from(l: AppLock) -> Self {
        Self {
            lock_id: l.id,
            is_enabled: l.is_enabled,
            use_biometric: l.use_biometric,
            created_at: l.created_at,
        }
    }
}
