use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    /// Kakao account id, unique per user.
    pub social_id: String,
    pub nickname: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub profile_image: Option<String>,
    /// OAuth scope names the user granted at login.
    pub consented_scopes: Vec<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
