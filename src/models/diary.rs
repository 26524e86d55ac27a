use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::dto::DiaryInfo;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Diary {
    pub id: i64,
    pub user_id: i64,
    pub emotion_type: String,
    pub content: String,
    /// Server-assigned on create, immutable thereafter.
    pub diary_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Diary> for DiaryInfo {
    fn from(d: Diary) -> Self {
        Self {
            id: d.id,
            emotion_type: d.emotion_type,
            content: d.content,
            diary_date: d.diary_date,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}
