//! # Moodlog — Request/Response DTOs
//!
//! All API contract types in one module. Each struct maps 1:1 to the JSON
//! shapes served under `/api/v1`.
//!
//! Conventions:
//! - `*Request`  → deserialized from client JSON body or query params
//! - `*Response` → serialized to client JSON
//! - Wire field names are camelCase; validation is expressed via
//!   `validator` derive macros and checked at the handler boundary
//! - Every success body is wrapped in `Envelope { success, data }`

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

use crate::models::analysis::{AnalysisStatus, AnalysisType};

// ============================================================================
// Common envelope & pagination
// ============================================================================

/// Uniform success wrapper: `{ "success": true, "data": ... }`.
/// Error responses use the envelope rendered by `AppError`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Pagination descriptor shared by all list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub current_page: i32,
    pub total_pages: i32,
    pub total_count: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationInfo {
    /// `page` is 1-based; `size` must be positive.
    pub fn new(page: i64, size: i64, total_count: i64) -> Self {
        let total_pages = if total_count == 0 {
            0
        } else {
            (total_count + size - 1) / size
        };
        Self {
            current_page: page as i32,
            total_pages: total_pages as i32,
            total_count,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

/// Common `page`/`size` defaults with clamping.
pub fn normalize_page_size(page: Option<i64>, size: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let size = size.unwrap_or(20).clamp(1, 100);
    (page, size)
}

// ============================================================================
// Auth
// ============================================================================

/// POST /api/v1/auth/kakao/login
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct KakaoLoginRequest {
    #[validate(length(min = 1, message = "authorization code is required"))]
    pub authorization_code: String,
}

/// POST /api/v1/auth/refresh
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "refresh token is required"))]
    pub refresh_token: String,
}

/// User projection embedded in the login response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUserInfo {
    pub id: i64,
    pub social_id: String,
    pub nickname: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub is_new_user: bool,
    pub consented_scopes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KakaoLoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: AuthUserInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

// ============================================================================
// Diary
// ============================================================================

/// POST /api/v1/diaries
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DiaryCreateRequest {
    #[validate(length(min = 1, message = "emotion type is required"))]
    pub emotion_type: String,

    #[validate(length(min = 1, message = "diary content is required"))]
    pub content: String,
}

/// PUT /api/v1/diaries/{id}
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DiaryUpdateRequest {
    #[validate(length(min = 1, message = "emotion type is required"))]
    pub emotion_type: String,

    #[validate(length(min = 1, message = "diary content is required"))]
    pub content: String,
}

/// GET /api/v1/diaries query params
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub emotion_type: Option<String>,
    pub start_date: Option<NaiveDate>,
}

/// Single diary entry as served to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryInfo {
    pub id: i64,
    pub emotion_type: String,
    pub content: String,
    pub diary_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DiaryListResponse {
    pub diaries: Vec<DiaryInfo>,
    pub pagination: PaginationInfo,
}

/// GET /api/v1/diaries/calendar query params
#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: i32,
    pub month: u32,
}

/// One calendar cell: the entry id and its emotion tag.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDayInfo {
    pub id: i64,
    pub emotion_type: String,
}

/// GET /api/v1/diaries/calendar — ISO date string → entry summary.
#[derive(Debug, Serialize)]
pub struct DiaryCalendarResponse {
    pub year: i32,
    pub month: u32,
    pub calendar: BTreeMap<String, CalendarDayInfo>,
}

// ============================================================================
// Analysis
// ============================================================================

pub const FEEDBACK_TYPES: &[&str] = &["emotion_analysis", "recommendations", "overall"];

/// POST /api/v1/analysis — `analysisType` arrives as an open string and is
/// matched against the enumeration in the handler so violations render the
/// standard 400 envelope.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCreateRequest {
    #[validate(length(min = 1, message = "analysis type is required"))]
    pub analysis_type: String,
}

/// GET /api/v1/analysis query params
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub status: Option<String>,
    pub analysis_type: Option<String>,
}

/// POST /api/v1/analysis/{id}/feedback
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFeedbackRequest {
    pub is_accurate: bool,

    #[validate(custom = "validate_feedback_type")]
    pub feedback_type: String,

    #[validate(length(max = 2000, message = "comment must be under 2000 characters"))]
    pub comment: Option<String>,
}

fn validate_feedback_type(value: &str) -> Result<(), ValidationError> {
    if FEEDBACK_TYPES.contains(&value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("feedback_type");
        err.message = Some("feedback type must be one of emotion_analysis, recommendations, overall".into());
        Err(err)
    }
}

/// Inclusive date range an analysis job covers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Full mood assessment, present once a job completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionDetail {
    pub overall_mood: String,
    pub mood_score: f64,
    pub dominant_emotions: Vec<String>,
    pub risk_level: RiskLevel,
    pub summary: String,
}

/// Reduced assessment used by the paginated list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionSummary {
    pub overall_mood: String,
    pub mood_score: f64,
    pub risk_level: RiskLevel,
}

impl From<&EmotionDetail> for EmotionSummary {
    fn from(detail: &EmotionDetail) -> Self {
        Self {
            overall_mood: detail.overall_mood.clone(),
            mood_score: detail.mood_score,
            risk_level: detail.risk_level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Walking,
    Meditation,
    Shower,
    Nap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Activity suggestion produced alongside a completed analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub rec_type: RecommendationType,
    pub title: String,
    pub description: String,
    /// Minutes.
    pub duration: i32,
    pub priority: Priority,
}

/// POST /api/v1/analysis — 201 body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCreateResponse {
    pub analysis_id: i64,
    pub analysis_type: AnalysisType,
    pub status: AnalysisStatus,
    pub analyzed_period: AnalyzedPeriod,
    pub diary_count: i32,
    pub estimated_time: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// GET /api/v1/analysis/{id} and /latest
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDetail {
    pub analysis_id: i64,
    pub analysis_type: AnalysisType,
    pub status: AnalysisStatus,
    pub analyzed_period: AnalyzedPeriod,
    pub diary_count: i32,
    pub emotion_analysis: Option<EmotionDetail>,
    pub recommendations: Option<Vec<Recommendation>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Row of GET /api/v1/analysis
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisListItem {
    pub analysis_id: i64,
    pub analysis_type: AnalysisType,
    pub status: AnalysisStatus,
    pub analyzed_period: AnalyzedPeriod,
    pub diary_count: i32,
    pub emotion_analysis: Option<EmotionSummary>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisListResponse {
    pub analyses: Vec<AnalysisListItem>,
    pub pagination: PaginationInfo,
}

// ============================================================================
// App lock
// ============================================================================

/// POST /api/v1/lock
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LockCreateRequest {
    #[validate(custom = "validate_pin")]
    pub password: String,

    #[validate(custom = "validate_pin")]
    pub confirm_password: String,
}

/// PUT /api/v1/lock
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LockUpdateRequest {
    #[validate(custom = "validate_pin")]
    pub old_password: String,

    #[validate(custom = "validate_pin")]
    pub new_password: String,

    #[validate(custom = "validate_pin")]
    pub confirm_password: String,
}

/// POST /api/v1/lock/unlock
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LockUnlockRequest {
    #[validate(custom = "validate_pin")]
    pub password: String,
}

/// App-lock passwords are exactly six ASCII digits.
pub fn validate_pin(value: &str) -> Result<(), ValidationError> {
    if value.len() == 6 && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("pin");
        err.message = Some("password must be a 6-digit number".into());
        Err(err)
    }
}

/// POST /api/v1/lock — 201 body (no `updatedAt` on first create)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockCreateResponse {
    pub lock_id: i64,
    pub is_enabled: bool,
    pub use_biometric: bool,
    pub created_at: DateTime<Utc>,
}

/// Lock state for GET / PUT / unlock responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockResponse {
    pub lock_id: i64,
    pub is_enabled: bool,
    pub use_biometric: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// User
// ============================================================================

/// GET /api/v1/users/me
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoResponse {
    pub id: i64,
    pub social_id: String,
    pub nickname: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub app_lock_enabled: bool,
    pub consented_scopes: Vec<String>,
}

/// DELETE /api/v1/users/me
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserWithdrawRequest {
    #[validate(length(min = 1, message = "withdrawal reason is required"))]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_invariants_hold_for_every_page() {
        // 98 items, 20 per page → 5 pages (matches the canonical example)
        let total = 98;
        let size = 20;
        let last = 5;
        for page in 1..=last {
            let p = PaginationInfo::new(page, size, total);
            assert_eq!(p.total_pages, last as i32);
            assert_eq!(p.has_next, p.current_page < p.total_pages);
            assert_eq!(p.has_previous, p.current_page > 1);
        }
        assert!(PaginationInfo::new(1, size, total).has_next);
        assert!(!PaginationInfo::new(last, size, total).has_next);
        assert!(!PaginationInfo::new(1, size, total).has_previous);
    }

    #[test]
    fn pagination_empty_result() {
        let p = PaginationInfo::new(1, 20, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_previous);
    }

    #[test]
    fn normalize_page_size_clamps() {
        assert_eq!(normalize_page_size(None, None), (1, 20));
        assert_eq!(normalize_page_size(Some(0), Some(0)), (1, 1));
        assert_eq!(normalize_page_size(Some(-3), Some(1000)), (1, 100));
        assert_eq!(normalize_page_size(Some(7), Some(50)), (7, 50));
    }

    #[test]
    fn pin_accepts_six_digits_only() {
        assert!(validate_pin("123456").is_ok());
        assert!(validate_pin("000000").is_ok());
        assert!(validate_pin("12345").is_err());
        assert!(validate_pin("1234567").is_err());
        assert!(validate_pin("12a456").is_err());
        assert!(validate_pin("12 456").is_err());
        assert!(validate_pin("").is_err());
    }

    #[test]
    fn feedback_type_enumeration() {
        assert!(validate_feedback_type("emotion_analysis").is_ok());
        assert!(validate_feedback_type("recommendations").is_ok());
        assert!(validate_feedback_type("overall").is_ok());
        assert!(validate_feedback_type("other").is_err());
        assert!(validate_feedback_type("").is_err());
    }

    #[test]
    fn envelope_and_camel_case_wire_names() {
        let body = Envelope::ok(DiaryInfo {
            id: 12345,
            emotion_type: "happy".into(),
            content: "A good day.".into(),
            diary_date: NaiveDate::from_ymd_opt(2025, 1, 4).unwrap(),
            created_at: DateTime::parse_from_rfc3339("2025-01-04T22:30:00Z")
                .unwrap()
                .into(),
            updated_at: DateTime::parse_from_rfc3339("2025-01-04T22:30:00Z")
                .unwrap()
                .into(),
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["emotionType"], "happy");
        assert_eq!(json["data"]["diaryDate"], "2025-01-04");
        assert!(json["data"].get("emotion_type").is_none());
    }

    #[test]
    fn recommendation_serializes_type_key() {
        let rec = Recommendation {
            rec_type: RecommendationType::Walking,
            title: "Light walk".into(),
            description: "Walk slowly around the block for 10-15 minutes.".into(),
            duration: 15,
            priority: Priority::High,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "walking");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["duration"], 15);
    }

    #[test]
    fn emotion_summary_reduces_detail() {
        let detail = EmotionDetail {
            overall_mood: "low".into(),
            mood_score: 3.2,
            dominant_emotions: vec!["sadness".into(), "fatigue".into()],
            risk_level: RiskLevel::Medium,
            summary: "A subdued week.".into(),
        };
        let summary = EmotionSummary::from(&detail);
        assert_eq!(summary.mood_score, 3.2);
        assert_eq!(summary.risk_level, RiskLevel::Medium);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["overallMood"], "low");
        assert!(json.get("dominantEmotions").is_none());
    }
}
