use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Duration, NaiveDate, Utc};
use std::collections::BTreeMap;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::dto::{
    normalize_page_size, CalendarDayInfo, CalendarQuery, DiaryCalendarResponse,
    DiaryCreateRequest, DiaryInfo, DiaryListQuery, DiaryListResponse, DiaryUpdateRequest,
    Envelope, PaginationInfo,
};
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppQuery};
use crate::models::diary::Diary;
use crate::AppState;

/// POST /api/v1/diaries — `diaryDate` is server-assigned to today.
pub async fn create_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppJson(body): AppJson<DiaryCreateRequest>,
) -> AppResult<(StatusCode, Json<Envelope<DiaryInfo>>)> {
    body.validate()?;

    let diary = sqlx::query_as::<_, Diary>(
        r#"
        INSERT INTO diaries (user_id, emotion_type, content, diary_date)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(auth_user.id)
    .bind(&body.emotion_type)
    .bind(&body.content)
    .bind(Utc::now().date_naive())
    .fetch_one(&state.db)
    .await?;

    tracing::info!(user_id = auth_user.id, diary_id = diary.id, emotion = %diary.emotion_type, "Diary created");

    Ok((StatusCode::CREATED, Json(Envelope::ok(diary.into()))))
}

/// GET /api/v1/diaries — paginated, newest first, filterable by emotion
/// type and start date.
pub async fn list_diaries(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppQuery(query): AppQuery<DiaryListQuery>,
) -> AppResult<Json<Envelope<DiaryListResponse>>> {
    let (page, size) = normalize_page_size(query.page, query.size);

    let total_count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM diaries
        WHERE user_id = $1
          AND ($2::text IS NULL OR emotion_type = $2)
          AND ($3::date IS NULL OR diary_date >= $3)
        "#,
    )
    .bind(auth_user.id)
    .bind(&query.emotion_type)
    .bind(query.start_date)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, Diary>(
        r#"
        SELECT * FROM diaries
        WHERE user_id = $1
          AND ($2::text IS NULL OR emotion_type = $2)
          AND ($3::date IS NULL OR diary_date >= $3)
        ORDER BY diary_date DESC, created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(auth_user.id)
    .bind(&query.emotion_type)
    .bind(query.start_date)
    .bind(size)
    .bind((page - 1) * size)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(Envelope::ok(DiaryListResponse {
        diaries: rows.into_iter().map(Into::into).collect(),
        pagination: PaginationInfo::new(page, size, total_count),
    })))
}

/// GET /api/v1/diaries/{id}
pub async fn get_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(diary_id): Path<i64>,
) -> AppResult<Json<Envelope<DiaryInfo>>> {
    let diary =
        sqlx::query_as::<_, Diary>("SELECT * FROM diaries WHERE id = $1 AND user_id = $2")
            .bind(diary_id)
            .bind(auth_user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::NotFound("Diary not found".into()))?;

    Ok(Json(Envelope::ok(diary.into())))
}

/// PUT /api/v1/diaries/{id} — `diaryDate` and `createdAt` are immutable.
pub async fn update_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(diary_id): Path<i64>,
    AppJson(body): AppJson<DiaryUpdateRequest>,
) -> AppResult<Json<Envelope<DiaryInfo>>> {
    body.validate()?;

    let diary = sqlx::query_as::<_, Diary>(
        r#"
        UPDATE diaries SET
            emotion_type = $3,
            content = $4,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(diary_id)
    .bind(auth_user.id)
    .bind(&body.emotion_type)
    .bind(&body.content)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Diary not found".into()))?;

    Ok(Json(Envelope::ok(diary.into())))
}

/// DELETE /api/v1/diaries/{id}
pub async fn delete_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(diary_id): Path<i64>,
) -> AppResult<Json<Envelope<String>>> {
    let result = sqlx::query("DELETE FROM diaries WHERE id = $1 AND user_id = $2")
        .bind(diary_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Diary not found".into()));
    }

    Ok(Json(Envelope::ok("The diary has been deleted.".into())))
}

/// GET /api/v1/diaries/calendar?year=&month= — map keyed by ISO date
/// for the requested month. An empty month is an empty map.
pub async fn get_calendar(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppQuery(query): AppQuery<CalendarQuery>,
) -> AppResult<Json<Envelope<DiaryCalendarResponse>>> {
    let (month_start, month_end) = month_bounds(query.year, query.month)
        .ok_or_else(|| AppError::Validation("year/month is out of range".into()))?;

    // Most recent entry wins when a day has several.
    let rows = sqlx::query_as::<_, Diary>(
        r#"
        SELECT DISTINCT ON (diary_date) * FROM diaries
        WHERE user_id = $1 AND diary_date BETWEEN $2 AND $3
        ORDER BY diary_date ASC, created_at DESC
        "#,
    )
    .bind(auth_user.id)
    .bind(month_start)
    .bind(month_end)
    .fetch_all(&state.db)
    .await?;

    let calendar: BTreeMap<String, CalendarDayInfo> = rows
        .into_iter()
        .map(|d| {
            (
                d.diary_date.to_string(),
                CalendarDayInfo {
                    id: d.id,
                    emotion_type: d.emotion_type,
                },
            )
        })
        .collect();

    Ok(Json(Envelope::ok(DiaryCalendarResponse {
        year: query.year,
        month: query.month,
        calendar,
    })))
}

/// GET /api/v1/diaries/today
pub async fn get_today_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Envelope<DiaryInfo>>> {
    let diary = sqlx::query_as::<_, Diary>(
        r#"
        SELECT * FROM diaries
        WHERE user_id = $1 AND diary_date = $2
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(auth_user.id)
    .bind(Utc::now().date_naive())
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("No diary written today".into()))?;

    Ok(Json(Envelope::ok(diary.into())))
}

/// Inclusive first/last day of a month; `None` when the inputs are not a
/// real calendar month (year is bounded to keep dates representable).
fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    if !(1900..=2100).contains(&year) {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_month - Duration::days(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_cover_whole_month() {
        let (start, end) = month_bounds(2025, 1).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
    }

    #[test]
    fn month_bounds_handle_leap_february() {
        let (_, end) = month_bounds(2024, 2).unwrap();
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let (_, end) = month_bounds(2025, 2).unwrap();
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }

    #[test]
    fn month_bounds_handle_december() {
        let (start, end) = month_bounds(2025, 12).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn month_bounds_reject_invalid_input() {
        assert!(month_bounds(2025, 0).is_none());
        assert!(month_bounds(2025, 13).is_none());
        assert!(month_bounds(1, 1).is_none());
    }
}
