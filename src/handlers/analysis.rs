use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use std::str::FromStr;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::dto::{
    normalize_page_size, AnalysisCreateRequest, AnalysisCreateResponse, AnalysisDetail,
    AnalysisFeedbackRequest, AnalysisListQuery, AnalysisListResponse, Envelope, PaginationInfo,
};
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppQuery};
use crate::models::analysis::{Analysis, AnalysisStatus, AnalysisType};
use crate::AppState;

/// POST /api/v1/analysis — queue a job over the period implied by the
/// analysis type. The background engine owns completion.
pub async fn create_analysis(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppJson(body): AppJson<AnalysisCreateRequest>,
) -> AppResult<(StatusCode, Json<Envelope<AnalysisCreateResponse>>)> {
    body.validate()?;

    let analysis_type = AnalysisType::from_str(&body.analysis_type).map_err(|_| {
        AppError::Validation("analysis type must be one of daily, weekly, monthly".into())
    })?;

    let period = analysis_type.period_ending(Utc::now().date_naive());

    let diary_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM diaries WHERE user_id = $1 AND diary_date BETWEEN $2 AND $3",
    )
    .bind(auth_user.id)
    .bind(period.start_date)
    .bind(period.end_date)
    .fetch_one(&state.db)
    .await?;

    if diary_count == 0 {
        return Err(AppError::Validation(
            "No diary entries to analyze in the selected period".into(),
        ));
    }

    let analysis = sqlx::query_as::<_, Analysis>(
        r#"
        INSERT INTO analyses (user_id, analysis_type, start_date, end_date, diary_count)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(auth_user.id)
    .bind(analysis_type)
    .bind(period.start_date)
    .bind(period.end_date)
    .bind(diary_count as i32)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        user_id = auth_user.id,
        analysis_id = analysis.id,
        analysis_type = %body.analysis_type,
        diary_count,
        "Analysis queued"
    );

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(AnalysisCreateResponse {
            analysis_id: analysis.id,
            analysis_type: analysis.analysis_type,
            status: analysis.status,
            analyzed_period: analysis.period(),
            diary_count: analysis.diary_count,
            estimated_time: "30s".into(),
            message: "AI is analyzing your emotions...".into(),
            created_at: analysis.created_at,
        })),
    ))
}

/// GET /api/v1/analysis/{id}
pub async fn get_analysis(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(analysis_id): Path<i64>,
) -> AppResult<Json<Envelope<AnalysisDetail>>> {
    let analysis =
        sqlx::query_as::<_, Analysis>("SELECT * FROM analyses WHERE id = $1 AND user_id = $2")
            .bind(analysis_id)
            .bind(auth_user.id)
            .fetch_optional(&state.db)
            .await?
            .ok_or(AppError::NotFound("Analysis not found".into()))?;

    Ok(Json(Envelope::ok(analysis.into())))
}

/// GET /api/v1/analysis — paginated, filterable by status and type.
pub async fn list_analyses(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppQuery(query): AppQuery<AnalysisListQuery>,
) -> AppResult<Json<Envelope<AnalysisListResponse>>> {
    let (page, size) = normalize_page_size(query.page, query.size);

    let status = query
        .status
        .as_deref()
        .map(AnalysisStatus::from_str)
        .transpose()
        .map_err(|_| {
            AppError::Validation("status must be one of processing, completed, failed".into())
        })?;

    let analysis_type = query
        .analysis_type
        .as_deref()
        .map(AnalysisType::from_str)
        .transpose()
        .map_err(|_| {
            AppError::Validation("analysis type must be one of daily, weekly, monthly".into())
        })?;

    let total_count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM analyses
        WHERE user_id = $1
          AND ($2::analysis_status IS NULL OR status = $2)
          AND ($3::analysis_type IS NULL OR analysis_type = $3)
        "#,
    )
    .bind(auth_user.id)
    .bind(status)
    .bind(analysis_type)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, Analysis>(
        r#"
        SELECT * FROM analyses
        WHERE user_id = $1
          AND ($2::analysis_status IS NULL OR status = $2)
          AND ($3::analysis_type IS NULL OR analysis_type = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(auth_user.id)
    .bind(status)
    .bind(analysis_type)
    .bind(size)
    .bind((page - 1) * size)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(Envelope::ok(AnalysisListResponse {
        analyses: rows.into_iter().map(Into::into).collect(),
        pagination: PaginationInfo::new(page, size, total_count),
    })))
}

/// GET /api/v1/analysis/latest — most recently completed job.
pub async fn get_latest_analysis(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Envelope<AnalysisDetail>>> {
    let analysis = sqlx::query_as::<_, Analysis>(
        r#"
        SELECT * FROM analyses
        WHERE user_id = $1 AND status = 'completed'
        ORDER BY completed_at DESC
        LIMIT 1
        "#,
    )
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("No completed analysis yet".into()))?;

    Ok(Json(Envelope::ok(analysis.into())))
}

/// POST /api/v1/analysis/{id}/feedback
pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(analysis_id): Path<i64>,
    AppJson(body): AppJson<AnalysisFeedbackRequest>,
) -> AppResult<Json<Envelope<String>>> {
    body.validate()?;

    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM analyses WHERE id = $1 AND user_id = $2",
    )
    .bind(analysis_id)
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?;

    if exists == 0 {
        return Err(AppError::NotFound("Analysis not found".into()));
    }

    sqlx::query(
        r#"
        INSERT INTO analysis_feedback (analysis_id, user_id, is_accurate, feedback_type, comment)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(analysis_id)
    .bind(auth_user.id)
    .bind(body.is_accurate)
    .bind(&body.feedback_type)
    .bind(&body.comment)
    .execute(&state.db)
    .await?;

    tracing::info!(
        user_id = auth_user.id,
        analysis_id,
        is_accurate = body.is_accurate,
        feedback_type = %body.feedback_type,
        "Analysis feedback recorded"
    );

    Ok(Json(Envelope::ok(
        "Feedback submitted. We'll use it to improve future analyses.".into(),
    )))
}
