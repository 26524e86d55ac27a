use axum::{extract::State, Extension, Json};
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::dto::{Envelope, UserInfoResponse, UserWithdrawRequest};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::models::user::User;
use crate::AppState;

/// GET /api/v1/users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Envelope<UserInfoResponse>>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("User not found".into()))?;

    let app_lock_enabled = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM app_locks WHERE user_id = $1 AND is_enabled)",
    )
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(Envelope::ok(UserInfoResponse {
        id: user.id,
        social_id: user.social_id,
        nickname: user.nickname,
        email: user.email,
        phone_number: user.phone_number,
        profile_image: user.profile_image,
        created_at: user.created_at,
        app_lock_enabled,
        consented_scopes: user.consented_scopes,
    })))
}

/// DELETE /api/v1/users/me — soft delete; the reason feeds the product
/// team's churn review.
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppJson(body): AppJson<UserWithdrawRequest>,
) -> AppResult<Json<Envelope<String>>> {
    body.validate()?;

    let mut tx = state.db.begin().await?;

    sqlx::query("INSERT INTO user_withdrawals (user_id, reason) VALUES ($1, $2)")
        .bind(auth_user.id)
        .bind(&body.reason)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(auth_user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    // Sessions die with the account.
    crate::handlers::auth::revoke_all_user_tokens(&state.db, auth_user.id).await?;

    tracing::info!(user_id = auth_user.id, "Account withdrawn");

    Ok(Json(Envelope::ok("Account withdrawal completed.".into())))
}
