use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::auth::password::{hash_pin, verify_pin};
use crate::dto::{
    Envelope, LockCreateRequest, LockCreateResponse, LockResponse, LockUnlockRequest,
    LockUpdateRequest,
};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::models::lock::AppLock;
use crate::AppState;

/// Two concurrent creates can both pass the duplicate pre-check; the
/// loser hits the `app_locks.user_id` UNIQUE constraint and must still
/// resolve to 409, not 500.
fn map_lock_insert_error(e: sqlx::Error) -> AppError {
    match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("App lock already exists".into())
        }
        _ => AppError::from(e),
    }
}

async fn fetch_lock(db: &sqlx::PgPool, user_id: i64) -> AppResult<AppLock> {
    sqlx::query_as::<_, AppLock>("SELECT * FROM app_locks WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("App lock not configured".into()))
}

/// POST /api/v1/lock — one lock per user; PIN is hashed at rest.
pub async fn create_lock(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppJson(body): AppJson<LockCreateRequest>,
) -> AppResult<(StatusCode, Json<Envelope<LockCreateResponse>>)> {
    body.validate()?;

    if body.password != body.confirm_password {
        return Err(AppError::Validation("Passwords do not match".into()));
    }

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM app_locks WHERE user_id = $1",
    )
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?;

    if existing > 0 {
        return Err(AppError::Conflict("App lock already exists".into()));
    }

    let password_hash = hash_pin(&body.password)?;

    let lock = sqlx::query_as::<_, AppLock>(
        r#"
        INSERT INTO app_locks (user_id, password_hash, is_enabled)
        VALUES ($1, $2, true)
        RETURNING *
        "#,
    )
    .bind(auth_user.id)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(map_lock_insert_error)?;

    tracing::info!(user_id = auth_user.id, lock_id = lock.id, "App lock created");

    Ok((StatusCode::CREATED, Json(Envelope::ok(lock.into()))))
}

/// PUT /api/v1/lock — change the PIN. Stored state is untouched on any
/// validation failure.
pub async fn update_lock(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppJson(body): AppJson<LockUpdateRequest>,
) -> AppResult<Json<Envelope<LockResponse>>> {
    body.validate()?;

    if body.new_password != body.confirm_password {
        return Err(AppError::Validation("New passwords do not match".into()));
    }

    let lock = fetch_lock(&state.db, auth_user.id).await?;

    if !verify_pin(&body.old_password, &lock.password_hash)? {
        return Err(AppError::Validation("Old password is incorrect".into()));
    }

    let password_hash = hash_pin(&body.new_password)?;

    let lock = sqlx::query_as::<_, AppLock>(
        r#"
        UPDATE app_locks SET password_hash = $2, updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(auth_user.id)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(Envelope::ok(lock.into())))
}

/// POST /api/v1/lock/unlock — verify the PIN and disable the lock.
pub async fn unlock(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    AppJson(body): AppJson<LockUnlockRequest>,
) -> AppResult<Json<Envelope<LockResponse>>> {
    body.validate()?;

    let lock = fetch_lock(&state.db, auth_user.id).await?;

    if !verify_pin(&body.password, &lock.password_hash)? {
        return Err(AppError::Validation("Incorrect password".into()));
    }

    let lock = sqlx::query_as::<_, AppLock>(
        r#"
        UPDATE app_locks SET is_enabled = false, updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(Envelope::ok(lock.into())))
}

/// GET /api/v1/lock
pub async fn get_lock_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Envelope<LockResponse>>> {
    let lock = fetch_lock(&state.db, auth_user.id).await?;
    Ok(Json(Envelope::ok(lock.into())))
}

/// DELETE /api/v1/lock
pub async fn delete_lock(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Envelope<String>>> {
    let result = sqlx::query("DELETE FROM app_locks WHERE user_id = $1")
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("App lock not configured".into()));
    }

    Ok(Json(Envelope::ok("The app lock has been deleted.".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[derive(Debug)]
    struct UniqueViolation;

    impl std::fmt::Display for UniqueViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("duplicate key value violates unique constraint \"app_locks_user_id_key\"")
        }
    }

    impl std::error::Error for UniqueViolation {}

    impl sqlx::error::DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn concurrent_create_resolves_to_conflict() {
        let err = map_lock_insert_error(sqlx::Error::Database(Box::new(UniqueViolation)));
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn other_insert_errors_stay_internal() {
        let err = map_lock_insert_error(sqlx::Error::PoolTimedOut);
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
