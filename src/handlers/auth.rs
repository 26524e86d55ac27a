use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::auth::jwt::{create_token_pair, hash_token, verify_token, TokenPair, TokenType};
use crate::dto::{
    AuthUserInfo, Envelope, KakaoLoginRequest, KakaoLoginResponse, RefreshTokenRequest,
    RefreshTokenResponse,
};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::models::user::User;
use crate::AppState;

/// Persist a refresh token hash, optionally linking to the rotated parent.
async fn store_refresh_token(
    db: &sqlx::PgPool,
    user_id: i64,
    raw_refresh_token: &str,
    ttl_secs: i64,
    parent_token_id: Option<Uuid>,
) -> AppResult<Uuid> {
    let token_hash = hash_token(raw_refresh_token);
    let expires_at = Utc::now() + Duration::seconds(ttl_secs);
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, parent_token_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&token_hash)
    .bind(expires_at)
    .bind(parent_token_id)
    .execute(db)
    .await?;

    Ok(id)
}

/// Create a token pair AND persist the refresh token hash in the DB.
async fn issue_token_pair(
    db: &sqlx::PgPool,
    user_id: i64,
    config: &crate::config::Config,
    parent_token_id: Option<Uuid>,
) -> AppResult<TokenPair> {
    let tokens = create_token_pair(user_id, config)?;
    store_refresh_token(
        db,
        user_id,
        &tokens.refresh_token,
        config.jwt_refresh_ttl_secs,
        parent_token_id,
    )
    .await?;
    Ok(tokens)
}

/// Revoke all active refresh tokens for a user.
pub async fn revoke_all_user_tokens(db: &sqlx::PgPool, user_id: i64) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true, revoked_at = NOW()
        WHERE user_id = $1 AND revoked = false
        "#,
    )
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}

/// POST /api/v1/auth/kakao/login
pub async fn kakao_login(
    State(state): State<AppState>,
    AppJson(body): AppJson<KakaoLoginRequest>,
) -> AppResult<Json<Envelope<KakaoLoginResponse>>> {
    body.validate()?;

    let kakao_user = state.kakao.login(&body.authorization_code).await?;

    let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE social_id = $1")
        .bind(&kakao_user.social_id)
        .fetch_optional(&state.db)
        .await?;

    let is_new_user = existing.is_none();
    let user = match existing {
        // Returning account: refresh the profile snapshot; a withdrawn
        // account logging back in is reactivated.
        Some(u) => {
            sqlx::query_as::<_, User>(
                r#"
                UPDATE users SET
                    nickname = $2,
                    email = $3,
                    phone_number = $4,
                    profile_image = $5,
                    consented_scopes = $6,
                    deleted_at = NULL,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(u.id)
            .bind(&kakao_user.nickname)
            .bind(&kakao_user.email)
            .bind(&kakao_user.phone_number)
            .bind(&kakao_user.profile_image)
            .bind(&kakao_user.consented_scopes)
            .fetch_one(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (social_id, nickname, email, phone_number, profile_image, consented_scopes)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(&kakao_user.social_id)
            .bind(&kakao_user.nickname)
            .bind(&kakao_user.email)
            .bind(&kakao_user.phone_number)
            .bind(&kakao_user.profile_image)
            .bind(&kakao_user.consented_scopes)
            .fetch_one(&state.db)
            .await?
        }
    };

    let tokens = issue_token_pair(&state.db, user.id, &state.config, None).await?;

    tracing::info!(user_id = user.id, is_new_user, "Kakao login");

    Ok(Json(Envelope::ok(KakaoLoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: AuthUserInfo {
            id: user.id,
            social_id: user.social_id,
            nickname: user.nickname,
            email: user.email,
            phone_number: user.phone_number,
            is_new_user,
            consented_scopes: user.consented_scopes,
        },
    })))
}

/// POST /api/v1/auth/refresh — requires the current access token in the
/// Authorization header alongside the refresh token in the body.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(body): AppJson<RefreshTokenRequest>,
) -> AppResult<Json<Envelope<RefreshTokenResponse>>> {
    body.validate()?;

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let token_data = verify_token(&body.refresh_token, &state.config)?;

    if token_data.claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized);
    }

    // Look up the refresh token hash in the DB
    let token_hash = hash_token(&body.refresh_token);

    let stored = sqlx::query_as::<_, (Uuid, i64, bool)>(
        r#"
        SELECT id, user_id, revoked
        FROM refresh_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let (stored_id, stored_user_id, revoked) = stored;

    // Reuse detection: a revoked token being presented means the refresh
    // token leaked; revoke the whole family.
    if revoked {
        tracing::warn!(
            user_id = stored_user_id,
            token_id = %stored_id,
            "Refresh token reuse detected, revoking all tokens for user"
        );
        revoke_all_user_tokens(&state.db, stored_user_id).await?;
        return Err(AppError::Unauthorized);
    }

    // Verify the token belongs to the claimed user
    if stored_user_id != token_data.claims.sub {
        return Err(AppError::Unauthorized);
    }

    // Revoke the current token (single-use rotation)
    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true, revoked_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(stored_id)
    .execute(&state.db)
    .await?;

    let tokens = issue_token_pair(
        &state.db,
        token_data.claims.sub,
        &state.config,
        Some(stored_id),
    )
    .await?;

    Ok(Json(Envelope::ok(RefreshTokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    })))
}
