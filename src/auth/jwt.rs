use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,
    pub exp: i64,
    pub iat: i64,
    pub token_type: TokenType,
    #[serde(default)]
    pub jti: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn create_access_token(user_id: i64, config: &Config) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        exp: (now + Duration::seconds(config.jwt_access_ttl_secs)).timestamp(),
        iat: now.timestamp(),
        token_type: TokenType::Access,
        jti: None,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create access token: {}", e)))
}

pub fn create_refresh_token(user_id: i64, config: &Config) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        exp: (now + Duration::seconds(config.jwt_refresh_ttl_secs)).timestamp(),
        iat: now.timestamp(),
        token_type: TokenType::Refresh,
        jti: Some(Uuid::new_v4()),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create refresh token: {}", e)))
}

pub fn create_token_pair(user_id: i64, config: &Config) -> AppResult<TokenPair> {
    let access_token = create_access_token(user_id, config)?;
    let refresh_token = create_refresh_token(user_id, config)?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Compute SHA-256 hash of a raw token string, returned as lowercase hex.
/// Refresh tokens are only ever stored hashed.
pub fn hash_token(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_token(token: &str, config: &Config) -> AppResult<TokenData<Claims>> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".into(),
            host: "127.0.0.1".into(),
            port: 0,
            frontend_url: "http://localhost:3000".into(),
            jwt_secret: "test-secret-not-for-production".into(),
            jwt_access_ttl_secs: 900,
            jwt_refresh_ttl_secs: 604800,
            kakao_client_id: String::new(),
            kakao_client_secret: String::new(),
            kakao_redirect_uri: String::new(),
            ai_api_key: String::new(),
            ai_model: String::new(),
            analysis_poll_secs: 5,
        }
    }

    #[test]
    fn access_token_round_trips() {
        let config = test_config();
        let token = create_access_token(12345, &config).unwrap();
        let data = verify_token(&token, &config).unwrap();
        assert_eq!(data.claims.sub, 12345);
        assert_eq!(data.claims.token_type, TokenType::Access);
        assert!(data.claims.jti.is_none());
    }

    #[test]
    fn refresh_token_carries_jti() {
        let config = test_config();
        let token = create_refresh_token(7, &config).unwrap();
        let data = verify_token(&token, &config).unwrap();
        assert_eq!(data.claims.token_type, TokenType::Refresh);
        assert!(data.claims.jti.is_some());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = test_config();
        let token = create_access_token(1, &config).unwrap();
        let mut other = test_config();
        other.jwt_secret = "a-different-secret".into();
        assert!(verify_token(&token, &other).is_err());
    }

    #[test]
    fn hash_token_is_deterministic_hex() {
        let h1 = hash_token("some-refresh-token");
        let h2 = hash_token("some-refresh-token");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, hash_token("another-token"));
    }
}
