//! Kakao OAuth client: exchanges the authorization code issued to the
//! mobile app and resolves the account profile plus consented scopes.

use serde::Deserialize;

use crate::config::Config;
use crate::error::{AppError, AppResult};

const TOKEN_URL: &str = "https://kauth.kakao.com/oauth/token";
const PROFILE_URL: &str = "https://kapi.kakao.com/v2/user/me";

/// Normalized view of a Kakao account after code exchange.
#[derive(Debug, Clone)]
pub struct KakaoUser {
    pub social_id: String,
    pub nickname: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub profile_image: Option<String>,
    pub consented_scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Space-separated scope names the user consented to.
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: i64,
    #[serde(default)]
    kakao_account: KakaoAccount,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoAccount {
    email: Option<String>,
    phone_number: Option<String>,
    #[serde(default)]
    profile: KakaoProfile,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoProfile {
    nickname: Option<String>,
    profile_image_url: Option<String>,
}

#[derive(Clone)]
pub struct KakaoClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl KakaoClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build Kakao HTTP client");
        Self {
            http,
            client_id: config.kakao_client_id.clone(),
            client_secret: config.kakao_client_secret.clone(),
            redirect_uri: config.kakao_redirect_uri.clone(),
        }
    }

    /// Full login exchange: authorization code → provider token → profile.
    /// A code the provider rejects surfaces as 401.
    pub async fn login(&self, authorization_code: &str) -> AppResult<KakaoUser> {
        let token = self.exchange_code(authorization_code).await.map_err(|e| {
            tracing::warn!(error = %e, "Kakao code exchange failed");
            AppError::Unauthorized
        })?;

        let profile = self.fetch_profile(&token.access_token).await.map_err(|e| {
            tracing::warn!(error = %e, "Kakao profile fetch failed");
            AppError::Unauthorized
        })?;

        Ok(normalize(token, profile))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, anyhow::Error> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Kakao token endpoint returned {}: {}", status, body);
        }

        Ok(response.json().await?)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileResponse, anyhow::Error> {
        let response = self
            .http
            .get(PROFILE_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Kakao profile endpoint returned {}: {}", status, body);
        }

        Ok(response.json().await?)
    }
}

fn normalize(token: TokenResponse, profile: ProfileResponse) -> KakaoUser {
    let consented_scopes = token
        .scope
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_owned)
        .collect();

    KakaoUser {
        social_id: profile.id.to_string(),
        nickname: profile
            .kakao_account
            .profile
            .nickname
            .unwrap_or_else(|| "User".into()),
        email: profile.kakao_account.email,
        phone_number: profile.kakao_account.phone_number,
        profile_image: profile.kakao_account.profile.profile_image_url,
        consented_scopes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_splits_scopes_and_maps_profile() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","scope":"profile_nickname profile_image"}"#,
        )
        .unwrap();
        let profile: ProfileResponse = serde_json::from_str(
            r#"{
                "id": 987654321,
                "kakao_account": {
                    "profile": {
                        "nickname": "momo",
                        "profile_image_url": "https://k.kakaocdn.net/dn/profile.jpg"
                    }
                }
            }"#,
        )
        .unwrap();

        let user = normalize(token, profile);
        assert_eq!(user.social_id, "987654321");
        assert_eq!(user.nickname, "momo");
        assert_eq!(
            user.consented_scopes,
            vec!["profile_nickname", "profile_image"]
        );
        // No consent → fields stay empty
        assert!(user.email.is_none());
        assert!(user.phone_number.is_none());
    }

    #[test]
    fn normalize_tolerates_missing_account_fields() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        let profile: ProfileResponse = serde_json::from_str(r#"{"id": 1}"#).unwrap();

        let user = normalize(token, profile);
        assert_eq!(user.nickname, "User");
        assert!(user.consented_scopes.is_empty());
        assert!(user.profile_image.is_none());
    }
}
