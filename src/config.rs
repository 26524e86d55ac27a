use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    pub jwt_secret: String,
    pub jwt_access_ttl_secs: i64,
    pub jwt_refresh_ttl_secs: i64,

    pub kakao_client_id: String,
    pub kakao_client_secret: String,
    pub kakao_redirect_uri: String,

    pub ai_api_key: String,
    pub ai_model: String,

    /// How often the analysis worker polls for queued jobs.
    pub analysis_poll_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("PORT must be a number"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),

            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            jwt_access_ttl_secs: env::var("JWT_ACCESS_TTL_SECS")
                .unwrap_or_else(|_| "900".into())
                .parse()
                .expect("JWT_ACCESS_TTL_SECS must be a number"),
            jwt_refresh_ttl_secs: env::var("JWT_REFRESH_TTL_SECS")
                .unwrap_or_else(|_| "604800".into())
                .parse()
                .expect("JWT_REFRESH_TTL_SECS must be a number"),

            kakao_client_id: env::var("KAKAO_CLIENT_ID").unwrap_or_else(|_| String::new()),
            kakao_client_secret: env::var("KAKAO_CLIENT_SECRET").unwrap_or_else(|_| String::new()),
            kakao_redirect_uri: env::var("KAKAO_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:3000/oauth/kakao".into()),

            ai_api_key: env::var("AI_API_KEY").unwrap_or_else(|_| String::new()),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| "claude-sonnet-4-20250514".into()),

            analysis_poll_secs: env::var("ANALYSIS_POLL_SECS")
                .unwrap_or_else(|_| "5".into())
                .parse()
                .unwrap_or(5),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
