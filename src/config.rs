use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window_minutes: u64,
    /// Key clients on the first `X-Forwarded-For` hop instead of the socket peer.
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub tokeninfo_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub login_rate_limit: RateLimitConfig,
    /// `None` disables `/auth/google-login`.
    pub google: Option<GoogleConfig>,
    /// Allowed CORS origin; permissive CORS when unset.
    pub client_url: Option<String>,
    pub production: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "mockprep".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "mockprep-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let login_rate_limit = RateLimitConfig {
            max_attempts: env_parse("LOGIN_RATE_LIMIT_MAX", 5),
            window_minutes: env_parse("LOGIN_RATE_LIMIT_WINDOW_MINUTES", 15),
            trust_proxy: std::env::var("TRUST_PROXY")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };
        let google = non_empty_var("GOOGLE_CLIENT_ID").map(|client_id| GoogleConfig {
            client_id,
            tokeninfo_url: std::env::var("GOOGLE_TOKENINFO_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/tokeninfo".into()),
        });
        let production = std::env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            login_rate_limit,
            google,
            client_url: non_empty_var("CLIENT_URL"),
            production,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
