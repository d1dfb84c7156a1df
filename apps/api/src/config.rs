use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    /// Overrides the Messages API endpoint (e.g. a gateway).
    pub anthropic_api_url: Option<String>,
    /// HS256 secret used to sign our own session cookies.
    pub session_secret: String,
    pub session_ttl_hours: i64,
    /// Secret shared with the hosted identity provider for ID token verification.
    pub identity_jwt_secret: String,
    pub identity_issuer: Option<String>,
    pub identity_audience: Option<String>,
    pub cookie_secure: bool,
    pub invitation_ttl_days: i64,
    pub app_base_url: String,
    /// Browser origins allowed to call the API with credentials.
    pub cors_allowed_origins: Vec<String>,
    pub pdflatex_path: String,
    pub pdf_timeout_secs: u64,
    pub enable_llm_matching: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let app_base_url =
            std::env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let cors_allowed_origins = parse_origins(
            std::env::var("CORS_ALLOWED_ORIGINS").ok().as_deref(),
            &app_base_url,
        );

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            anthropic_api_url: std::env::var("ANTHROPIC_API_URL").ok(),
            session_secret: require_env("SESSION_SECRET")?,
            session_ttl_hours: parse_env("SESSION_TTL_HOURS", 120)?,
            identity_jwt_secret: require_env("IDENTITY_JWT_SECRET")?,
            identity_issuer: std::env::var("IDENTITY_ISSUER").ok(),
            identity_audience: std::env::var("IDENTITY_AUDIENCE").ok(),
            cookie_secure: parse_env("COOKIE_SECURE", true)?,
            invitation_ttl_days: parse_env("INVITATION_TTL_DAYS", 7)?,
            app_base_url,
            cors_allowed_origins,
            pdflatex_path: std::env::var("PDFLATEX_PATH")
                .unwrap_or_else(|_| "pdflatex".to_string()),
            pdf_timeout_secs: parse_env("PDF_TIMEOUT_SECS", 30)?,
            enable_llm_matching: parse_env("ENABLE_LLM_MATCHING", false)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Comma-separated origins; the web client's own origin when unset or blank.
fn parse_origins(raw: Option<&str>, app_base_url: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if origins.is_empty() {
        vec![app_base_url.trim_end_matches('/').to_string()]
    } else {
        origins
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration with placeholder values for unit tests.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/resourcealloc_test".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            s3_bucket: "resourcealloc-test".to_string(),
            s3_endpoint: "http://127.0.0.1:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            anthropic_api_key: "test-key".to_string(),
            anthropic_api_url: None,
            session_secret: "test-session-secret".to_string(),
            session_ttl_hours: 1,
            identity_jwt_secret: "test-identity-secret".to_string(),
            identity_issuer: None,
            identity_audience: None,
            cookie_secure: false,
            invitation_ttl_days: 7,
            app_base_url: "http://localhost:3000".to_string(),
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            pdflatex_path: "pdflatex".to_string(),
            pdf_timeout_secs: 5,
            enable_llm_matching: false,
            port: 8080,
            rust_log: "debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_uses_default_when_missing() {
        let value: u16 = parse_env("RESOURCEALLOC_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(value, 8080);
    }

    #[test]
    fn test_origins_default_to_app_base_url() {
        assert_eq!(
            parse_origins(None, "https://app.example.com/"),
            vec!["https://app.example.com"]
        );
        assert_eq!(
            parse_origins(Some(" , "), "https://app.example.com"),
            vec!["https://app.example.com"]
        );
        assert_eq!(
            parse_origins(Some("https://a.example.com, https://b.example.com/"), "x"),
            vec!["https://a.example.com", "https://b.example.com"]
        );
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("RESOURCEALLOC_TEST_BAD_BOOL", "maybe");
        let result: Result<bool> = parse_env("RESOURCEALLOC_TEST_BAD_BOOL", false);
        assert!(result.is_err());
    }
}
