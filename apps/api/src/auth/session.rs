//! Session tokens: HS256 JWTs carried in the `__session` cookie (or a bearer header).
//!
//! Logout cannot un-sign a token, so revoked token ids are parked in Redis
//! until the token would have expired anyway.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;

pub const SESSION_COOKIE: &str = "__session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Platform user id.
    pub sub: Uuid,
    pub email: String,
    /// Active tenant; `None` until the user creates or joins a company.
    pub company_id: Option<Uuid>,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn remaining_secs(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// Signs and verifies session tokens and renders the cookie headers.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    secure_cookie: bool,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64, secure_cookie: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
            secure_cookie,
        }
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        company_id: Option<Uuid>,
    ) -> Result<(String, SessionClaims), AppError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id,
            email: email.to_string(),
            company_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign session: {e}")))?;
        Ok((token, claims))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Session token rejected: {e}");
                AppError::Unauthorized
            })
    }

    pub fn cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl.num_seconds()
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn clear_cookie(&self) -> String {
        let mut cookie =
            format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn revocation_key(jti: Uuid) -> String {
    format!("session:revoked:{jti}")
}

/// Marks a session id as revoked for the rest of its lifetime.
pub async fn revoke(redis: &redis::Client, claims: &SessionClaims) -> Result<(), AppError> {
    let ttl = claims.remaining_secs();
    if ttl == 0 {
        return Ok(());
    }
    let mut conn = redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Redis connection failed: {e}")))?;
    redis::cmd("SET")
        .arg(revocation_key(claims.jti))
        .arg(1)
        .arg("EX")
        .arg(ttl)
        .query_async::<_, ()>(&mut conn)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Redis SET failed: {e}")))?;
    Ok(())
}

pub async fn is_revoked(redis: &redis::Client, jti: Uuid) -> Result<bool, AppError> {
    let mut conn = redis
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Redis connection failed: {e}")))?;
    redis::cmd("EXISTS")
        .arg(revocation_key(jti))
        .query_async::<_, bool>(&mut conn)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Redis EXISTS failed: {e}")))
}

/// Pulls the session token out of a `Cookie` header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new("unit-test-secret", 2, true)
    }

    #[test]
    fn test_issue_then_verify_returns_same_claims() {
        let keys = keys();
        let user = Uuid::new_v4();
        let company = Uuid::new_v4();
        let (token, claims) = keys.issue(user, "ana@example.com", Some(company)).unwrap();
        let verified = keys.verify(&token).unwrap();
        assert_eq!(verified, claims);
        assert_eq!(verified.company_id, Some(company));
        assert_eq!(verified.exp - verified.iat, 2 * 3600);
    }

    #[test]
    fn test_verify_rejects_other_secret() {
        let (token, _) = keys().issue(Uuid::new_v4(), "a@b.co", None).unwrap();
        let other = SessionKeys::new("different-secret", 2, true);
        assert!(matches!(other.verify(&token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let keys = SessionKeys::new("unit-test-secret", -1, true);
        let (token, _) = keys.issue(Uuid::new_v4(), "a@b.co", None).unwrap();
        assert!(matches!(keys.verify(&token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(keys().verify("not-a-jwt").is_err());
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = keys().cookie("abc");
        assert!(cookie.starts_with("__session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=7200"));
        assert!(cookie.ends_with("; Secure"));

        let insecure = SessionKeys::new("s", 1, false).cookie("abc");
        assert!(!insecure.contains("Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        assert!(keys().clear_cookie().contains("__session=; Path=/"));
        assert!(keys().clear_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn test_token_from_cookie_header() {
        assert_eq!(
            token_from_cookie_header("theme=dark; __session=tok.en.value; other=1"),
            Some("tok.en.value")
        );
        assert_eq!(token_from_cookie_header("theme=dark"), None);
        assert_eq!(token_from_cookie_header("__session="), None);
    }

    #[test]
    fn test_remaining_secs_never_negative() {
        let claims = SessionClaims {
            sub: Uuid::new_v4(),
            email: "a@b.co".to_string(),
            company_id: None,
            jti: Uuid::new_v4(),
            iat: 0,
            exp: 10,
        };
        assert_eq!(claims.remaining_secs(), 0);
    }
}
