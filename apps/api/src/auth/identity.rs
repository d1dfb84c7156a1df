//! Verification of ID tokens minted by the hosted identity provider.
//!
//! The rest of the crate only sees `VerifiedIdentity`; swapping providers means
//! another `IdentityVerifier` implementation in `AppState`.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::debug;

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    /// The provider's stable user id.
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, AppError>;
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

/// Verifies HS256 ID tokens signed with a secret shared with the provider.
pub struct JwtIdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityVerifier {
    pub fn new(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, AppError> {
        let claims = decode::<IdTokenClaims>(id_token, &self.key, &self.validation)
            .map_err(|e| {
                debug!("ID token rejected: {e}");
                AppError::Unauthorized
            })?
            .claims;

        if claims.email_verified == Some(false) {
            return Err(AppError::Forbidden(
                "Verify your email address before signing in".to_string(),
            ));
        }
        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::Validation("ID token carries no email".to_string()))?;

        Ok(VerifiedIdentity {
            external_id: claims.sub,
            email: email.trim().to_lowercase(),
            display_name: claims.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn sign(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn exp() -> i64 {
        chrono::Utc::now().timestamp() + 600
    }

    #[tokio::test]
    async fn test_valid_token_yields_identity() {
        let verifier = JwtIdentityVerifier::new("idp-secret", Some("https://idp.test"), None);
        let token = sign(
            json!({
                "sub": "uid-123",
                "email": "Ana@Example.com",
                "name": "Ana",
                "iss": "https://idp.test",
                "exp": exp()
            }),
            "idp-secret",
        );
        let identity = verifier.verify(&token).await.unwrap();
        assert_eq!(identity.external_id, "uid-123");
        assert_eq!(identity.email, "ana@example.com");
        assert_eq!(identity.display_name.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn test_wrong_issuer_is_unauthorized() {
        let verifier = JwtIdentityVerifier::new("idp-secret", Some("https://idp.test"), None);
        let token = sign(
            json!({"sub": "u", "email": "a@b.co", "iss": "https://evil.test", "exp": exp()}),
            "idp-secret",
        );
        assert!(matches!(
            verifier.verify(&token).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_unverified_email_is_forbidden() {
        let verifier = JwtIdentityVerifier::new("idp-secret", None, None);
        let token = sign(
            json!({"sub": "u", "email": "a@b.co", "email_verified": false, "exp": exp()}),
            "idp-secret",
        );
        assert!(matches!(
            verifier.verify(&token).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_email_is_rejected() {
        let verifier = JwtIdentityVerifier::new("idp-secret", None, None);
        let token = sign(json!({"sub": "u", "exp": exp()}), "idp-secret");
        assert!(matches!(
            verifier.verify(&token).await,
            Err(AppError::Validation(_))
        ));
    }
}
