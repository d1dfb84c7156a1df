//! Request extractors that turn a session token into a caller identity.
//!
//! ```text
//! cookie / bearer (/ ?token= for exports) → SessionKeys::verify → Redis revocation check
//!                                          → AuthSession
//!                                          → team_members lookup → TenantContext
//! ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, HeaderMap},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::session::{is_revoked, token_from_cookie_header, SessionClaims};
use crate::errors::AppError;
use crate::models::user::{MemberStatus, Role};
use crate::state::AppState;
use crate::tenancy::users::find_membership;

/// Any caller holding a valid, unrevoked session, with or without a company.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub claims: SessionClaims,
}

/// A caller acting inside their active company, with their current role.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub user_id: Uuid,
    pub email: String,
    pub company_id: Uuid,
    pub member_id: Uuid,
    pub role: Role,
}

impl TenantContext {
    /// Managers and admins may create, update and delete business records.
    pub fn require_editor(&self) -> Result<(), AppError> {
        if self.role.can_edit_records() {
            Ok(())
        } else {
            Err(AppError::forbidden("modify records"))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.can_manage_company() {
            Ok(())
        } else {
            Err(AppError::forbidden("manage the company"))
        }
    }
}

/// `TenantContext` for download links, which may also carry the token as `?token=`.
#[derive(Debug, Clone)]
pub struct ExportAuth(pub TenantContext);

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Session token from a bearer header, falling back to the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find_map(token_from_cookie_header)
        .map(str::to_string)
}

fn header_token(parts: &Parts) -> Option<String> {
    token_from_headers(&parts.headers)
}

fn query_token(parts: &Parts) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

async fn session_from_token(state: &AppState, token: &str) -> Result<AuthSession, AppError> {
    let claims = state.sessions.verify(token)?;
    if is_revoked(&state.redis, claims.jti).await? {
        return Err(AppError::Unauthorized);
    }
    Ok(AuthSession { claims })
}

async fn tenant_from_session(
    state: &AppState,
    session: AuthSession,
) -> Result<TenantContext, AppError> {
    let company_id = session.claims.company_id.ok_or_else(|| {
        AppError::Forbidden("Create or join a company to continue".to_string())
    })?;
    let member = find_membership(&state.db, company_id, session.claims.sub)
        .await?
        .filter(|m| m.status == MemberStatus::Active.as_str())
        .ok_or_else(|| AppError::Forbidden("You are not an active member of this company".to_string()))?;
    let role = member
        .role
        .parse::<Role>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Stored role is invalid: {e}")))?;

    Ok(TenantContext {
        user_id: session.claims.sub,
        email: session.claims.email,
        company_id,
        member_id: member.id,
        role,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = header_token(parts).ok_or(AppError::Unauthorized)?;
        session_from_token(state, &token).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for TenantContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let session = AuthSession::from_request_parts(parts, state).await?;
        tenant_from_session(state, session).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ExportAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = header_token(parts)
            .or_else(|| query_token(parts))
            .ok_or(AppError::Unauthorized)?;
        let session = session_from_token(state, &token).await?;
        Ok(ExportAuth(tenant_from_session(state, session).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let p = parts(
            Request::builder()
                .uri("/x")
                .header("Authorization", "Bearer from-header")
                .header("Cookie", "__session=from-cookie"),
        );
        assert_eq!(header_token(&p).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_cookie_token_is_found() {
        let p = parts(
            Request::builder()
                .uri("/x")
                .header("Cookie", "a=1; __session=from-cookie"),
        );
        assert_eq!(header_token(&p).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_query_token_is_only_read_on_request() {
        let p = parts(Request::builder().uri("/export/projects/1/pdf?token=abc.def"));
        assert_eq!(header_token(&p), None);
        assert_eq!(query_token(&p).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_member_cannot_edit() {
        let ctx = TenantContext {
            user_id: Uuid::new_v4(),
            email: "m@example.com".to_string(),
            company_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            role: Role::Member,
        };
        assert!(matches!(ctx.require_editor(), Err(AppError::Forbidden(_))));
        assert!(ctx.require_admin().is_err());
    }
}
