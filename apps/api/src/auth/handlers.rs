use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::extractors::{token_from_headers, AuthSession};
use crate::auth::session::{revoke, SessionClaims};
use crate::errors::AppError;
use crate::models::company::CompanyRow;
use crate::models::user::{MemberStatus, PlatformUser};
use crate::state::AppState;
use crate::tenancy::companies::get_company;
use crate::tenancy::users::{
    choose_active_company, get_platform_user, list_memberships, upsert_platform_user,
    MembershipSummary,
};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub id_token: String,
    #[serde(default)]
    pub company_id: Option<Uuid>,
}

/// What the client needs to render the signed-in shell.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub user: PlatformUser,
    pub company: Option<CompanyRow>,
    pub role: Option<String>,
    pub memberships: Vec<MembershipSummary>,
    pub expires_at: DateTime<Utc>,
    /// Only present right after issuance, for bearer and download-link use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

async fn session_info(state: &AppState, claims: &SessionClaims) -> Result<SessionInfo, AppError> {
    let user = get_platform_user(&state.db, claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let memberships = list_memberships(&state.db, user.id).await?;

    let active = claims.company_id.and_then(|id| {
        memberships
            .iter()
            .find(|m| m.company_id == id && m.status == MemberStatus::Active.as_str())
    });
    let (company, role) = match active {
        Some(m) => (
            get_company(&state.db, m.company_id).await?,
            Some(m.role.clone()),
        ),
        None => (None, None),
    };

    Ok(SessionInfo {
        user,
        company,
        role,
        memberships,
        expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
        token: None,
    })
}

/// Signs a fresh session for `user` scoped to `company_id` and answers with
/// the cookie plus the session payload.
pub async fn start_session(
    state: &AppState,
    user: &PlatformUser,
    company_id: Option<Uuid>,
    status: StatusCode,
) -> Result<Response, AppError> {
    let (token, claims) = state.sessions.issue(user.id, &user.email, company_id)?;
    let mut info = session_info(state, &claims).await?;
    let cookie = state.sessions.cookie(&token);
    info.token = Some(token);
    Ok((status, [(header::SET_COOKIE, cookie)], Json(info)).into_response())
}

/// POST /api/auth/session
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<Response, AppError> {
    if req.id_token.trim().is_empty() {
        return Err(AppError::Validation("id_token is required".to_string()));
    }
    let identity = state.identity.verify(req.id_token.trim()).await?;
    let user = upsert_platform_user(&state.db, &identity).await?;
    let memberships = list_memberships(&state.db, user.id).await?;
    let company_id = choose_active_company(&memberships, req.company_id);

    info!(
        "Session issued for user {} (company: {:?})",
        user.id, company_id
    );
    start_session(&state, &user, company_id, StatusCode::OK).await
}

/// GET /api/auth/session
pub async fn handle_get_session(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<SessionInfo>, AppError> {
    Ok(Json(session_info(&state, &session.claims).await?))
}

/// POST /api/auth/logout
///
/// Always succeeds: a missing or already-invalid token still clears the cookie.
pub async fn handle_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = token_from_headers(&headers);

    if let Some(claims) = token.and_then(|t| state.sessions.verify(&t).ok()) {
        if let Err(e) = revoke(&state.redis, &claims).await {
            warn!("Failed to revoke session {}: {e}", claims.jti);
        } else {
            info!("Session {} revoked", claims.jti);
        }
    }

    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
    )
        .into_response()
}
