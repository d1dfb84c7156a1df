use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::audit::{self, AuditAction};
use crate::auth::extractors::{AuthSession, TenantContext};
use crate::auth::handlers::start_session;
use crate::errors::AppError;
use crate::models::company::CompanyRow;
use crate::models::invitation::InvitationRow;
use crate::models::user::{MemberStatus, Role, TeamMemberRow};
use crate::state::AppState;
use crate::tenancy::companies::{create_company, get_company, update_company, CompanyInput};
use crate::tenancy::invitations::{
    accept_invitation, accept_link, create_invitation, ensure_acceptable, ensure_recipient,
    find_by_token, find_open_for_email, list_invitations, revoke_invitation, InvitationInput,
    InvitationLookup,
};
use crate::tenancy::users::{
    count_active_admins, delete_member, find_member_by_email, get_member, get_platform_user,
    is_active_admin, leaves_no_active_admin, list_members, update_member_role,
    update_member_status, MemberChange,
};
use crate::validation::normalize_email;

// ── Company ────────────────────────────────────────────────

/// POST /api/v1/companies
///
/// Any signed-in user may found a company; the answer carries a session scoped to it.
pub async fn handle_create_company(
    State(state): State<AppState>,
    session: AuthSession,
    Json(input): Json<CompanyInput>,
) -> Result<Response, AppError> {
    let input = input.normalized();
    input.validate()?;

    let user = get_platform_user(&state.db, session.claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let (company, _) = create_company(&state.db, &user, &input).await?;
    audit::record_for(
        &state.db,
        company.id,
        user.id,
        AuditAction::Create,
        "company",
        Some(company.id),
        json!({ "name": company.name }),
    )
    .await;

    start_session(&state, &user, Some(company.id), StatusCode::CREATED).await
}

/// GET /api/v1/company
pub async fn handle_get_company(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<CompanyRow>, AppError> {
    let company = get_company(&state.db, ctx.company_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Company not found".to_string()))?;
    Ok(Json(company))
}

/// PUT /api/v1/company
pub async fn handle_update_company(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<CompanyInput>,
) -> Result<Json<CompanyRow>, AppError> {
    ctx.require_admin()?;
    let input = input.normalized();
    input.validate()?;

    let company = update_company(&state.db, ctx.company_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound("Company not found".to_string()))?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Update,
        "company",
        Some(company.id),
        json!({ "name": company.name }),
    )
    .await;
    Ok(Json(company))
}

// ── Team ───────────────────────────────────────────────────

/// GET /api/v1/team
pub async fn handle_list_team(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Vec<TeamMemberRow>>, AppError> {
    Ok(Json(list_members(&state.db, ctx.company_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: MemberStatus,
}

async fn require_member(
    state: &AppState,
    ctx: &TenantContext,
    member_id: Uuid,
) -> Result<TeamMemberRow, AppError> {
    get_member(&state.db, ctx.company_id, member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team member {member_id} not found")))
}

/// Refuses a change that would leave the company without an active admin.
async fn guard_last_admin(
    state: &AppState,
    ctx: &TenantContext,
    member: &TeamMemberRow,
    change: MemberChange,
) -> Result<(), AppError> {
    if !is_active_admin(member) {
        return Ok(());
    }
    let active_admins = count_active_admins(&state.db, ctx.company_id).await?;
    if leaves_no_active_admin(member, change, active_admins) {
        return Err(AppError::Conflict(
            "The company must keep at least one active admin".to_string(),
        ));
    }
    Ok(())
}

/// PUT /api/v1/team/:id/role
pub async fn handle_update_member_role(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(member_id): Path<Uuid>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<TeamMemberRow>, AppError> {
    ctx.require_admin()?;
    let member = require_member(&state, &ctx, member_id).await?;
    guard_last_admin(&state, &ctx, &member, MemberChange::Role(update.role)).await?;

    let updated = update_member_role(&state.db, ctx.company_id, member_id, update.role)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team member {member_id} not found")))?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Update,
        "team_member",
        Some(member_id),
        json!({ "role": { "from": member.role, "to": updated.role } }),
    )
    .await;
    Ok(Json(updated))
}

/// PUT /api/v1/team/:id/status
pub async fn handle_update_member_status(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(member_id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<TeamMemberRow>, AppError> {
    ctx.require_admin()?;
    let member = require_member(&state, &ctx, member_id).await?;
    if update.status == MemberStatus::Disabled {
        if member.user_id == ctx.user_id {
            return Err(AppError::Conflict(
                "You cannot disable your own membership".to_string(),
            ));
        }
        guard_last_admin(&state, &ctx, &member, MemberChange::Status(update.status)).await?;
    }

    let updated = update_member_status(&state.db, ctx.company_id, member_id, update.status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team member {member_id} not found")))?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Update,
        "team_member",
        Some(member_id),
        json!({ "status": updated.status }),
    )
    .await;
    Ok(Json(updated))
}

/// DELETE /api/v1/team/:id
pub async fn handle_remove_member(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(member_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ctx.require_admin()?;
    let member = require_member(&state, &ctx, member_id).await?;
    if member.user_id == ctx.user_id {
        return Err(AppError::Conflict(
            "You cannot remove yourself from the company".to_string(),
        ));
    }
    guard_last_admin(&state, &ctx, &member, MemberChange::Remove).await?;

    delete_member(&state.db, ctx.company_id, member_id).await?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Delete,
        "team_member",
        Some(member_id),
        json!({ "email": member.email }),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

// ── Invitations ────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct InvitationCreated {
    pub invitation: InvitationRow,
    pub accept_url: String,
}

/// POST /api/v1/invitations
pub async fn handle_create_invitation(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<InvitationInput>,
) -> Result<(StatusCode, Json<InvitationCreated>), AppError> {
    ctx.require_admin()?;
    input.validate()?;
    let email = normalize_email(&input.email);

    if find_member_by_email(&state.db, ctx.company_id, &email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "{email} is already a member of this company"
        )));
    }
    if find_open_for_email(&state.db, ctx.company_id, &email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "{email} already has a pending invitation"
        )));
    }

    let invitation = create_invitation(
        &state.db,
        ctx.company_id,
        ctx.user_id,
        &input,
        state.config.invitation_ttl_days,
    )
    .await?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Invite,
        "invitation",
        Some(invitation.id),
        json!({ "email": invitation.email, "role": invitation.role }),
    )
    .await;

    let accept_url = accept_link(&state.config.app_base_url, &invitation.token);
    Ok((
        StatusCode::CREATED,
        Json(InvitationCreated {
            invitation,
            accept_url,
        }),
    ))
}

/// GET /api/v1/invitations
pub async fn handle_list_invitations(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Vec<InvitationRow>>, AppError> {
    ctx.require_admin()?;
    Ok(Json(list_invitations(&state.db, ctx.company_id).await?))
}

/// DELETE /api/v1/invitations/:id
pub async fn handle_revoke_invitation(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ctx.require_admin()?;
    revoke_invitation(&state.db, ctx.company_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No pending invitation {id}")))?;
    audit::record(&state.db, &ctx, AuditAction::Revoke, "invitation", Some(id), json!({})).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

/// GET /api/v1/invitations/lookup
pub async fn handle_lookup_invitation(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<InvitationLookup>, AppError> {
    let invitation = find_by_token(&state.db, query.token.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;
    let company = get_company(&state.db, invitation.company_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

    Ok(Json(InvitationLookup {
        company_name: company.name,
        acceptable: ensure_acceptable(&invitation, Utc::now()).is_ok(),
        email: invitation.email,
        role: invitation.role,
        status: invitation.status,
        expires_at: invitation.expires_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub token: String,
}

/// POST /api/v1/invitations/accept
pub async fn handle_accept_invitation(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<AcceptRequest>,
) -> Result<Response, AppError> {
    let invitation = find_by_token(&state.db, req.token.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;
    ensure_acceptable(&invitation, Utc::now())?;
    ensure_recipient(&invitation, &session.claims.email)?;

    let user = get_platform_user(&state.db, session.claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let member = accept_invitation(&state.db, &invitation, &user).await?;
    audit::record_for(
        &state.db,
        invitation.company_id,
        user.id,
        AuditAction::Accept,
        "invitation",
        Some(invitation.id),
        json!({ "member_id": member.id, "role": member.role }),
    )
    .await;

    start_session(&state, &user, Some(invitation.company_id), StatusCode::OK).await
}
