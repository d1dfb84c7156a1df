use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::audit::{self, AuditAction};
use crate::auth::extractors::TenantContext;
use crate::errors::AppError;
use crate::listing::{self, ListParams};
use crate::models::allocation::AllocationRow;
use crate::models::client::ClientRow;
use crate::models::project::{ProjectRow, TeamAssignment};
use crate::portfolio::clients::{
    delete_client, get_client, insert_client, list_clients, update_client, ClientInput,
};
use crate::portfolio::projects::{
    delete_project, insert_project, known_team_resources, list_projects,
    list_projects_for_client, normalize_team, require_project, set_project_team, update_project,
    validate_team, ProjectInput,
};
use crate::staffing::allocations::list_for_project;
use crate::state::AppState;
use crate::validation::Validator;

// ── Clients ────────────────────────────────────────────────

/// GET /api/v1/clients
pub async fn handle_list_clients(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ClientRow>>, AppError> {
    let rows = list_clients(&state.db, ctx.company_id).await?;
    Ok(Json(listing::apply(rows, &params)?))
}

/// POST /api/v1/clients
pub async fn handle_create_client(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<ClientInput>,
) -> Result<(StatusCode, Json<ClientRow>), AppError> {
    ctx.require_editor()?;
    let input = input.normalized();
    input.validate()?;

    let row = insert_client(&state.db, ctx.company_id, &input).await?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Create,
        "client",
        Some(row.id),
        json!({ "name": row.name }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/clients/:id
pub async fn handle_get_client(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ClientRow>, AppError> {
    let row = get_client(&state.db, ctx.company_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Client {id} not found")))?;
    Ok(Json(row))
}

/// PUT /api/v1/clients/:id
pub async fn handle_update_client(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(input): Json<ClientInput>,
) -> Result<Json<ClientRow>, AppError> {
    ctx.require_editor()?;
    let input = input.normalized();
    input.validate()?;

    let row = update_client(&state.db, ctx.company_id, id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Client {id} not found")))?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Update,
        "client",
        Some(id),
        json!({ "name": row.name }),
    )
    .await;
    Ok(Json(row))
}

/// DELETE /api/v1/clients/:id
pub async fn handle_delete_client(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ctx.require_editor()?;
    if !delete_client(&state.db, ctx.company_id, id).await? {
        return Err(AppError::NotFound(format!("Client {id} not found")));
    }
    audit::record(&state.db, &ctx, AuditAction::Delete, "client", Some(id), json!({})).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/clients/:id/projects
pub async fn handle_list_client_projects(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProjectRow>>, AppError> {
    get_client(&state.db, ctx.company_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Client {id} not found")))?;
    Ok(Json(list_projects_for_client(&state.db, ctx.company_id, id).await?))
}

// ── Projects ───────────────────────────────────────────────

/// GET /api/v1/projects
pub async fn handle_list_projects(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ProjectRow>>, AppError> {
    let rows = list_projects(&state.db, ctx.company_id).await?;
    Ok(Json(listing::apply(rows, &params)?))
}

/// POST /api/v1/projects
pub async fn handle_create_project(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<ProjectInput>,
) -> Result<(StatusCode, Json<ProjectRow>), AppError> {
    ctx.require_editor()?;
    let input = input.normalized();
    let known = known_team_resources(&state.db, ctx.company_id, &input.team).await?;
    input.validate(&known)?;

    let row = insert_project(&state.db, ctx.company_id, ctx.user_id, &input).await?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Create,
        "project",
        Some(row.id),
        json!({ "name": row.name, "client_id": row.client_id }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/projects/:id
pub async fn handle_get_project(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectRow>, AppError> {
    Ok(Json(require_project(&state.db, ctx.company_id, id).await?))
}

/// PUT /api/v1/projects/:id
pub async fn handle_update_project(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(input): Json<ProjectInput>,
) -> Result<Json<ProjectRow>, AppError> {
    ctx.require_editor()?;
    let input = input.normalized();
    let known = known_team_resources(&state.db, ctx.company_id, &input.team).await?;
    input.validate(&known)?;

    let row = update_project(&state.db, ctx.company_id, id, ctx.user_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Update,
        "project",
        Some(id),
        json!({ "name": row.name, "status": row.status }),
    )
    .await;
    Ok(Json(row))
}

/// DELETE /api/v1/projects/:id
pub async fn handle_delete_project(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ctx.require_editor()?;
    if !delete_project(&state.db, ctx.company_id, id).await? {
        return Err(AppError::NotFound(format!("Project {id} not found")));
    }
    audit::record(&state.db, &ctx, AuditAction::Delete, "project", Some(id), json!({})).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct TeamInput {
    pub team: Vec<TeamAssignment>,
}

/// PUT /api/v1/projects/:id/team
pub async fn handle_set_project_team(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(input): Json<TeamInput>,
) -> Result<Json<ProjectRow>, AppError> {
    ctx.require_editor()?;
    let team = normalize_team(input.team);
    let known = known_team_resources(&state.db, ctx.company_id, &team).await?;

    let mut v = Validator::new();
    validate_team(&mut v, &team, &known);
    v.finish()?;

    let row = set_project_team(&state.db, ctx.company_id, id, ctx.user_id, &team)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Update,
        "project",
        Some(id),
        json!({ "team_size": team.len() }),
    )
    .await;
    Ok(Json(row))
}

/// GET /api/v1/projects/:id/allocations
pub async fn handle_list_project_allocations(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AllocationRow>>, AppError> {
    require_project(&state.db, ctx.company_id, id).await?;
    Ok(Json(list_for_project(&state.db, ctx.company_id, id).await?))
}
