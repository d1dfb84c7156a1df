use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::audit::{self, AuditAction};
use crate::auth::extractors::TenantContext;
use crate::errors::AppError;
use crate::listing::{self, ListParams};
use crate::models::allocation::AllocationRow;
use crate::models::employee::EmployeeRow;
use crate::models::project::TeamAssignment;
use crate::models::resource::ResourceRow;
use crate::models::skill::DocumentRef;
use crate::portfolio::projects::{add_team_member, require_project};
use crate::staffing::allocations::{
    delete_allocation, get_allocation, insert_allocation, list_allocations, list_for_resource,
    update_allocation, AllocationFilter, AllocationInput,
};
use crate::staffing::documents::{
    attach, detach, file_response, find_document, get_object, read_upload, DocumentOwner,
    DocumentTarget,
};
use crate::staffing::employees::{
    check_compensation_write, delete_employee, get_employee, insert_employee, list_employees,
    redact_for, update_employee, EmployeeInput,
};
use crate::staffing::load::{
    check_booking, utilization_on, AllocationWarning, Booking, ResourceUtilization, Window,
};
use crate::staffing::resources::{
    delete_resource, insert_resource, list_resources, require_resource, update_resource,
    ResourceInput,
};
use crate::state::AppState;

// ── Employees ──────────────────────────────────────────────

/// GET /api/v1/employees
pub async fn handle_list_employees(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<EmployeeRow>>, AppError> {
    let rows = list_employees(&state.db, ctx.company_id).await?;
    let rows = listing::apply(rows, &params)?
        .into_iter()
        .map(|r| redact_for(ctx.role, r))
        .collect();
    Ok(Json(rows))
}

/// POST /api/v1/employees
pub async fn handle_create_employee(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<EmployeeInput>,
) -> Result<(StatusCode, Json<EmployeeRow>), AppError> {
    ctx.require_editor()?;
    let input = input.normalized();
    check_compensation_write(ctx.role, &input)?;
    input.validate()?;

    let row = insert_employee(&state.db, ctx.company_id, ctx.user_id, &input).await?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Create,
        "employee",
        Some(row.id),
        json!({ "name": row.full_name() }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(redact_for(ctx.role, row))))
}

/// GET /api/v1/employees/:id
pub async fn handle_get_employee(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<EmployeeRow>, AppError> {
    let row = get_employee(&state.db, ctx.company_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Employee {id} not found")))?;
    Ok(Json(redact_for(ctx.role, row)))
}

/// PUT /api/v1/employees/:id
pub async fn handle_update_employee(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(input): Json<EmployeeInput>,
) -> Result<Json<EmployeeRow>, AppError> {
    ctx.require_editor()?;
    let input = input.normalized();
    check_compensation_write(ctx.role, &input)?;
    input.validate()?;

    let row = update_employee(&state.db, ctx.company_id, id, ctx.user_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Employee {id} not found")))?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Update,
        "employee",
        Some(id),
        json!({ "name": row.full_name() }),
    )
    .await;
    Ok(Json(redact_for(ctx.role, row)))
}

/// DELETE /api/v1/employees/:id
pub async fn handle_delete_employee(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ctx.require_editor()?;
    if !delete_employee(&state.db, ctx.company_id, id).await? {
        return Err(AppError::NotFound(format!("Employee {id} not found")));
    }
    audit::record(&state.db, &ctx, AuditAction::Delete, "employee", Some(id), json!({})).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/employees/:id/documents
pub async fn handle_upload_employee_document(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentRef>), AppError> {
    upload_document(&state, &ctx, DocumentOwner::Employee, id, multipart).await
}

/// GET /api/v1/employees/:id/documents/:doc_id
pub async fn handle_download_employee_document(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    download_document(&state, &ctx, DocumentOwner::Employee, id, doc_id).await
}

/// DELETE /api/v1/employees/:id/documents/:doc_id
pub async fn handle_delete_employee_document(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    remove_document(&state, &ctx, DocumentOwner::Employee, id, doc_id).await
}

// ── Resources ──────────────────────────────────────────────

/// GET /api/v1/resources
pub async fn handle_list_resources(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ResourceRow>>, AppError> {
    let rows = list_resources(&state.db, ctx.company_id).await?;
    Ok(Json(listing::apply(rows, &params)?))
}

/// POST /api/v1/resources
pub async fn handle_create_resource(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<ResourceInput>,
) -> Result<(StatusCode, Json<ResourceRow>), AppError> {
    ctx.require_editor()?;
    let input = input.normalized();
    input.validate()?;

    let row = insert_resource(&state.db, ctx.company_id, ctx.user_id, &input).await?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Create,
        "resource",
        Some(row.id),
        json!({ "name": row.name }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/resources/:id
pub async fn handle_get_resource(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ResourceRow>, AppError> {
    Ok(Json(require_resource(&state.db, ctx.company_id, id).await?))
}

/// PUT /api/v1/resources/:id
pub async fn handle_update_resource(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(input): Json<ResourceInput>,
) -> Result<Json<ResourceRow>, AppError> {
    ctx.require_editor()?;
    let input = input.normalized();
    input.validate()?;

    let row = update_resource(&state.db, ctx.company_id, id, ctx.user_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resource {id} not found")))?;
    audit::record(
        &state.db,
        &ctx,
        AuditAction::Update,
        "resource",
        Some(id),
        json!({ "name": row.name }),
    )
    .await;
    Ok(Json(row))
}

/// DELETE /api/v1/resources/:id
pub async fn handle_delete_resource(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ctx.require_editor()?;
    if !delete_resource(&state.db, ctx.company_id, id).await? {
        return Err(AppError::NotFound(format!("Resource {id} not found")));
    }
    audit::record(&state.db, &ctx, AuditAction::Delete, "resource", Some(id), json!({})).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/resources/:id/allocations
pub async fn handle_list_resource_allocations(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AllocationRow>>, AppError> {
    require_resource(&state.db, ctx.company_id, id).await?;
    Ok(Json(list_for_resource(&state.db, ctx.company_id, id).await?))
}

/// POST /api/v1/resources/:id/documents
pub async fn handle_upload_resource_document(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentRef>), AppError> {
    upload_document(&state, &ctx, DocumentOwner::Resource, id, multipart).await
}

/// GET /api/v1/resources/:id/documents/:doc_id
pub async fn handle_download_resource_document(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    download_document(&state, &ctx, DocumentOwner::Resource, id, doc_id).await
}

/// DELETE /api/v1/resources/:id/documents/:doc_id
pub async fn handle_delete_resource_document(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    remove_document(&state, &ctx, DocumentOwner::Resource, id, doc_id).await
}

// ── Documents (shared) ─────────────────────────────────────

async fn upload_document(
    state: &AppState,
    ctx: &TenantContext,
    owner: DocumentOwner,
    owner_id: Uuid,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentRef>), AppError> {
    ctx.require_editor()?;
    let upload = read_upload(multipart).await?;
    let target = DocumentTarget {
        owner,
        company_id: ctx.company_id,
        owner_id,
        actor: ctx.user_id,
    };
    let document = attach(&state.db, &state.s3, &state.config.s3_bucket, target, upload).await?;
    audit::record(
        &state.db,
        ctx,
        AuditAction::Update,
        owner.label(),
        Some(owner_id),
        json!({ "document_added": document.id, "file": document.name }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn download_document(
    state: &AppState,
    ctx: &TenantContext,
    owner: DocumentOwner,
    owner_id: Uuid,
    doc_id: Uuid,
) -> Result<Response, AppError> {
    let document = find_document(&state.db, owner, ctx.company_id, owner_id, doc_id).await?;
    let data = get_object(&state.s3, &state.config.s3_bucket, &document.storage_key).await?;
    Ok(file_response(&document.content_type, &document.name, data))
}

async fn remove_document(
    state: &AppState,
    ctx: &TenantContext,
    owner: DocumentOwner,
    owner_id: Uuid,
    doc_id: Uuid,
) -> Result<StatusCode, AppError> {
    ctx.require_editor()?;
    let target = DocumentTarget {
        owner,
        company_id: ctx.company_id,
        owner_id,
        actor: ctx.user_id,
    };
    let removed = detach(&state.db, &state.s3, &state.config.s3_bucket, target, doc_id).await?;
    audit::record(
        &state.db,
        ctx,
        AuditAction::Update,
        owner.label(),
        Some(owner_id),
        json!({ "document_removed": removed.id, "file": removed.name }),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

// ── Allocations ────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AllocationResponse {
    pub allocation: AllocationRow,
    pub warnings: Vec<AllocationWarning>,
}

/// GET /api/v1/allocations
pub async fn handle_list_allocations(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(filter): Query<AllocationFilter>,
) -> Result<Json<Vec<AllocationRow>>, AppError> {
    Ok(Json(list_allocations(&state.db, ctx.company_id, filter).await?))
}

/// POST /api/v1/allocations
pub async fn handle_create_allocation(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(input): Json<AllocationInput>,
) -> Result<(StatusCode, Json<AllocationResponse>), AppError> {
    ctx.require_editor()?;
    let input = input.normalized();
    input.validate()?;

    let warnings = booking_warnings(&state, &ctx, None, &input).await?;
    let allocation = insert_allocation(&state.db, ctx.company_id, ctx.user_id, &input).await?;
    sync_project_team(&state, &ctx, &input).await?;

    audit::record(
        &state.db,
        &ctx,
        AuditAction::Create,
        "allocation",
        Some(allocation.id),
        json!({
            "resource_id": allocation.resource_id,
            "project_id": allocation.project_id,
            "percent": allocation.percent,
            "warnings": warnings.len(),
        }),
    )
    .await;
    Ok((
        StatusCode::CREATED,
        Json(AllocationResponse {
            allocation,
            warnings,
        }),
    ))
}

/// PUT /api/v1/allocations/:id
pub async fn handle_update_allocation(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(input): Json<AllocationInput>,
) -> Result<Json<AllocationResponse>, AppError> {
    ctx.require_editor()?;
    let input = input.normalized();
    input.validate()?;

    get_allocation(&state.db, ctx.company_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Allocation {id} not found")))?;
    let warnings = booking_warnings(&state, &ctx, Some(id), &input).await?;
    let allocation = update_allocation(&state.db, ctx.company_id, id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Allocation {id} not found")))?;
    sync_project_team(&state, &ctx, &input).await?;

    audit::record(
        &state.db,
        &ctx,
        AuditAction::Update,
        "allocation",
        Some(id),
        json!({ "percent": allocation.percent, "warnings": warnings.len() }),
    )
    .await;
    Ok(Json(AllocationResponse {
        allocation,
        warnings,
    }))
}

/// DELETE /api/v1/allocations/:id
pub async fn handle_delete_allocation(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ctx.require_editor()?;
    if !delete_allocation(&state.db, ctx.company_id, id).await? {
        return Err(AppError::NotFound(format!("Allocation {id} not found")));
    }
    audit::record(&state.db, &ctx, AuditAction::Delete, "allocation", Some(id), json!({})).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Both ends of the booking must exist in the tenant; problems with the
/// booking itself come back as warnings.
async fn booking_warnings(
    state: &AppState,
    ctx: &TenantContext,
    id: Option<Uuid>,
    input: &AllocationInput,
) -> Result<Vec<AllocationWarning>, AppError> {
    let resource = require_resource(&state.db, ctx.company_id, input.resource_id).await?;
    let project = require_project(&state.db, ctx.company_id, input.project_id).await?;
    let existing = list_for_resource(&state.db, ctx.company_id, resource.id).await?;

    let booking = Booking {
        id,
        project_id: project.id,
        percent: input.percent,
        window: Window::new(input.start_date, input.end_date),
    };
    let warnings = check_booking(&booking, &resource, &project, &existing);
    if !warnings.is_empty() {
        info!(
            "Booking {} on {} raised {} warning(s)",
            resource.name,
            project.name,
            warnings.len()
        );
    }
    Ok(warnings)
}

async fn sync_project_team(
    state: &AppState,
    ctx: &TenantContext,
    input: &AllocationInput,
) -> Result<(), AppError> {
    let assignment = TeamAssignment {
        resource_id: input.resource_id,
        role: input.role.clone(),
        allocation_percent: Some(input.percent),
    };
    add_team_member(&state.db, ctx.company_id, input.project_id, ctx.user_id, assignment).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UtilizationQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct UtilizationResponse {
    pub date: NaiveDate,
    pub resources: Vec<ResourceUtilization>,
}

/// GET /api/v1/utilization
pub async fn handle_utilization(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<UtilizationQuery>,
) -> Result<Json<UtilizationResponse>, AppError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let resources = list_resources(&state.db, ctx.company_id).await?;
    let allocations = list_allocations(&state.db, ctx.company_id, AllocationFilter::default()).await?;
    Ok(Json(UtilizationResponse {
        date,
        resources: utilization_on(&resources, &allocations, date),
    }))
}
