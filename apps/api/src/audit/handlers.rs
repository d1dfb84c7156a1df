use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::audit::{list, page_size};
use crate::auth::extractors::TenantContext;
use crate::errors::AppError;
use crate::models::audit::AuditLogRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/v1/audit-logs
pub async fn handle_list_audit_logs(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogRow>>, AppError> {
    ctx.require_admin()?;
    let entries = list(
        &state.db,
        ctx.company_id,
        query.entity_type.as_deref(),
        page_size(query.limit),
    )
    .await?;
    Ok(Json(entries))
}
