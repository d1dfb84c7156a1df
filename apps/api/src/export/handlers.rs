use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    response::Response,
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{self, AuditAction};
use crate::auth::extractors::{ExportAuth, TenantContext};
use crate::errors::AppError;
use crate::export::latex::{render_project_report, render_resource_profile, BookingLine, StaffingLine};
use crate::portfolio::clients::get_client;
use crate::portfolio::projects::{list_projects, require_project};
use crate::staffing::allocations::{list_for_project, list_for_resource};
use crate::staffing::documents::{file_response, put_object, sanitize_file_name};
use crate::staffing::resources::{list_resources_by_ids, require_resource};
use crate::state::AppState;

const PDF: &str = "application/pdf";

/// `companies/{company}/exports/{kind}/{id}/{timestamp}.pdf`
pub fn export_key(company_id: Uuid, kind: &str, id: Uuid) -> String {
    format!(
        "companies/{company_id}/exports/{kind}/{id}/{}.pdf",
        Utc::now().format("%Y%m%dT%H%M%SZ")
    )
}

/// `Q3 Platform Build` becomes `Q3_Platform_Build.pdf`.
pub fn export_file_name(entity_name: &str) -> String {
    format!("{}.pdf", sanitize_file_name(entity_name.trim()))
}

/// Compiles, archives and audits one export, then answers with the PDF.
async fn deliver(
    state: &AppState,
    ctx: &TenantContext,
    kind: &str,
    entity_type: &str,
    id: Uuid,
    name: &str,
    source: String,
) -> Result<Response, AppError> {
    let pdf = Bytes::from(state.pdf.compile(&source).await?);

    let key = export_key(ctx.company_id, kind, id);
    let archived = match put_object(&state.s3, &state.config.s3_bucket, &key, PDF, pdf.clone()).await {
        Ok(()) => Some(key),
        Err(e) => {
            warn!("Export of {entity_type} {id} was not archived: {e}");
            None
        }
    };

    audit::record(
        &state.db,
        ctx,
        AuditAction::Export,
        entity_type,
        Some(id),
        json!({ "format": "pdf", "bytes": pdf.len(), "storage_key": archived }),
    )
    .await;
    info!("Exported {entity_type} {id} as PDF ({} bytes)", pdf.len());

    Ok(file_response(PDF, &export_file_name(name), pdf))
}

/// GET /api/v1/export/projects/:id/pdf
pub async fn handle_export_project_pdf(
    State(state): State<AppState>,
    ExportAuth(ctx): ExportAuth,
    Path(project_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let project = require_project(&state.db, ctx.company_id, project_id).await?;
    let client_name = match project.client_id {
        Some(client_id) => get_client(&state.db, ctx.company_id, client_id)
            .await?
            .map(|c| c.name),
        None => None,
    };

    let allocations = list_for_project(&state.db, ctx.company_id, project_id).await?;
    let resource_ids: Vec<Uuid> = allocations.iter().map(|a| a.resource_id).collect();
    let names: HashMap<Uuid, String> = list_resources_by_ids(&state.db, ctx.company_id, &resource_ids)
        .await?
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();

    let mut staffing: Vec<StaffingLine> = allocations
        .into_iter()
        .map(|a| StaffingLine {
            resource_name: names
                .get(&a.resource_id)
                .cloned()
                .unwrap_or_else(|| "Removed resource".to_string()),
            role: a.role,
            percent: a.percent,
            start_date: a.start_date,
            end_date: a.end_date,
        })
        .collect();
    staffing.sort_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then_with(|| a.resource_name.cmp(&b.resource_name))
    });

    let source = render_project_report(&project, client_name.as_deref(), &staffing);
    deliver(&state, &ctx, "projects", "project", project.id, &project.name, source).await
}

/// GET /api/v1/export/resources/:id/pdf
pub async fn handle_export_resource_pdf(
    State(state): State<AppState>,
    ExportAuth(ctx): ExportAuth,
    Path(resource_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let resource = require_resource(&state.db, ctx.company_id, resource_id).await?;
    let allocations = list_for_resource(&state.db, ctx.company_id, resource_id).await?;
    let projects: HashMap<Uuid, String> = list_projects(&state.db, ctx.company_id)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    let mut bookings: Vec<BookingLine> = allocations
        .into_iter()
        .map(|a| BookingLine {
            project_name: projects
                .get(&a.project_id)
                .cloned()
                .unwrap_or_else(|| "Removed project".to_string()),
            percent: a.percent,
            start_date: a.start_date,
            end_date: a.end_date,
        })
        .collect();
    bookings.sort_by_key(|b| b.start_date);

    let source = render_resource_profile(&resource, &bookings);
    deliver(&state, &ctx, "resources", "resource", resource.id, &resource.name, source).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_key_layout() {
        let company = Uuid::new_v4();
        let id = Uuid::new_v4();
        let key = export_key(company, "projects", id);
        assert!(key.starts_with(&format!("companies/{company}/exports/projects/{id}/")));
        assert!(key.ends_with(".pdf"));
    }

    #[test]
    fn test_export_file_name_from_entity_name() {
        assert_eq!(export_file_name(" Q3 Platform Build "), "Q3_Platform_Build.pdf");
        assert_eq!(export_file_name("a/b"), "b.pdf");
    }
}
